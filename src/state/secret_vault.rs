use std::sync::Arc;
use thiserror::Error;

pub const DEFAULT_KEYRING_SERVICE: &str = "authfetch";
pub const KEYRING_USER_REFRESH_TOKEN: &str = "refresh_token";

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("OS keychain/secret service is unavailable")]
    Unavailable,
    #[error("keyring error")]
    Keyring(#[from] keyring::Error),
}

/// One secret in the OS keyring. Clones share the same keyring entry.
#[derive(Debug, Clone)]
pub struct SecretVault {
    entry: Arc<keyring::Entry>,
}

impl SecretVault {
    pub fn new(service: &str, user: &str) -> Result<Self, VaultError> {
        Ok(Self {
            entry: Arc::new(keyring::Entry::new(service, user)?),
        })
    }

    pub fn refresh_token() -> Result<Self, VaultError> {
        Self::new(DEFAULT_KEYRING_SERVICE, KEYRING_USER_REFRESH_TOKEN)
    }

    pub fn load(&self) -> Result<Option<String>, VaultError> {
        match self.entry.get_password() {
            Ok(pwd) => {
                let trimmed = pwd.trim();
                Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
            }
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(keyring::Error::NoStorageAccess(_)) => Err(VaultError::Unavailable),
            Err(keyring::Error::PlatformFailure(_)) => Err(VaultError::Unavailable),
            Err(e) => Err(e.into()),
        }
    }

    pub fn store(&self, value: &str) -> Result<(), VaultError> {
        self.entry.set_password(value)?;
        Ok(())
    }

    pub fn delete(&self) -> Result<(), VaultError> {
        match self.entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
pub(crate) fn mock_vault(user: &str) -> SecretVault {
    keyring::set_default_credential_builder(keyring::mock::default_credential_builder());
    SecretVault::new("authfetch-test", user).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_secret_loads_as_none() {
        let vault = mock_vault("empty");
        assert_eq!(vault.load().unwrap(), None);
        vault.delete().unwrap();
    }

    #[test]
    fn stored_secret_is_trimmed_on_load() {
        let vault = mock_vault("trimmed");
        vault.store("  R1\n").unwrap();
        assert_eq!(vault.load().unwrap().as_deref(), Some("R1"));

        vault.delete().unwrap();
        assert_eq!(vault.load().unwrap(), None);
    }
}
