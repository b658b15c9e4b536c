use super::SecretVault;
use crate::types::Session;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};

/// Holder of the current credentials.
///
/// The pipeline only reads tokens; `set_access_token` and `logout` are called by the
/// refresh coordinator alone.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn access_token(&self) -> Option<String>;
    async fn refresh_token(&self) -> Option<String>;
    async fn set_access_token(&self, token: String);
    /// Clears credentials and tells session-dependent consumers to re-authenticate.
    async fn logout(&self);
}

pub(crate) fn normalize_token(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim().to_string();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    })
}

/// Client-side store. The refresh credential can be persisted through a [`SecretVault`].
#[derive(Clone)]
pub struct MemorySessionStore {
    session: Arc<Mutex<Session>>,
    vault: Option<SecretVault>,
    authenticated: Arc<watch::Sender<bool>>,
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySessionStore {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self {
            session: Arc::new(Mutex::new(Session::default())),
            vault: None,
            authenticated: Arc::new(tx),
        }
    }

    pub fn with_vault(vault: SecretVault) -> Self {
        Self {
            vault: Some(vault),
            ..Self::new()
        }
    }

    pub async fn login(&self, access_token: String, refresh_token: Option<String>) {
        let refresh_token = normalize_token(refresh_token);
        {
            let mut guard = self.session.lock().await;
            guard.access_token = normalize_token(Some(access_token));
            guard.refresh_token = refresh_token.clone();
            self.authenticated.send_replace(guard.is_authenticated());
        }

        if let (Some(vault), Some(token)) = (&self.vault, refresh_token.as_deref()) {
            if let Err(e) = vault.store(token) {
                tracing::warn!(error = %e, "failed to persist refresh token");
            }
        }
    }

    pub async fn session(&self) -> Session {
        self.session.lock().await.clone()
    }

    /// Watch channel of the `is_authenticated` flag; flips to `false` on logout.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.authenticated.subscribe()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn access_token(&self) -> Option<String> {
        self.session.lock().await.access_token.clone()
    }

    async fn refresh_token(&self) -> Option<String> {
        if let Some(value) = self.session.lock().await.refresh_token.clone() {
            return Some(value);
        }

        let vault = self.vault.as_ref()?;
        match vault.load() {
            Ok(Some(token)) => {
                self.session.lock().await.refresh_token = Some(token.clone());
                Some(token)
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read persisted refresh token");
                None
            }
        }
    }

    async fn set_access_token(&self, token: String) {
        let mut guard = self.session.lock().await;
        guard.access_token = normalize_token(Some(token));
        self.authenticated.send_replace(guard.is_authenticated());
    }

    async fn logout(&self) {
        {
            let mut guard = self.session.lock().await;
            *guard = Session::default();
        }
        if let Some(vault) = &self.vault {
            if let Err(e) = vault.delete() {
                tracing::warn!(error = %e, "failed to delete persisted refresh token");
            }
        }
        self.authenticated.send_replace(false);
        tracing::info!("session logged out");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn login_then_logout_clears_tokens_and_signals() {
        let store = MemorySessionStore::new();
        let mut rx = store.subscribe();

        store
            .login(" T1 ".to_string(), Some("R1".to_string()))
            .await;
        assert_eq!(store.access_token().await.as_deref(), Some("T1"));
        assert_eq!(store.refresh_token().await.as_deref(), Some("R1"));
        assert!(*rx.borrow_and_update());

        store.logout().await;
        assert!(rx.has_changed().unwrap());
        assert!(!*rx.borrow_and_update());
        assert_eq!(store.session().await, Session::default());
    }

    #[tokio::test]
    async fn set_access_token_keeps_refresh_token() {
        let store = MemorySessionStore::new();
        store.login("T1".to_string(), Some("R1".to_string())).await;

        store.set_access_token("T2".to_string()).await;
        let session = store.session().await;
        assert_eq!(session.access_token.as_deref(), Some("T2"));
        assert_eq!(session.refresh_token.as_deref(), Some("R1"));
    }

    #[tokio::test]
    async fn login_persists_refresh_token_and_logout_deletes_it() {
        let vault = crate::state::secret_vault::mock_vault("login-logout");
        let store = MemorySessionStore::with_vault(vault.clone());

        store.login("T1".to_string(), Some("R1".to_string())).await;
        assert_eq!(vault.load().unwrap().as_deref(), Some("R1"));

        store.logout().await;
        assert_eq!(vault.load().unwrap(), None);
        assert_eq!(store.refresh_token().await, None);
    }

    #[tokio::test]
    async fn refresh_token_is_loaded_lazily_from_vault() {
        let vault = crate::state::secret_vault::mock_vault("lazy");
        vault.store("R-persisted").unwrap();
        let store = MemorySessionStore::with_vault(vault.clone());
        assert_eq!(store.session().await.refresh_token, None);

        assert_eq!(store.refresh_token().await.as_deref(), Some("R-persisted"));
        assert_eq!(
            store.session().await.refresh_token.as_deref(),
            Some("R-persisted")
        );
        vault.delete().unwrap();
    }

    #[tokio::test]
    async fn blank_tokens_are_treated_as_missing() {
        let store = MemorySessionStore::new();
        store.login("   ".to_string(), Some(String::new())).await;
        assert!(!store.session().await.is_authenticated());
        assert_eq!(store.refresh_token().await, None);
    }
}
