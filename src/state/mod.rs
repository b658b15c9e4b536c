mod cookie;
mod secret_vault;
mod session;

pub use cookie::{CookieSession, ACCESS_COOKIE, REFRESH_COOKIE};
pub use secret_vault::{SecretVault, VaultError, DEFAULT_KEYRING_SERVICE, KEYRING_USER_REFRESH_TOKEN};
pub use session::{MemorySessionStore, SessionStore};
