use super::session::{normalize_token, SessionStore};
use crate::types::Session;
use async_trait::async_trait;
use tokio::sync::Mutex;

pub const ACCESS_COOKIE: &str = "access";
pub const REFRESH_COOKIE: &str = "refresh";

fn cookie_value(header: &str, name: &str) -> Option<String> {
    header.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        if key.trim() != name {
            return None;
        }
        let value = value.trim().trim_matches('"');
        normalize_token(Some(value.to_string()))
    })
}

/// Server-side credentials scoped to one incoming request's `Cookie` header.
///
/// Logout only drops the request-scoped copy; clearing the browser cookie is the
/// responsibility of whoever writes the outgoing response.
pub struct CookieSession {
    session: Mutex<Session>,
}

impl CookieSession {
    pub fn from_cookie_header(header: &str) -> Self {
        Self::with_names(header, ACCESS_COOKIE, REFRESH_COOKIE)
    }

    pub fn with_names(header: &str, access_name: &str, refresh_name: &str) -> Self {
        Self {
            session: Mutex::new(Session {
                access_token: cookie_value(header, access_name),
                refresh_token: cookie_value(header, refresh_name),
            }),
        }
    }

    pub async fn session(&self) -> Session {
        self.session.lock().await.clone()
    }
}

#[async_trait]
impl SessionStore for CookieSession {
    async fn access_token(&self) -> Option<String> {
        self.session.lock().await.access_token.clone()
    }

    async fn refresh_token(&self) -> Option<String> {
        self.session.lock().await.refresh_token.clone()
    }

    async fn set_access_token(&self, token: String) {
        self.session.lock().await.access_token = normalize_token(Some(token));
    }

    async fn logout(&self) {
        *self.session.lock().await = Session::default();
        tracing::debug!("request-scoped session cleared");
    }
}
