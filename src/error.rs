use crate::settings::SettingsError;
use crate::transport::TransportError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Connectivity failure; never retried by the pipeline.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// Expiry status surfaced as-is because the caller supplied no recovery.
    #[error("Token is invalid or expired ({status})")]
    Unauthorized { status: u16, body: String },
    /// The session could not be recovered and has been logged out.
    #[error("session expired; re-authentication required")]
    SessionExpired,
    #[error("HTTP error ({status})")]
    Http { status: u16, body: String },
    #[error("invalid json")]
    Decode(#[from] serde_json::Error),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("invalid header: {0}")]
    InvalidHeader(String),
    #[error("refresh coordinator is not available")]
    CoordinatorUnavailable,
    #[error(transparent)]
    Settings(#[from] SettingsError),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized { status, .. } | Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True when the user must sign in again.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::Unauthorized { .. } | Self::SessionExpired)
    }
}
