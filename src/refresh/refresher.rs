use crate::request::RequestBuilder;
use crate::settings::{ClientSettings, SettingsError};
use crate::state::SessionStore;
use crate::transport::{Transport, TransportError};
use crate::types::{ApiRequest, Method};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RefreshError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("refresh rejected ({status})")]
    Rejected { status: u16 },
    #[error("invalid refresh response")]
    InvalidResponse(#[from] serde_json::Error),
    #[error("refresh response carried no access token")]
    MissingAccessToken,
    #[error("failed to build refresh request: {0}")]
    Build(String),
}

/// Obtains a new access token. Called by the coordinator, at most once per expiry cycle.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self) -> Result<String, RefreshError>;
}

#[derive(Serialize)]
struct RefreshBody<'a> {
    refresh: &'a str,
}

#[derive(Deserialize)]
struct RefreshResponse {
    #[serde(default)]
    access: Option<String>,
}

/// Exchanges the stored refresh credential at the refresh endpoint.
pub struct EndpointRefresher {
    transport: Arc<dyn Transport>,
    session: Arc<dyn SessionStore>,
    builder: RequestBuilder,
    path: String,
}

impl EndpointRefresher {
    pub fn new(
        transport: Arc<dyn Transport>,
        session: Arc<dyn SessionStore>,
        builder: RequestBuilder,
        path: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            session,
            builder,
            path: path.into(),
        }
    }

    pub fn from_settings(
        transport: Arc<dyn Transport>,
        session: Arc<dyn SessionStore>,
        settings: &ClientSettings,
    ) -> Result<Self, SettingsError> {
        Ok(Self::new(
            transport,
            session,
            RequestBuilder::from_settings(settings)?,
            settings.refresh_path.clone(),
        ))
    }
}

#[async_trait]
impl TokenRefresher for EndpointRefresher {
    async fn refresh(&self) -> Result<String, RefreshError> {
        let mut request = ApiRequest::new(Method::Post, self.path.as_str());
        // Without a stored refresh token the endpoint is expected to rely on cookies.
        if let Some(token) = self.session.refresh_token().await {
            request = request.body(serde_json::to_value(RefreshBody { refresh: &token })?);
        }

        let call = self
            .builder
            .build(&request, None)
            .map_err(|e| RefreshError::Build(e.to_string()))?;
        let res = self.transport.execute(call).await?;
        if !res.is_success() {
            return Err(RefreshError::Rejected { status: res.status });
        }

        let parsed: RefreshResponse = serde_json::from_slice(&res.body)?;
        parsed
            .access
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or(RefreshError::MissingAccessToken)
    }
}
