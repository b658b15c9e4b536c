use crate::client::ApiClient;
use crate::error::ApiError;
use crate::types::ApiRequest;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::sync::Arc;

/// Re-issues one logical request after the session has been refreshed.
#[async_trait]
pub trait Retry<T: Send + 'static>: Send + Sync {
    async fn retry(&self) -> Result<T, ApiError>;
}

#[async_trait]
impl<T, F, Fut> Retry<T> for F
where
    T: Send + 'static,
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
{
    async fn retry(&self) -> Result<T, ApiError> {
        (self)().await
    }
}

/// How a call recovers when its response signals an expired session.
pub enum Recovery<T: Send + 'static> {
    /// Surface the expiry to the caller; no refresh is attempted.
    None,
    /// Send the same request again once the session is refreshed.
    Reissue,
    /// Run a caller-supplied continuation once the session is refreshed.
    Continue(Arc<dyn Retry<T>>),
}

impl<T: Send + 'static> Recovery<T> {
    pub fn continue_with<R>(retry: R) -> Self
    where
        R: Retry<T> + 'static,
    {
        Self::Continue(Arc::new(retry))
    }
}

impl<T: Send + 'static> Clone for Recovery<T> {
    fn clone(&self) -> Self {
        match self {
            Self::None => Self::None,
            Self::Reissue => Self::Reissue,
            Self::Continue(retry) => Self::Continue(retry.clone()),
        }
    }
}

impl<T: Send + 'static> std::fmt::Debug for Recovery<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Reissue => f.write_str("Reissue"),
            Self::Continue(_) => f.write_str("Continue(..)"),
        }
    }
}

/// Retry that sends the original request through the client again.
pub(crate) struct Reissue {
    client: ApiClient,
    request: ApiRequest,
}

impl Reissue {
    pub(crate) fn new(client: ApiClient, request: ApiRequest) -> Self {
        Self { client, request }
    }
}

#[async_trait]
impl<T> Retry<T> for Reissue
where
    T: DeserializeOwned + Send + 'static,
{
    async fn retry(&self) -> Result<T, ApiError> {
        // An expiry on the reissued call is a fresh detection, not part of this cycle.
        self.client
            .execute(self.request.clone(), Recovery::Reissue)
            .await
    }
}

/// Runs a retry exactly once.
pub(crate) async fn dispatch<T: Send + 'static>(retry: &dyn Retry<T>) -> Result<T, ApiError> {
    tracing::debug!("retrying request after token refresh");
    retry.retry().await
}
