use crate::error::ApiError;
use crate::redact::redact_secrets;
use crate::refresh::{
    dispatch, policy, EndpointRefresher, Recovery, RefreshCoordinator, RefreshOutcome, Reissue,
    Retry, TokenRefresher,
};
use crate::request::RequestBuilder;
use crate::settings::ClientSettings;
use crate::state::SessionStore;
use crate::transport::{HttpTransport, Transport, TransportResponse};
use crate::types::{ApiRequest, Page};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

struct Inner {
    transport: Arc<dyn Transport>,
    session: Arc<dyn SessionStore>,
    coordinator: RefreshCoordinator,
    builder: RequestBuilder,
    refresh_marker: String,
    expiry_statuses: Vec<u16>,
}

/// Entry point for authenticated calls.
///
/// Every call reads the current access token from the session store, sends it as a
/// bearer credential, and hands expiry responses to the refresh coordinator. Clones share
/// the same coordinator, so concurrent expiries across clones still refresh once.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<Inner>,
}

fn decode<T: DeserializeOwned>(response: TransportResponse) -> Result<T, ApiError> {
    if !response.is_success() {
        return Err(ApiError::Http {
            status: response.status,
            body: response.text(),
        });
    }
    if response.body.iter().all(u8::is_ascii_whitespace) {
        return Ok(serde_json::from_slice(b"null")?);
    }
    Ok(serde_json::from_slice(&response.body)?)
}

impl ApiClient {
    /// Spawns the refresh coordinator task, so it fails with
    /// [`ApiError::CoordinatorUnavailable`] when called outside a tokio runtime.
    pub fn new(
        transport: Arc<dyn Transport>,
        session: Arc<dyn SessionStore>,
        refresher: Arc<dyn TokenRefresher>,
        settings: &ClientSettings,
    ) -> Result<Self, ApiError> {
        let builder = RequestBuilder::from_settings(settings)?;
        let coordinator = RefreshCoordinator::spawn(refresher, session.clone())?;
        Ok(Self {
            inner: Arc::new(Inner {
                transport,
                session,
                coordinator,
                builder,
                refresh_marker: settings.refresh_path.clone(),
                expiry_statuses: settings.expiry_statuses.clone(),
            }),
        })
    }

    /// Client whose refresher calls the configured refresh endpoint over `transport`.
    pub fn with_endpoint_refresher(
        transport: Arc<dyn Transport>,
        session: Arc<dyn SessionStore>,
        settings: &ClientSettings,
    ) -> Result<Self, ApiError> {
        let refresher =
            EndpointRefresher::from_settings(transport.clone(), session.clone(), settings)?;
        Self::new(transport, session, Arc::new(refresher), settings)
    }

    /// reqwest-backed client built entirely from settings.
    pub fn http(settings: &ClientSettings, session: Arc<dyn SessionStore>) -> Result<Self, ApiError> {
        let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(settings)?);
        Self::with_endpoint_refresher(transport, session, settings)
    }

    pub fn session(&self) -> &Arc<dyn SessionStore> {
        &self.inner.session
    }

    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.inner.coordinator
    }

    async fn send_once(&self, request: &ApiRequest) -> Result<TransportResponse, ApiError> {
        let token = self.inner.session.access_token().await;
        let call = self.inner.builder.build(request, token.as_deref())?;
        tracing::debug!(
            method = request.method.as_str(),
            url = %redact_secrets(call.url.as_str()),
            authenticated = token.is_some(),
            "dispatching request"
        );

        match self.inner.transport.execute(call).await {
            Ok(response) => Ok(response),
            Err(e) => {
                tracing::debug!(error = %redact_secrets(&e.to_string()), "transport failure");
                Err(e.into())
            }
        }
    }

    pub async fn execute<T>(&self, request: ApiRequest, recovery: Recovery<T>) -> Result<T, ApiError>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let response = self.send_once(&request).await?;
        if policy::is_expiry(response.status, &self.inner.expiry_statuses) {
            return self.recover(request, recovery, response).await;
        }
        decode(response)
    }

    async fn recover<T>(
        &self,
        request: ApiRequest,
        recovery: Recovery<T>,
        response: TransportResponse,
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned + Send + 'static,
    {
        if policy::targets_refresh_endpoint(&request.path, &self.inner.refresh_marker) {
            tracing::warn!(status = response.status, "refresh endpoint rejected the session");
            self.inner.coordinator.force_logout().await;
            return Err(ApiError::SessionExpired);
        }

        let retry: Arc<dyn Retry<T>> = match recovery {
            Recovery::None => {
                return Err(ApiError::Unauthorized {
                    status: response.status,
                    body: response.text(),
                })
            }
            Recovery::Reissue => Arc::new(Reissue::new(self.clone(), request)),
            Recovery::Continue(retry) => retry,
        };

        match self.inner.coordinator.await_refresh().await? {
            RefreshOutcome::Refreshed => dispatch(retry.as_ref()).await,
            RefreshOutcome::LoggedOut => Err(ApiError::SessionExpired),
        }
    }

    pub async fn get<T>(&self, path: &str, recovery: Recovery<T>) -> Result<T, ApiError>
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.execute(ApiRequest::get(path), recovery).await
    }

    /// GET of a paginated collection.
    pub async fn get_page<T>(
        &self,
        path: &str,
        recovery: Recovery<Page<T>>,
    ) -> Result<Page<T>, ApiError>
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.execute(ApiRequest::get(path), recovery).await
    }

    /// GET of an unpaginated collection.
    pub async fn get_list<T>(&self, path: &str, recovery: Recovery<Vec<T>>) -> Result<Vec<T>, ApiError>
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.execute(ApiRequest::get(path), recovery).await
    }

    pub async fn post<T, B>(&self, path: &str, body: &B, recovery: Recovery<T>) -> Result<T, ApiError>
    where
        T: DeserializeOwned + Send + 'static,
        B: Serialize + ?Sized,
    {
        let body = serde_json::to_value(body)?;
        self.execute(ApiRequest::post(path, body), recovery).await
    }

    pub async fn put<T, B>(&self, path: &str, body: &B, recovery: Recovery<T>) -> Result<T, ApiError>
    where
        T: DeserializeOwned + Send + 'static,
        B: Serialize + ?Sized,
    {
        let body = serde_json::to_value(body)?;
        self.execute(ApiRequest::put(path, body), recovery).await
    }

    pub async fn patch<T, B>(&self, path: &str, body: &B, recovery: Recovery<T>) -> Result<T, ApiError>
    where
        T: DeserializeOwned + Send + 'static,
        B: Serialize + ?Sized,
    {
        let body = serde_json::to_value(body)?;
        self.execute(ApiRequest::patch(path, body), recovery).await
    }

    pub async fn delete<T>(&self, path: &str, recovery: Recovery<T>) -> Result<T, ApiError>
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.execute(ApiRequest::delete(path), recovery).await
    }
}
