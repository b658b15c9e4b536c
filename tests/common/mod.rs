//! In-memory collaborators for driving the pipeline without a network.

#![allow(dead_code)]

use async_trait::async_trait;
use authfetch::settings::ClientSettings;
use authfetch::{
    ApiClient, MemorySessionStore, Method, SessionStore, Transport, TransportError,
    TransportRequest, TransportResponse,
};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const REFRESH_PATH: &str = "auth/refresh-token/";

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    pub path: String,
    pub authorization: Option<String>,
    pub body: Option<Value>,
}

type Handler = dyn Fn(&Recorded) -> Result<TransportResponse, TransportError> + Send + Sync;

/// Scripted transport: every call waits `latency`, then answers from `handler`.
pub struct FakeTransport {
    handler: Box<Handler>,
    latency: Duration,
    log: Mutex<Vec<Recorded>>,
}

impl FakeTransport {
    pub fn new<F>(latency: Duration, handler: F) -> Arc<Self>
    where
        F: Fn(&Recorded) -> Result<TransportResponse, TransportError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            handler: Box::new(handler),
            latency,
            log: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.log.lock().unwrap().clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<Recorded> {
        self.requests()
            .into_iter()
            .filter(|r| r.path.ends_with(path))
            .collect()
    }

    pub fn refresh_calls(&self) -> usize {
        self.requests_to(REFRESH_PATH).len()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn execute(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let recorded = Recorded {
            method: request.method,
            path: request.url.path().to_string(),
            authorization: request
                .headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
            body: request.body.clone(),
        };
        self.log.lock().unwrap().push(recorded.clone());
        tokio::time::sleep(self.latency).await;
        (self.handler)(&recorded)
    }
}

pub fn json_response(status: u16, body: Value) -> Result<TransportResponse, TransportError> {
    Ok(TransportResponse {
        status,
        body: serde_json::to_vec(&body).unwrap(),
    })
}

/// Session store that counts the writes the coordinator performs.
#[derive(Default)]
pub struct CountingStore {
    pub inner: MemorySessionStore,
    pub logouts: AtomicUsize,
    pub token_updates: AtomicUsize,
}

impl CountingStore {
    pub async fn logged_in(access: &str, refresh: &str) -> Arc<Self> {
        let store = Arc::new(Self::default());
        store
            .inner
            .login(access.to_string(), Some(refresh.to_string()))
            .await;
        store
    }

    pub fn logouts(&self) -> usize {
        self.logouts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionStore for CountingStore {
    async fn access_token(&self) -> Option<String> {
        self.inner.access_token().await
    }

    async fn refresh_token(&self) -> Option<String> {
        self.inner.refresh_token().await
    }

    async fn set_access_token(&self, token: String) {
        self.token_updates.fetch_add(1, Ordering::SeqCst);
        self.inner.set_access_token(token).await;
    }

    async fn logout(&self) {
        self.logouts.fetch_add(1, Ordering::SeqCst);
        self.inner.logout().await;
    }
}

pub fn settings() -> ClientSettings {
    ClientSettings {
        base_url: Some("http://api.test/".to_string()),
        refresh_path: REFRESH_PATH.to_string(),
        ..ClientSettings::default()
    }
}

pub fn client(transport: Arc<FakeTransport>, store: Arc<CountingStore>) -> ApiClient {
    ApiClient::with_endpoint_refresher(transport, store, &settings()).unwrap()
}
