use crate::redact::redact_secrets;
use crate::settings::ClientSettings;
use crate::types::Method;
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::Url;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("network error")]
    Network(#[from] reqwest::Error),
    #[error("request timed out")]
    Timeout,
    #[error("connection failed: {0}")]
    Connect(String),
}

impl TransportError {
    fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::Connect(redact_secrets(&err.to_string()).into_owned())
        } else {
            Self::Network(err)
        }
    }
}

/// A fully-resolved call, credentials already attached.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Value>,
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Performs a single network call. Status codes are not interpreted here.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}

pub struct HttpTransport {
    http: reqwest::Client,
}

impl HttpTransport {
    pub fn new(settings: &ClientSettings) -> Result<Self, TransportError> {
        let mut builder = reqwest::Client::builder();
        if let Some(agent) = settings.user_agent.as_deref() {
            builder = builder.user_agent(agent);
        }
        if let Some(timeout) = settings.timeout() {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            http: builder.build()?,
        })
    }

    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let mut builder = self
            .http
            .request(request.method.into(), request.url)
            .headers(request.headers);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        let res = builder.send().await.map_err(TransportError::from_reqwest)?;
        let status = res.status().as_u16();
        let body = res.bytes().await.map_err(TransportError::from_reqwest)?;

        Ok(TransportResponse {
            status,
            body: body.to_vec(),
        })
    }
}
