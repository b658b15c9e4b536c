use crate::error::ApiError;
use crate::settings::{AnonymousAuth, ClientSettings, SettingsError};
use crate::transport::TransportRequest;
use crate::types::ApiRequest;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::Url;
use std::time::Duration;

/// Turns a logical request into a transport call with credentials attached.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    base_url: Url,
    anonymous_auth: AnonymousAuth,
    default_timeout: Option<Duration>,
}

fn is_absolute(path: &str) -> bool {
    path.starts_with("http://") || path.starts_with("https://")
}

fn encode_query(query: &[(String, String)]) -> String {
    query
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

impl RequestBuilder {
    pub fn new(base_url: Url, anonymous_auth: AnonymousAuth) -> Self {
        Self {
            base_url,
            anonymous_auth,
            default_timeout: None,
        }
    }

    pub fn from_settings(settings: &ClientSettings) -> Result<Self, SettingsError> {
        Ok(Self {
            base_url: settings.base_url()?,
            anonymous_auth: settings.anonymous_auth,
            default_timeout: settings.timeout(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn resolve_url(&self, path: &str, query: &[(String, String)]) -> Result<Url, ApiError> {
        let mut url = if is_absolute(path) {
            path.to_string()
        } else {
            let base = self.base_url.as_str().trim_end_matches('/');
            format!("{base}/{}", path.trim_start_matches('/'))
        };

        if !query.is_empty() {
            url.push(if url.contains('?') { '&' } else { '?' });
            url.push_str(&encode_query(query));
        }

        Url::parse(&url).map_err(|e| ApiError::InvalidUrl(format!("{url}: {e}")))
    }

    fn authorization(&self, token: Option<&str>) -> Result<Option<HeaderValue>, ApiError> {
        match token.map(str::trim).filter(|t| !t.is_empty()) {
            Some(token) => HeaderValue::from_str(&format!("Bearer {token}"))
                .map(Some)
                .map_err(|_| ApiError::InvalidHeader(AUTHORIZATION.to_string())),
            None => Ok(match self.anonymous_auth {
                AnonymousAuth::Omit => None,
                AnonymousAuth::Empty => Some(HeaderValue::from_static("")),
            }),
        }
    }

    pub fn build(&self, request: &ApiRequest, token: Option<&str>) -> Result<TransportRequest, ApiError> {
        let url = self.resolve_url(&request.path, &request.options.query)?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        for (name, value) in &request.options.headers {
            let header = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| ApiError::InvalidHeader(name.clone()))?;
            let value = HeaderValue::from_str(value).map_err(|_| ApiError::InvalidHeader(name.clone()))?;
            headers.insert(header, value);
        }
        // Session credentials win over caller-supplied headers.
        if let Some(value) = self.authorization(token)? {
            headers.insert(AUTHORIZATION, value);
        }

        Ok(TransportRequest {
            method: request.method,
            url,
            headers,
            body: request.body.clone(),
            timeout: request.options.timeout.or(self.default_timeout),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Method;
    use serde_json::json;

    fn builder(anonymous_auth: AnonymousAuth) -> RequestBuilder {
        RequestBuilder::new(Url::parse("https://api.example.com/v1/").unwrap(), anonymous_auth)
    }

    #[test]
    fn resolve_url_joins_with_single_slash() {
        let b = builder(AnonymousAuth::Omit);
        assert_eq!(
            b.resolve_url("/users/", &[]).unwrap().as_str(),
            "https://api.example.com/v1/users/"
        );
        assert_eq!(
            b.resolve_url("users/1/", &[]).unwrap().as_str(),
            "https://api.example.com/v1/users/1/"
        );
    }

    #[test]
    fn resolve_url_keeps_absolute_urls_and_encodes_query() {
        let b = builder(AnonymousAuth::Omit);
        let query = vec![
            ("search".to_string(), "a b&c".to_string()),
            ("page".to_string(), "2".to_string()),
        ];
        let url = b.resolve_url("https://other.example.com/items/?x=1", &query).unwrap();
        assert_eq!(
            url.as_str(),
            "https://other.example.com/items/?x=1&search=a%20b%26c&page=2"
        );
    }

    #[test]
    fn build_injects_bearer_token() {
        let b = builder(AnonymousAuth::Omit);
        let req = ApiRequest::post("items/", json!({"name": "x"}));
        let built = b.build(&req, Some("T1")).unwrap();

        assert_eq!(built.method, Method::Post);
        assert_eq!(built.headers.get(AUTHORIZATION).unwrap(), "Bearer T1");
        assert_eq!(built.headers.get(ACCEPT).unwrap(), "application/json");
        assert_eq!(built.body, Some(json!({"name": "x"})));
    }

    #[test]
    fn build_without_token_respects_anonymous_mode() {
        let req = ApiRequest::get("items/");

        let omitted = builder(AnonymousAuth::Omit).build(&req, None).unwrap();
        assert!(omitted.headers.get(AUTHORIZATION).is_none());

        let empty = builder(AnonymousAuth::Empty).build(&req, None).unwrap();
        assert_eq!(empty.headers.get(AUTHORIZATION).unwrap(), "");
    }

    #[test]
    fn session_token_overrides_caller_authorization() {
        let req = ApiRequest::get("items/")
            .header("Authorization", "Bearer stale")
            .header("X-Trace", "abc");
        let built = builder(AnonymousAuth::Omit).build(&req, Some("fresh")).unwrap();

        assert_eq!(built.headers.get(AUTHORIZATION).unwrap(), "Bearer fresh");
        assert_eq!(built.headers.get("x-trace").unwrap(), "abc");
    }

    #[test]
    fn build_rejects_invalid_header_name() {
        let req = ApiRequest::get("items/").header("bad header", "x");
        let err = builder(AnonymousAuth::Omit).build(&req, None).unwrap_err();
        assert!(matches!(err, ApiError::InvalidHeader(name) if name == "bad header"));
    }
}
