mod client;
mod error;
pub mod redact;
pub mod refresh;
mod request;
pub mod settings;
pub mod state;
pub mod transport;
pub mod types;

pub use client::ApiClient;
pub use error::ApiError;
pub use refresh::{Recovery, RefreshCoordinator, RefreshOutcome, RefreshState, Retry, TokenRefresher};
pub use request::RequestBuilder;
pub use settings::ClientSettings;
pub use state::{CookieSession, MemorySessionStore, SessionStore};
pub use transport::{HttpTransport, Transport, TransportError, TransportRequest, TransportResponse};
pub use types::{ApiRequest, Method, Page, RequestOptions, Session};
