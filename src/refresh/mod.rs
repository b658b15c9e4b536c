mod coordinator;
pub mod policy;
mod refresher;
mod retry;

pub use coordinator::{RefreshCoordinator, RefreshOutcome, RefreshState};
pub use refresher::{EndpointRefresher, RefreshError, TokenRefresher};
pub use retry::{Recovery, Retry};

pub(crate) use retry::{dispatch, Reissue};
