//! Session-aware archive API clients
//!
//! Both clients wrap an [`HttpTransport`](crate::transport::HttpTransport),
//! inject a bearer token, self-throttle, and retry once on transient failure.
//! They differ in who owns the session: the anonymous client mints its own,
//! the authenticated client only consumes one supplied from outside.

pub mod anonymous;
pub mod authenticated;
pub mod error;
pub mod models;
pub mod throttle;

pub use anonymous::AnonymousApiClient;
pub use authenticated::AuthenticatedApiClient;
pub use error::{ApiError, ApiResult};
pub use throttle::RequestThrottle;
