//! Error types for gravelink-resolver
//!
//! Severity:
//! - `Api(Transient)`: already retried once inside the client
//! - `Api(AuthenticationRequired)`: person stage blocked until the user signs in
//! - `RateLimitSuspected`: non-terminal, the memorial stays unresolved
//! - a missing record/person is not an error, it is the `Absent` state

use crate::api::ApiError;
use crate::store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolverError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// Search returned more matches than plausible; the upstream service is
    /// most likely throttling us
    #[error(
        "Search for memorial {memorial_id} returned {matches} records. This is likely because \
         we hit the API too fast. Take a break for a few minutes and try again"
    )]
    RateLimitSuspected { memorial_id: String, matches: usize },

    /// The pipeline's workers have shut down
    #[error("Resolver pipeline is shut down")]
    Closed,
}

impl ResolverError {
    pub fn is_authentication_required(&self) -> bool {
        matches!(self, ResolverError::Api(ApiError::AuthenticationRequired))
    }
}

pub type ResolverResult<T> = Result<T, ResolverError>;
