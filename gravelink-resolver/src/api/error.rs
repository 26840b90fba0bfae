//! Archive API client errors

use crate::store::StoreError;
use crate::transport::{HttpResponse, TransportError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Timeout or connection failure; eligible for one retry
    #[error("Network error: {0}")]
    Transient(String),

    /// Non-success HTTP status
    #[error("API error {status}: {body}")]
    Status { status: u16, body: String },

    /// No usable authenticated session; never retried
    #[error("Authentication required")]
    AuthenticationRequired,

    #[error("Parse error: {0}")]
    Parse(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<TransportError> for ApiError {
    fn from(err: TransportError) -> Self {
        ApiError::Transient(err.0)
    }
}

impl ApiError {
    /// Classify a response that was not `ok()`
    pub(crate) fn from_response(response: &HttpResponse) -> Self {
        if response.timed_out {
            ApiError::Transient("request timed out".to_string())
        } else {
            ApiError::Status {
                status: response.status,
                body: truncate(&response.body, 200),
            }
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_auth_failure(&self) -> bool {
        matches!(self.status(), Some(401) | Some(403))
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, ApiError::Transient(_))
    }
}

fn truncate(body: &str, max_chars: usize) -> String {
    match body.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_timeout() {
        let err = ApiError::from_response(&HttpResponse::timeout());
        assert!(err.is_transient());
        assert_eq!(err.status(), None);
    }

    #[test]
    fn test_classify_status() {
        let err = ApiError::from_response(&HttpResponse::new(403, "forbidden"));
        assert!(err.is_auth_failure());
        assert_eq!(err.status(), Some(403));

        let err = ApiError::from_response(&HttpResponse::new(500, "x".repeat(500)));
        assert!(!err.is_auth_failure());
        match err {
            ApiError::Status { body, .. } => assert_eq!(body.len(), 203),
            other => panic!("unexpected {:?}", other),
        }
    }
}
