//! Retrieval Error Types

use std::time::Duration;

use super::request_type::RequestType;

/// Failure of a single or paged retrieval.
///
/// `E` is the error type of the invocation supplied by the caller. Upstream
/// failures are handed back unmodified so callers can classify them.
#[derive(Debug, thiserror::Error)]
pub enum FetchError<E> {
    /// No rate permit became available within the backoff bound
    #[error("No rate permit available within {backoff:?}")]
    RateUnavailable { backoff: Duration },

    /// The invocation did not resolve in time
    #[error("{kind} request for '{key}' timed out after {timeout:?}")]
    RequestTimeout {
        kind: RequestType,
        key: String,
        timeout: Duration,
    },

    /// Any other failure raised by the invocation
    #[error(transparent)]
    Upstream(E),
}

impl<E> FetchError<E> {
    /// Whether this failure belongs to the timeout class
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            FetchError::RateUnavailable { .. } | FetchError::RequestTimeout { .. }
        )
    }

    /// The invocation's own error, if that is what failed
    pub fn upstream(&self) -> Option<&E> {
        match self {
            FetchError::Upstream(e) => Some(e),
            _ => None,
        }
    }

    pub fn into_upstream(self) -> Option<E> {
        match self {
            FetchError::Upstream(e) => Some(e),
            _ => None,
        }
    }
}

/// Errors raised by control plane transports
#[derive(Debug, thiserror::Error)]
pub enum ControlPlaneError {
    /// Transport-level failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The control plane answered with a non-success status
    #[error("Control plane returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// The body could not be decoded
    #[error("Failed to decode control plane response: {0}")]
    Decode(#[from] serde_json::Error),

    /// Referenced resource does not exist
    #[error("Unknown {kind} '{id}'")]
    Unknown { kind: &'static str, id: String },

    /// Invalid request parameters
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The transport could not be set up from its settings
    #[error("Invalid configuration: {0}")]
    Configuration(String),
}

/// Result of an accessor call
pub type AccessorResult<T> = Result<T, FetchError<ControlPlaneError>>;
