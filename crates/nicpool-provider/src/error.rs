//! Provider gateway error types.

use thiserror::Error;

/// Result type alias for gateway operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Errors a provider gateway call can report.
///
/// `NotFound` is load-bearing for the core: it distinguishes a resource
/// that vanished between read and act from a call that failed outright.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("conflicting request: {0}")]
    Conflict(String),

    #[error("provider api error: {0}")]
    Api(String),
}
