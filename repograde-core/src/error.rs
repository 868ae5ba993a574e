//! Error types for repograde core.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Error type for repograde core operations.
#[derive(Debug, Error)]
pub enum RepoGradeError {
    /// The source host reported that the repository has no content.
    #[error("repository is empty")]
    EmptyRepository,
    /// The requested user, repository or path does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// The remote capability refused the call because of a rate limit.
    #[error("rate limited: {0}")]
    RateLimited(String),
    /// The remote capability failed or answered with something unusable.
    #[error("upstream unavailable: {0}")]
    Upstream(String),
    /// A remote call exceeded its time budget.
    #[error("call timed out after {0:?}")]
    Timeout(Duration),
    /// File content could not be decoded as text.
    #[error("decode failure: {0}")]
    Decode(String),
    /// An underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    /// JSON encoding or decoding failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    /// A catch-all error with a message.
    #[error("{0}")]
    Other(String),
}

impl RepoGradeError {
    /// Whether the failure should be retried with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited(_) | Self::Timeout(_))
    }
}

/// Convenience result type for repograde core.
pub type Result<T> = std::result::Result<T, RepoGradeError>;

#[cfg(test)]
mod tests {
    use super::RepoGradeError;
    use std::io;
    use std::time::Duration;

    #[test]
    fn io_error_formats_message() {
        let error = RepoGradeError::Io(io::Error::new(io::ErrorKind::Other, "boom"));
        assert_eq!(format!("{error}"), "io error: boom");
    }

    #[test]
    fn other_error_formats_message() {
        let error = RepoGradeError::Other("repograde failed".to_string());
        assert_eq!(format!("{error}"), "repograde failed");
    }

    #[test]
    fn from_io_error_maps_variant() {
        let error: RepoGradeError = io::Error::new(io::ErrorKind::NotFound, "missing").into();
        match error {
            RepoGradeError::Io(inner) => {
                assert_eq!(inner.kind(), io::ErrorKind::NotFound);
            }
            other => panic!("expected Io variant, got {other:?}"),
        }
    }

    #[test]
    fn only_rate_limits_and_timeouts_are_retryable() {
        assert!(RepoGradeError::RateLimited("429".to_string()).is_retryable());
        assert!(RepoGradeError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(!RepoGradeError::Upstream("502".to_string()).is_retryable());
        assert!(!RepoGradeError::EmptyRepository.is_retryable());
    }
}
