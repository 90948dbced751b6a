use scylla::errors::{DbError, ExecutionError, NewSessionError, RequestAttemptError};

use crate::utils::IsTransient;

// ============================================================================
// Store Errors
// ============================================================================
//
// Single error type for the context, gateway and streams. Driver errors are
// mapped once here so that throttling and timeouts can be told apart from
// everything else by the retry loop.
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to connect: {0}")]
    Connection(String),

    #[error("Request throttled by the store: {0}")]
    Throttled(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Store error: {0}")]
    Backend(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Store used before connect completed")]
    NotConnected,

    #[error("Stream {stream} still conflicting after {attempts} attempts")]
    MaxResyncsExhausted { stream: String, attempts: u32 },
}

pub type Result<T, E = StoreError> = std::result::Result<T, E>;

impl StoreError {
    pub fn backend(err: impl std::fmt::Display) -> Self {
        StoreError::Backend(err.to_string())
    }

    /// Rejected before it was applied, so safe to send again even for writes
    pub fn is_throttled(&self) -> bool {
        matches!(self, StoreError::Throttled(_))
    }
}

impl IsTransient for StoreError {
    fn is_transient(&self) -> bool {
        matches!(self, StoreError::Throttled(_) | StoreError::Timeout(_))
    }
}

impl From<NewSessionError> for StoreError {
    fn from(err: NewSessionError) -> Self {
        StoreError::Connection(err.to_string())
    }
}

impl From<ExecutionError> for StoreError {
    fn from(err: ExecutionError) -> Self {
        match &err {
            ExecutionError::RequestTimeout(_) => StoreError::Timeout(err.to_string()),
            ExecutionError::LastAttemptError(RequestAttemptError::DbError(db, _)) => match db {
                DbError::Overloaded
                | DbError::RateLimitReached { .. }
                | DbError::Unavailable { .. } => StoreError::Throttled(err.to_string()),
                DbError::ReadTimeout { .. } | DbError::WriteTimeout { .. } => {
                    StoreError::Timeout(err.to_string())
                }
                _ => StoreError::Backend(err.to_string()),
            },
            _ => StoreError::Backend(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_throttling_and_timeouts_are_transient() {
        assert!(StoreError::Throttled("429".into()).is_transient());
        assert!(StoreError::Timeout("5s".into()).is_transient());
    }

    #[test]
    fn test_other_errors_are_permanent() {
        assert!(!StoreError::NotConnected.is_transient());
        assert!(!StoreError::Config("bad".into()).is_transient());
        assert!(!StoreError::backend("syntax error").is_transient());
    }

    #[test]
    fn test_only_throttling_counts_as_throttled() {
        assert!(StoreError::Throttled("429".into()).is_throttled());
        assert!(!StoreError::Timeout("write timeout".into()).is_throttled());
    }

    #[test]
    fn test_resync_error_names_stream() {
        let err = StoreError::MaxResyncsExhausted {
            stream: "Todos-1".into(),
            attempts: 3,
        };
        assert_eq!(err.to_string(), "Stream Todos-1 still conflicting after 3 attempts");
    }
}
