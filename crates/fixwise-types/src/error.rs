use thiserror::Error;

use crate::session::SessionId;

/// Errors surfaced to callers of the session manager.
///
/// Only structural problems live here. Adapter and vision failures are
/// absorbed into data before they reach this layer.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session '{0}' not found")]
    NotFound(SessionId),

    #[error("session '{0}' already exists")]
    AlreadyExists(SessionId),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("storage error: {0}")]
    Storage(#[from] RepositoryError),
}

/// Errors from a single knowledge source lookup.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("adapter timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },

    #[error("adapter unreachable: {0}")]
    Unreachable(String),

    #[error("invalid adapter response: {0}")]
    InvalidResponse(String),
}

/// Errors from the vision classifier.
#[derive(Debug, Error)]
pub enum VisionError {
    #[error("vision unavailable: {0}")]
    Unavailable(String),

    #[error("vision timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },

    #[error("invalid vision response: {0}")]
    InvalidResponse(String),
}

/// Errors from repository operations (used by store traits in fixwise-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_error_display() {
        let err = SessionError::NotFound(SessionId::from("s-1"));
        assert_eq!(err.to_string(), "session 's-1' not found");
    }

    #[test]
    fn test_session_error_from_repository() {
        let err: SessionError = RepositoryError::Query("syntax error".to_string()).into();
        assert_eq!(err.to_string(), "storage error: query error: syntax error");
    }

    #[test]
    fn test_adapter_error_display() {
        let err = AdapterError::Timeout { after_ms: 8000 };
        assert_eq!(err.to_string(), "adapter timed out after 8000ms");
    }

    #[test]
    fn test_vision_error_display() {
        let err = VisionError::Unavailable("no endpoint".to_string());
        assert!(err.to_string().contains("no endpoint"));
    }
}
