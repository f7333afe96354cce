//! Error types for the object cache
//!
//! Provides unified error handling using thiserror. Backends and the remote
//! client speak `Result`; the object cache facade folds every error into a
//! conservative miss / `false` before it reaches callers.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for backend and remote operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// Backend server did not respond
    #[error("Remote unavailable: {0}")]
    RemoteUnavailable(String),

    /// Key not present on the server
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Conditional write refused because the key already exists
    #[error("Key not stored: {0}")]
    NotStored(String),

    /// Numeric operation on a non-numeric value
    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    /// Invalid request data (key too long, value too large)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Internal backend error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CacheError {
    /// True when the failure came from an unreachable server rather than
    /// from the server's answer.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, CacheError::RemoteUnavailable(_))
    }
}

// == Result Type Alias ==
/// Convenience Result type for the object cache.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CacheError::NotStored("k".to_string());
        assert_eq!(err.to_string(), "Key not stored: k");
    }

    #[test]
    fn test_is_unavailable() {
        assert!(CacheError::RemoteUnavailable("node-1".into()).is_unavailable());
        assert!(!CacheError::NotFound("k".into()).is_unavailable());
    }
}
