use thiserror::Error;

/// Errors that can occur during cache operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// The remote cache could not be reached. Callers degrade to the
    /// in-process store when they see this variant.
    #[error("Cache connection failed: {0}")]
    ConnectionFailed(String),
    /// The remote cache rejected the configured credentials.
    #[error("Cache authentication failed: {0}")]
    Authentication(String),
    #[error("Cache operation failed: {0}")]
    OperationFailed(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Cache service is not initialized")]
    NotInitialized,
}

impl CacheError {
    /// Returns true for failures that mean "the remote store is unreachable"
    /// rather than "the remote store refused this command".
    pub fn is_connectivity(&self) -> bool {
        matches!(self, CacheError::ConnectionFailed(_))
    }
}

/// Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;
