use std::time::Duration;

use thiserror::Error;

/// An error reported by a database driver.
///
/// Drivers live outside this crate; their errors are flattened to text at the
/// boundary so the pool taxonomy stays driver-agnostic.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct DriverError(String);

impl DriverError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

/// Errors that can occur while creating or using a connection pool.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("Invalid pool configuration: {0}")]
    InvalidConfig(String),
    /// The pool could not be constructed. Not retried: this is a
    /// misconfiguration or an unreachable database at startup.
    #[error("Failed to create connection pool: {0}")]
    Create(DriverError),
    /// A new physical connection could not be opened.
    #[error("Failed to open connection: {0}")]
    Connect(DriverError),
    #[error("Timed out after {0:?} waiting for a pooled connection")]
    Timeout(Duration),
    /// Every acquisition attempt failed or produced an unhealthy connection.
    #[error("No healthy connection available after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: String },
    #[error("Connection pool is closed")]
    Closed,
}

impl PoolError {
    /// Returns true for failures that a retry might fix.
    pub fn is_transient(&self) -> bool {
        matches!(self, PoolError::Connect(_) | PoolError::Timeout(_))
    }
}

/// Result type for pool operations.
pub type Result<T> = std::result::Result<T, PoolError>;
