use std::time::Duration;

use async_trait::async_trait;

use super::{RemoteStats, Result};

/// Remote key/value store operations, async flavor.
///
/// Values are opaque text; encoding is the caller's concern. Implementations
/// report "store unreachable" as [`CacheError::ConnectionFailed`] so callers
/// can degrade instead of failing.
///
/// [`CacheError::ConnectionFailed`]: super::CacheError::ConnectionFailed
#[async_trait]
pub trait Cache: Send + Sync {
    /// Checks that the store answers.
    async fn ping(&self) -> Result<()>;

    /// Gets a value by key.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Sets a value with a TTL.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    /// Deletes a key, returning whether it existed.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Returns whether a key exists.
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Deletes every key matching a glob pattern, returning how many were removed.
    async fn delete_pattern(&self, pattern: &str) -> Result<u64>;

    /// Server-side statistics.
    async fn stats(&self) -> Result<RemoteStats>;
}

/// Remote key/value store operations, blocking flavor.
///
/// Same contract as [`Cache`], for thread-per-request callers.
pub trait BlockingCache: Send + Sync {
    fn ping(&self) -> Result<()>;

    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    fn delete(&self, key: &str) -> Result<bool>;

    fn exists(&self, key: &str) -> Result<bool>;

    fn delete_pattern(&self, pattern: &str) -> Result<u64>;

    fn stats(&self) -> Result<RemoteStats>;
}
