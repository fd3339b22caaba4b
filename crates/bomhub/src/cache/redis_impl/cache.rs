//! Async Redis cache.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::{AsyncCommands, IntoConnectionInfo};

use bomhub_core::cache::{Cache, RemoteStats, Result};

use super::error::map_redis_error;
use super::{remote_stats, ttl_millis};

/// Redis cache backend using connection manager for pooling.
///
/// The manager reconnects in the background after a dropped connection;
/// commands issued meanwhile fail with `ConnectionFailed`.
#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
}

impl RedisCache {
    /// Connects and verifies the server answers `PING`.
    ///
    /// # Arguments
    ///
    /// * `target` - Connection info or a URL (e.g., "redis://localhost:6379/0")
    /// * `timeout` - Connect and response timeout
    ///
    /// # Errors
    ///
    /// - `CacheError::ConnectionFailed` if the server cannot be reached
    /// - `CacheError::Authentication` if the server rejects the credentials
    pub async fn connect(target: impl IntoConnectionInfo, timeout: Duration) -> Result<Self> {
        let client = redis::Client::open(target).map_err(map_redis_error)?;
        let config = ConnectionManagerConfig::new()
            .set_number_of_retries(1)
            .set_connection_timeout(timeout)
            .set_response_timeout(timeout);
        let conn = ConnectionManager::new_with_config(client, config)
            .await
            .map_err(map_redis_error)?;

        let cache = Self { conn };
        cache.ping().await?;
        Ok(cache)
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn ping(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(map_redis_error)?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        let result: Option<String> = conn.get(key).await.map_err(map_redis_error)?;
        Ok(result)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.pset_ex::<_, _, ()>(key, value, ttl_millis(ttl))
            .await
            .map_err(map_redis_error)
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let removed: u64 = conn.del(key).await.map_err(map_redis_error)?;
        Ok(removed > 0)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let exists: bool = conn.exists(key).await.map_err(map_redis_error)?;
        Ok(exists)
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<u64> {
        let mut conn = self.conn.clone();

        let keys: Vec<String> = conn.keys(pattern).await.map_err(map_redis_error)?;
        if keys.is_empty() {
            return Ok(0);
        }

        let removed: u64 = conn.del(&keys).await.map_err(map_redis_error)?;
        Ok(removed)
    }

    async fn stats(&self) -> Result<RemoteStats> {
        let mut conn = self.conn.clone();
        let info: redis::InfoDict = redis::cmd("INFO")
            .query_async(&mut conn)
            .await
            .map_err(map_redis_error)?;
        Ok(remote_stats(&info))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::redis_impl::test_support::{redis_url, test_key, TIMEOUT};
    use bomhub_core::cache::CacheError;

    /// Skip test if Redis not available.
    async fn get_test_cache() -> Option<RedisCache> {
        RedisCache::connect(redis_url(), TIMEOUT).await.ok()
    }

    #[tokio::test]
    async fn test_refused_connection_is_connectivity_error() {
        let result = RedisCache::connect("redis://127.0.0.1:1/", TIMEOUT).await;
        assert!(matches!(result, Err(CacheError::ConnectionFailed(_))));
    }

    #[tokio::test]
    async fn test_redis_set_get_delete() {
        let Some(cache) = get_test_cache().await else {
            eprintln!("Skipping test: Redis not available");
            return;
        };

        let key = test_key("set_get");
        cache.set(&key, "hello", Duration::from_secs(60)).await.unwrap();

        assert_eq!(cache.get(&key).await.unwrap(), Some("hello".to_string()));
        assert!(cache.exists(&key).await.unwrap());
        assert!(cache.delete(&key).await.unwrap());
        assert!(!cache.delete(&key).await.unwrap());
        assert_eq!(cache.get(&key).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_redis_ttl() {
        let Some(cache) = get_test_cache().await else {
            eprintln!("Skipping test: Redis not available");
            return;
        };

        let key = test_key("ttl");
        cache.set(&key, "expiring", Duration::from_secs(1)).await.unwrap();
        assert!(cache.exists(&key).await.unwrap());

        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(cache.get(&key).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_redis_delete_pattern() {
        let Some(cache) = get_test_cache().await else {
            eprintln!("Skipping test: Redis not available");
            return;
        };

        let prefix = test_key("parts");
        let ttl = Duration::from_secs(60);
        cache.set(&format!("{prefix}:A"), "a", ttl).await.unwrap();
        cache.set(&format!("{prefix}:B"), "b", ttl).await.unwrap();
        let other = test_key("other");
        cache.set(&other, "c", ttl).await.unwrap();

        let removed = cache.delete_pattern(&format!("{prefix}:*")).await.unwrap();

        assert_eq!(removed, 2);
        assert!(cache.exists(&other).await.unwrap());
        cache.delete(&other).await.unwrap();
    }

    #[tokio::test]
    async fn test_redis_stats() {
        let Some(cache) = get_test_cache().await else {
            eprintln!("Skipping test: Redis not available");
            return;
        };

        let stats = cache.stats().await.unwrap();
        assert!(stats.connected_clients >= 1);
        assert_ne!(stats.used_memory, "N/A");
    }
}
