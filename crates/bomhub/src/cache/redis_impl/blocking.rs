//! Blocking Redis cache.

use std::time::Duration;

use parking_lot::Mutex;
use redis::{Commands, IntoConnectionInfo, RedisResult};

use bomhub_core::cache::{BlockingCache, CacheError, RemoteStats, Result};

use super::error::map_redis_error;
use super::{remote_stats, ttl_millis};

/// Redis cache over a single synchronous connection.
///
/// The connection is opened lazily and dropped after a connectivity error, so
/// the next call reconnects.
pub struct BlockingRedisCache {
    client: redis::Client,
    timeout: Duration,
    conn: Mutex<Option<redis::Connection>>,
}

impl BlockingRedisCache {
    /// Connects and verifies the server answers `PING`.
    pub fn connect(target: impl IntoConnectionInfo, timeout: Duration) -> Result<Self> {
        let client = redis::Client::open(target).map_err(map_redis_error)?;
        let cache = Self {
            client,
            timeout,
            conn: Mutex::new(None),
        };
        cache.ping()?;
        Ok(cache)
    }

    fn open(&self) -> Result<redis::Connection> {
        let conn = self
            .client
            .get_connection_with_timeout(self.timeout)
            .map_err(map_redis_error)?;
        conn.set_read_timeout(Some(self.timeout))
            .map_err(map_redis_error)?;
        conn.set_write_timeout(Some(self.timeout))
            .map_err(map_redis_error)?;
        Ok(conn)
    }

    fn run<T>(&self, command: impl FnOnce(&mut redis::Connection) -> RedisResult<T>) -> Result<T> {
        let mut guard = self.conn.lock();
        if guard.is_none() {
            *guard = Some(self.open()?);
        }
        let Some(conn) = guard.as_mut() else {
            return Err(CacheError::ConnectionFailed("not connected".to_string()));
        };

        command(conn).map_err(|e| {
            let error = map_redis_error(e);
            if error.is_connectivity() {
                *guard = None;
            }
            error
        })
    }
}

impl BlockingCache for BlockingRedisCache {
    fn ping(&self) -> Result<()> {
        self.run(|conn| redis::cmd("PING").query::<String>(conn).map(|_| ()))
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        self.run(|conn| conn.get(key))
    }

    fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        self.run(|conn| conn.pset_ex(key, value, ttl_millis(ttl)))
    }

    fn delete(&self, key: &str) -> Result<bool> {
        self.run(|conn| conn.del::<_, u64>(key).map(|removed| removed > 0))
    }

    fn exists(&self, key: &str) -> Result<bool> {
        self.run(|conn| conn.exists(key))
    }

    fn delete_pattern(&self, pattern: &str) -> Result<u64> {
        self.run(|conn| {
            let keys: Vec<String> = conn.keys(pattern)?;
            if keys.is_empty() {
                return Ok(0);
            }
            conn.del(&keys)
        })
    }

    fn stats(&self) -> Result<RemoteStats> {
        self.run(|conn| {
            let info: redis::InfoDict = redis::cmd("INFO").query(conn)?;
            Ok(remote_stats(&info))
        })
    }
}
