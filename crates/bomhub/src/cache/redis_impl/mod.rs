//! Redis cache backend.
//!
//! Two flavors of the same adapter: [`RedisCache`] over a multiplexed
//! `ConnectionManager` for async callers, [`BlockingRedisCache`] over a
//! single synchronous connection.

mod blocking;
mod cache;
mod error;

pub use blocking::BlockingRedisCache;
pub use cache::RedisCache;
pub use error::map_redis_error;

/// Parses the numeric fields of an `INFO` reply.
fn remote_stats(info: &redis::InfoDict) -> bomhub_core::cache::RemoteStats {
    bomhub_core::cache::RemoteStats {
        connected_clients: info.get("connected_clients").unwrap_or_default(),
        used_memory: info
            .get("used_memory_human")
            .unwrap_or_else(|| "N/A".to_string()),
        keyspace_hits: info.get("keyspace_hits").unwrap_or_default(),
        keyspace_misses: info.get("keyspace_misses").unwrap_or_default(),
        total_commands_processed: info.get("total_commands_processed").unwrap_or_default(),
    }
}

/// Expiry in whole milliseconds. Redis rejects a zero expiry.
fn ttl_millis(ttl: std::time::Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}
