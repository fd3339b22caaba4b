//! Settles a remote cache result against the in-process store.
//!
//! Shared by the async and blocking services so both degrade the same way:
//! connectivity failures are served from memory, anything else is logged
//! and treated as a miss.

use std::time::Duration;

use bomhub_core::cache::{CacheError, CacheStats, CachedValue, RemoteStats, Result};

use super::MemoryStore;

pub(crate) fn settle_set(
    result: Result<()>,
    memory: &MemoryStore,
    key: &str,
    value: CachedValue,
    ttl: Duration,
) -> Result<()> {
    match result {
        Ok(()) => {
            tracing::trace!(key, ttl = ?ttl, "Cached value");
            memory.remove(key);
            Ok(())
        }
        Err(e) if e.is_connectivity() => {
            tracing::warn!(key, error = %e, "Remote cache unreachable, storing in memory");
            memory.insert(key, value, ttl);
            Ok(())
        }
        Err(e) => {
            tracing::error!(key, error = %e, "Failed to cache value");
            Err(match e {
                CacheError::OperationFailed(_) => e,
                other => CacheError::OperationFailed(other.to_string()),
            })
        }
    }
}

pub(crate) fn settle_get(
    result: Result<Option<String>>,
    memory: &MemoryStore,
    key: &str,
) -> Option<CachedValue> {
    match result {
        Ok(Some(raw)) => {
            tracing::trace!(key, "Cache hit");
            Some(CachedValue::decode(&raw))
        }
        Ok(None) => {
            tracing::trace!(key, "Cache miss");
            None
        }
        Err(e) if e.is_connectivity() => {
            tracing::warn!(key, error = %e, "Remote cache unreachable, reading from memory");
            memory.get(key)
        }
        Err(e) => {
            tracing::error!(key, error = %e, "Failed to read cached value");
            None
        }
    }
}

/// Deletes fall back to memory on any failure. The memory copy is removed in
/// every case.
pub(crate) fn settle_delete(result: Result<bool>, memory: &MemoryStore, key: &str) -> bool {
    let removed_locally = memory.remove(key);
    match result {
        Ok(removed) => removed,
        Err(e) => {
            tracing::warn!(key, error = %e, "Remote delete failed, deleted from memory");
            removed_locally
        }
    }
}

pub(crate) fn settle_exists(result: Result<bool>, memory: &MemoryStore, key: &str) -> bool {
    match result {
        Ok(exists) => exists,
        Err(e) if e.is_connectivity() => {
            tracing::warn!(key, error = %e, "Remote cache unreachable, checking memory");
            memory.contains(key)
        }
        Err(e) => {
            tracing::error!(key, error = %e, "Failed to check cached key");
            false
        }
    }
}

/// Bulk deletes always clear matching memory entries too.
pub(crate) fn settle_clear(result: Result<u64>, memory: &MemoryStore, pattern: &str) -> u64 {
    let removed_locally = memory.remove_matching(pattern) as u64;
    match result {
        Ok(removed) => {
            tracing::debug!(pattern, removed, "Cleared cache pattern");
            removed
        }
        Err(e) if e.is_connectivity() => {
            tracing::warn!(pattern, error = %e, "Remote cache unreachable, cleared memory");
            removed_locally
        }
        Err(e) => {
            tracing::error!(pattern, error = %e, "Failed to clear cache pattern");
            0
        }
    }
}

pub(crate) fn settle_stats(result: Result<RemoteStats>) -> CacheStats {
    match result {
        Ok(stats) => CacheStats::Redis(stats),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to collect cache statistics");
            CacheStats::Unavailable {
                error: e.to_string(),
            }
        }
    }
}

pub(crate) fn memory_stats(memory: &MemoryStore) -> CacheStats {
    CacheStats::Memory {
        total_keys: memory.live_len(),
    }
}
