//! Async cache service.
//!
//! Fronts a remote [`Cache`] with an in-process [`MemoryStore`]. The backend
//! is chosen once by [`CacheService::initialize`]: Redis when it answers,
//! memory otherwise. While Redis is selected, each call that hits a
//! connectivity error is served from memory instead.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::RwLock;

use bomhub_core::cache::{
    parts_key, project_data_pattern, project_key, session_key, user_key, user_sessions_pattern,
    Cache, CacheClass, CacheError, CacheStats, CachedValue, Expiry, Result,
};

use super::fallback::{
    memory_stats, settle_clear, settle_delete, settle_exists, settle_get, settle_set,
    settle_stats,
};
use super::{MemoryStore, RedisCache};

/// How to reach the remote cache.
#[derive(Debug, Clone)]
pub struct CacheSettings {
    /// `None` runs in memory mode without trying Redis.
    pub redis: Option<redis::ConnectionInfo>,
    pub timeout: Duration,
    pub max_entries: usize,
}

#[derive(Clone)]
enum Backend {
    Remote(Arc<dyn Cache>),
    Memory,
}

/// Cache with transparent fallback to an in-process store.
pub struct CacheService {
    settings: CacheSettings,
    /// `None` until initialized.
    backend: RwLock<Option<Backend>>,
    memory: MemoryStore,
}

impl CacheService {
    pub fn new(settings: CacheSettings) -> Self {
        Self {
            memory: MemoryStore::new(settings.max_entries),
            settings,
            backend: RwLock::new(None),
        }
    }

    /// An initialized service over the given remote store.
    pub fn with_remote(remote: Arc<dyn Cache>, max_entries: usize) -> Self {
        Self {
            settings: CacheSettings {
                redis: None,
                timeout: Duration::from_secs(5),
                max_entries,
            },
            backend: RwLock::new(Some(Backend::Remote(remote))),
            memory: MemoryStore::new(max_entries),
        }
    }

    /// Connects to Redis, or selects memory mode if it cannot be reached.
    ///
    /// Idempotent: once a backend is selected further calls do nothing.
    ///
    /// # Errors
    ///
    /// `CacheError::Authentication` if Redis rejects the credentials. The
    /// service stays uninitialized.
    pub async fn initialize(&self) -> Result<()> {
        let settings = self.settings.clone();

        self.initialize_with(|| async move {
            let Some(info) = settings.redis else {
                return Ok(None);
            };
            let cache = RedisCache::connect(info, settings.timeout).await?;
            Ok(Some(Arc::new(cache) as Arc<dyn Cache>))
        })
        .await
    }

    async fn initialize_with<F, Fut>(&self, connect: F) -> Result<()>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<Arc<dyn Cache>>>>,
    {
        let mut backend = self.backend.write().await;
        if backend.is_some() {
            return Ok(());
        }

        let selected = match connect().await {
            Ok(Some(remote)) => {
                tracing::info!("Redis cache connected");
                Backend::Remote(remote)
            }
            Ok(None) => {
                tracing::info!("No Redis configured, using in-memory cache");
                Backend::Memory
            }
            Err(CacheError::Authentication(e)) => {
                tracing::error!(error = %e, "Redis rejected credentials");
                return Err(CacheError::Authentication(e));
            }
            Err(e) => {
                tracing::warn!(error = %e, "Redis unavailable, using in-memory cache");
                Backend::Memory
            }
        };

        *backend = Some(selected);
        Ok(())
    }

    pub async fn is_initialized(&self) -> bool {
        self.backend.read().await.is_some()
    }

    /// True when Redis is the selected backend.
    pub async fn is_remote(&self) -> bool {
        matches!(*self.backend.read().await, Some(Backend::Remote(_)))
    }

    async fn backend(&self) -> Result<Backend> {
        self.backend
            .read()
            .await
            .clone()
            .ok_or(CacheError::NotInitialized)
    }

    /// Stores a value. `expiry` is an explicit TTL or a [`CacheClass`].
    ///
    /// # Errors
    ///
    /// - `CacheError::NotInitialized` before [`initialize`](Self::initialize)
    /// - `CacheError::OperationFailed` if Redis is reachable but rejects the
    ///   write
    pub async fn set(
        &self,
        key: &str,
        value: impl Into<CachedValue>,
        expiry: impl Into<Expiry>,
    ) -> Result<()> {
        let value = value.into();
        let ttl = expiry.into().ttl();

        match self.backend().await? {
            Backend::Remote(remote) => {
                let encoded = value.encode()?;
                let result = remote.set(key, &encoded, ttl).await;
                settle_set(result, &self.memory, key, value, ttl)
            }
            Backend::Memory => {
                self.memory.insert(key, value, ttl);
                Ok(())
            }
        }
    }

    /// Reads a value; `None` on a miss.
    pub async fn get(&self, key: &str) -> Result<Option<CachedValue>> {
        match self.backend().await? {
            Backend::Remote(remote) => {
                let result = remote.get(key).await;
                Ok(settle_get(result, &self.memory, key))
            }
            Backend::Memory => Ok(self.memory.get(key)),
        }
    }

    /// Deletes a key, returning whether it existed.
    pub async fn delete(&self, key: &str) -> Result<bool> {
        match self.backend().await? {
            Backend::Remote(remote) => {
                let result = remote.delete(key).await;
                Ok(settle_delete(result, &self.memory, key))
            }
            Backend::Memory => Ok(self.memory.remove(key)),
        }
    }

    pub async fn exists(&self, key: &str) -> Result<bool> {
        match self.backend().await? {
            Backend::Remote(remote) => {
                let result = remote.exists(key).await;
                Ok(settle_exists(result, &self.memory, key))
            }
            Backend::Memory => Ok(self.memory.contains(key)),
        }
    }

    /// Deletes every key matching a glob pattern, returning the count.
    pub async fn clear_pattern(&self, pattern: &str) -> Result<u64> {
        match self.backend().await? {
            Backend::Remote(remote) => {
                let result = remote.delete_pattern(pattern).await;
                Ok(settle_clear(result, &self.memory, pattern))
            }
            Backend::Memory => Ok(self.memory.remove_matching(pattern) as u64),
        }
    }

    pub async fn stats(&self) -> Result<CacheStats> {
        match self.backend().await? {
            Backend::Remote(remote) => Ok(settle_stats(remote.stats().await)),
            Backend::Memory => Ok(memory_stats(&self.memory)),
        }
    }

    pub async fn set_session(&self, session_id: &str, data: impl Into<CachedValue>) -> Result<()> {
        self.set(&session_key(session_id), data, CacheClass::Session)
            .await
    }

    pub async fn get_session(&self, session_id: &str) -> Result<Option<CachedValue>> {
        self.get(&session_key(session_id)).await
    }

    pub async fn delete_session(&self, session_id: &str) -> Result<bool> {
        self.delete(&session_key(session_id)).await
    }

    pub async fn set_user_info(&self, user_id: &str, info: impl Into<CachedValue>) -> Result<()> {
        self.set(&user_key(user_id), info, CacheClass::UserInfo)
            .await
    }

    pub async fn get_user_info(&self, user_id: &str) -> Result<Option<CachedValue>> {
        self.get(&user_key(user_id)).await
    }

    pub async fn delete_user_info(&self, user_id: &str) -> Result<bool> {
        self.delete(&user_key(user_id)).await
    }

    pub async fn set_project_data(
        &self,
        project_id: &str,
        data: impl Into<CachedValue>,
    ) -> Result<()> {
        self.set(&project_key(project_id), data, CacheClass::ProjectData)
            .await
    }

    pub async fn get_project_data(&self, project_id: &str) -> Result<Option<CachedValue>> {
        self.get(&project_key(project_id)).await
    }

    pub async fn delete_project_data(&self, project_id: &str) -> Result<bool> {
        self.delete(&project_key(project_id)).await
    }

    pub async fn set_parts_data(
        &self,
        project_id: &str,
        parts: impl Into<CachedValue>,
    ) -> Result<()> {
        self.set(&parts_key(project_id), parts, CacheClass::PartsData)
            .await
    }

    pub async fn get_parts_data(&self, project_id: &str) -> Result<Option<CachedValue>> {
        self.get(&parts_key(project_id)).await
    }

    pub async fn delete_parts_data(&self, project_id: &str) -> Result<bool> {
        self.delete(&parts_key(project_id)).await
    }

    /// Drops every session scoped to a user (`session:{user_id}:*`).
    pub async fn clear_user_sessions(&self, user_id: &str) -> Result<u64> {
        self.clear_pattern(&user_sessions_pattern(user_id)).await
    }

    /// Drops every entry derived from a project (`project:{project_id}:*`).
    pub async fn clear_project_data(&self, project_id: &str) -> Result<u64> {
        self.clear_pattern(&project_data_pattern(project_id)).await
    }

    /// Returns the cached value for `key`, or runs `load`, caches its result
    /// and returns it.
    ///
    /// Cache failures never fail the read: they are logged and `load` runs.
    pub async fn read_through<T, E, F, Fut>(
        &self,
        key: &str,
        expiry: impl Into<Expiry>,
        load: F,
    ) -> std::result::Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        match self.get(key).await {
            Ok(Some(cached)) => match cached.deserialize::<T>() {
                Ok(value) => return Ok(value),
                Err(e) => tracing::warn!(key, error = %e, "Ignoring undecodable cache entry"),
            },
            Ok(None) => {}
            Err(e) => tracing::warn!(key, error = %e, "Cache read failed, loading"),
        }

        let value = load().await?;

        match CachedValue::json(&value) {
            Ok(cached) => {
                if let Err(e) = self.set(key, cached, expiry).await {
                    tracing::warn!(key, error = %e, "Failed to cache loaded value");
                }
            }
            Err(e) => tracing::warn!(key, error = %e, "Failed to encode loaded value"),
        }

        Ok(value)
    }

    /// Drops expired entries from the in-process store.
    pub fn cleanup_expired_memory_cache(&self) -> usize {
        let purged = self.memory.purge_expired();
        if purged > 0 {
            tracing::debug!(purged, "Purged expired in-memory cache entries");
        }
        purged
    }

    /// Entries held by the in-process store, expired or not.
    pub fn memory_cache_size(&self) -> usize {
        self.memory.len()
    }

    /// Drops the remote connection and the in-process entries. The service
    /// can be initialized again afterwards.
    pub async fn close(&self) {
        let previous = self.backend.write().await.take();
        self.memory.clear();
        if previous.is_some() {
            tracing::info!("Cache service closed");
        }
    }
}
