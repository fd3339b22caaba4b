//! Blocking cache service, the thread-per-request counterpart of
//! [`CacheService`](super::CacheService).

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{de::DeserializeOwned, Serialize};

use bomhub_core::cache::{
    parts_key, project_data_pattern, project_key, session_key, user_key, user_sessions_pattern,
    BlockingCache, CacheClass, CacheError, CacheStats, CachedValue, Expiry, Result,
};

use super::fallback::{
    memory_stats, settle_clear, settle_delete, settle_exists, settle_get, settle_set,
    settle_stats,
};
use super::{BlockingRedisCache, CacheSettings, MemoryStore};

#[derive(Clone)]
enum Backend {
    Remote(Arc<dyn BlockingCache>),
    Memory,
}

/// Blocking cache with transparent fallback to an in-process store.
pub struct BlockingCacheService {
    settings: CacheSettings,
    backend: RwLock<Option<Backend>>,
    init: parking_lot::Mutex<()>,
    memory: MemoryStore,
}

impl BlockingCacheService {
    pub fn new(settings: CacheSettings) -> Self {
        Self {
            memory: MemoryStore::new(settings.max_entries),
            settings,
            backend: RwLock::new(None),
            init: parking_lot::Mutex::new(()),
        }
    }

    /// Connects to Redis, or selects memory mode. Same contract as
    /// [`CacheService::initialize`](super::CacheService::initialize).
    pub fn initialize(&self) -> Result<()> {
        self.initialize_with(|| {
            let Some(info) = self.settings.redis.clone() else {
                return Ok(None);
            };
            let cache = BlockingRedisCache::connect(info, self.settings.timeout)?;
            Ok(Some(Arc::new(cache) as Arc<dyn BlockingCache>))
        })
    }

    fn initialize_with(
        &self,
        connect: impl FnOnce() -> Result<Option<Arc<dyn BlockingCache>>>,
    ) -> Result<()> {
        let _guard = self.init.lock();
        if self.backend.read().is_some() {
            return Ok(());
        }

        let selected = match connect() {
            Ok(Some(remote)) => {
                tracing::info!("Redis cache connected (blocking)");
                Backend::Remote(remote)
            }
            Ok(None) => Backend::Memory,
            Err(CacheError::Authentication(e)) => {
                tracing::error!(error = %e, "Redis rejected credentials");
                return Err(CacheError::Authentication(e));
            }
            Err(e) => {
                tracing::warn!(error = %e, "Redis unavailable, using in-memory cache");
                Backend::Memory
            }
        };

        *self.backend.write() = Some(selected);
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.backend.read().is_some()
    }

    fn backend(&self) -> Result<Backend> {
        self.backend.read().clone().ok_or(CacheError::NotInitialized)
    }

    pub fn set(
        &self,
        key: &str,
        value: impl Into<CachedValue>,
        expiry: impl Into<Expiry>,
    ) -> Result<()> {
        let value = value.into();
        let ttl = expiry.into().ttl();

        match self.backend()? {
            Backend::Remote(remote) => {
                let result = remote.set(key, &value.encode()?, ttl);
                settle_set(result, &self.memory, key, value, ttl)
            }
            Backend::Memory => {
                self.memory.insert(key, value, ttl);
                Ok(())
            }
        }
    }

    pub fn get(&self, key: &str) -> Result<Option<CachedValue>> {
        match self.backend()? {
            Backend::Remote(remote) => Ok(settle_get(remote.get(key), &self.memory, key)),
            Backend::Memory => Ok(self.memory.get(key)),
        }
    }

    pub fn delete(&self, key: &str) -> Result<bool> {
        match self.backend()? {
            Backend::Remote(remote) => Ok(settle_delete(remote.delete(key), &self.memory, key)),
            Backend::Memory => Ok(self.memory.remove(key)),
        }
    }

    pub fn exists(&self, key: &str) -> Result<bool> {
        match self.backend()? {
            Backend::Remote(remote) => Ok(settle_exists(remote.exists(key), &self.memory, key)),
            Backend::Memory => Ok(self.memory.contains(key)),
        }
    }

    pub fn clear_pattern(&self, pattern: &str) -> Result<u64> {
        match self.backend()? {
            Backend::Remote(remote) => Ok(settle_clear(
                remote.delete_pattern(pattern),
                &self.memory,
                pattern,
            )),
            Backend::Memory => Ok(self.memory.remove_matching(pattern) as u64),
        }
    }

    pub fn stats(&self) -> Result<CacheStats> {
        match self.backend()? {
            Backend::Remote(remote) => Ok(settle_stats(remote.stats())),
            Backend::Memory => Ok(memory_stats(&self.memory)),
        }
    }

    pub fn set_session(&self, session_id: &str, data: impl Into<CachedValue>) -> Result<()> {
        self.set(&session_key(session_id), data, CacheClass::Session)
    }

    pub fn get_session(&self, session_id: &str) -> Result<Option<CachedValue>> {
        self.get(&session_key(session_id))
    }

    pub fn delete_session(&self, session_id: &str) -> Result<bool> {
        self.delete(&session_key(session_id))
    }

    pub fn set_user_info(&self, user_id: &str, info: impl Into<CachedValue>) -> Result<()> {
        self.set(&user_key(user_id), info, CacheClass::UserInfo)
    }

    pub fn get_user_info(&self, user_id: &str) -> Result<Option<CachedValue>> {
        self.get(&user_key(user_id))
    }

    pub fn delete_user_info(&self, user_id: &str) -> Result<bool> {
        self.delete(&user_key(user_id))
    }

    pub fn set_project_data(&self, project_id: &str, data: impl Into<CachedValue>) -> Result<()> {
        self.set(&project_key(project_id), data, CacheClass::ProjectData)
    }

    pub fn get_project_data(&self, project_id: &str) -> Result<Option<CachedValue>> {
        self.get(&project_key(project_id))
    }

    pub fn delete_project_data(&self, project_id: &str) -> Result<bool> {
        self.delete(&project_key(project_id))
    }

    pub fn set_parts_data(&self, project_id: &str, parts: impl Into<CachedValue>) -> Result<()> {
        self.set(&parts_key(project_id), parts, CacheClass::PartsData)
    }

    pub fn get_parts_data(&self, project_id: &str) -> Result<Option<CachedValue>> {
        self.get(&parts_key(project_id))
    }

    pub fn delete_parts_data(&self, project_id: &str) -> Result<bool> {
        self.delete(&parts_key(project_id))
    }

    /// Drops every session scoped to a user (`session:{user_id}:*`).
    pub fn clear_user_sessions(&self, user_id: &str) -> Result<u64> {
        self.clear_pattern(&user_sessions_pattern(user_id))
    }

    /// Drops every entry derived from a project (`project:{project_id}:*`).
    pub fn clear_project_data(&self, project_id: &str) -> Result<u64> {
        self.clear_pattern(&project_data_pattern(project_id))
    }

    /// Blocking [`CacheService::read_through`](super::CacheService::read_through).
    pub fn read_through<T, E, F>(
        &self,
        key: &str,
        expiry: impl Into<Expiry>,
        load: F,
    ) -> std::result::Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> std::result::Result<T, E>,
    {
        match self.get(key) {
            Ok(Some(cached)) => match cached.deserialize::<T>() {
                Ok(value) => return Ok(value),
                Err(e) => tracing::warn!(key, error = %e, "Ignoring undecodable cache entry"),
            },
            Ok(None) => {}
            Err(e) => tracing::warn!(key, error = %e, "Cache read failed, loading"),
        }

        let value = load()?;

        match CachedValue::json(&value) {
            Ok(cached) => {
                if let Err(e) = self.set(key, cached, expiry) {
                    tracing::warn!(key, error = %e, "Failed to cache loaded value");
                }
            }
            Err(e) => tracing::warn!(key, error = %e, "Failed to encode loaded value"),
        }

        Ok(value)
    }

    pub fn cleanup_expired_memory_cache(&self) -> usize {
        self.memory.purge_expired()
    }

    pub fn memory_cache_size(&self) -> usize {
        self.memory.len()
    }

    pub fn close(&self) {
        let _guard = self.init.lock();
        self.backend.write().take();
        self.memory.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::testing::{unreachable_redis, FailingCache, RecordingCache};

    fn settings(redis: Option<redis::ConnectionInfo>) -> CacheSettings {
        CacheSettings {
            redis,
            timeout: Duration::from_millis(500),
            max_entries: 100,
        }
    }

    #[test]
    fn test_requires_initialize() {
        let service = BlockingCacheService::new(settings(None));
        assert_eq!(service.get("k"), Err(CacheError::NotInitialized));
    }

    #[test]
    fn test_unreachable_redis_degrades_to_memory() {
        let service = BlockingCacheService::new(settings(Some(unreachable_redis())));
        service.initialize().unwrap();

        service.set("k", "v", CacheClass::Default).unwrap();
        assert_eq!(service.get("k").unwrap(), Some(CachedValue::from("v")));
    }

    #[test]
    fn test_remote_refused_falls_back_per_call() {
        let service = BlockingCacheService::new(settings(None));
        service
            .initialize_with(|| Ok(Some(Arc::new(FailingCache::unreachable()) as Arc<dyn BlockingCache>)))
            .unwrap();

        service.set("parts:A", "a", CacheClass::PartsData).unwrap();
        service.set("parts:B", "b", CacheClass::PartsData).unwrap();
        service.set("other:C", "c", CacheClass::Default).unwrap();

        assert_eq!(service.get("parts:A").unwrap(), Some(CachedValue::from("a")));
        assert_eq!(service.clear_pattern("parts:*").unwrap(), 2);
        assert!(service.exists("other:C").unwrap());
        assert!(service.delete("other:C").unwrap());
    }

    fn remote_service(remote: &RecordingCache) -> BlockingCacheService {
        let service = BlockingCacheService::new(settings(None));
        let remote = Arc::new(remote.clone());
        service
            .initialize_with(|| Ok(Some(remote as Arc<dyn BlockingCache>)))
            .unwrap();
        service
    }

    #[test]
    fn test_outage_after_recovery_does_not_serve_stale_value() {
        let remote = RecordingCache::default();
        let service = remote_service(&remote);

        remote.set_offline(true);
        service.set("k", "old", CacheClass::Default).unwrap();
        remote.set_offline(false);
        service.set("k", "new", CacheClass::Default).unwrap();
        assert_eq!(service.memory_cache_size(), 0);

        remote.set_offline(true);
        assert_eq!(service.get("k").unwrap(), None);
    }

    #[test]
    fn test_key_helpers() {
        let remote = RecordingCache::default();
        let service = remote_service(&remote);

        service.set_session("42:web", "token").unwrap();
        service.set_session("42:cli", "token").unwrap();
        service.set_session("7:web", "token").unwrap();
        assert_eq!(remote.ttl("session:42:web"), Some(CacheClass::Session.ttl()));
        assert_eq!(service.clear_user_sessions("42").unwrap(), 2);
        assert!(service.get_session("7:web").unwrap().is_some());
        assert!(service.delete_session("7:web").unwrap());

        service.set_user_info("42", json!({"name": "Ada"})).unwrap();
        assert_eq!(remote.ttl("user:42"), Some(CacheClass::UserInfo.ttl()));
        assert_eq!(
            service.get_user_info("42").unwrap(),
            Some(CachedValue::Json(json!({"name": "Ada"})))
        );
        assert!(service.delete_user_info("42").unwrap());
        assert!(!service.delete_user_info("42").unwrap());

        service.set_project_data("p1", "meta").unwrap();
        service
            .set("project:p1:bom", "rows", CacheClass::ProjectData)
            .unwrap();
        assert_eq!(service.clear_project_data("p1").unwrap(), 1);
        assert!(service.get_project_data("p1").unwrap().is_some());
        assert!(service.delete_project_data("p1").unwrap());

        service.set_parts_data("p1", json!([1, 2])).unwrap();
        assert_eq!(remote.ttl("parts:p1"), Some(CacheClass::PartsData.ttl()));
        assert!(service.get_parts_data("p1").unwrap().is_some());
        assert!(service.delete_parts_data("p1").unwrap());
    }

    #[test]
    fn test_read_through_loads_once() {
        let remote = RecordingCache::default();
        let service = remote_service(&remote);
        let mut loads = 0;

        for _ in 0..3 {
            let parts: std::result::Result<Vec<u32>, String> =
                service.read_through("parts:p1", CacheClass::PartsData, || {
                    loads += 1;
                    Ok(vec![1, 2])
                });
            assert_eq!(parts.unwrap(), vec![1, 2]);
        }

        assert_eq!(loads, 1);
        assert!(remote.raw("parts:p1").is_some());
    }

    #[test]
    fn test_read_through_survives_cache_failures() {
        let service = BlockingCacheService::new(settings(None));

        // Uninitialized: every cache call fails, the loader still answers.
        let value: std::result::Result<u32, String> =
            service.read_through("k", CacheClass::Default, || Ok(5));
        assert_eq!(value, Ok(5));

        let err: std::result::Result<u32, String> =
            service.read_through("k", CacheClass::Default, || Err("db down".to_string()));
        assert_eq!(err, Err("db down".to_string()));
    }

    #[test]
    fn test_authentication_failure_is_returned() {
        let service = BlockingCacheService::new(settings(None));
        let result =
            service.initialize_with(|| Err(CacheError::Authentication("NOAUTH".into())));

        assert!(matches!(result, Err(CacheError::Authentication(_))));
        assert!(!service.is_initialized());
    }

    #[test]
    fn test_close_and_reinitialize() {
        let service = BlockingCacheService::new(settings(None));
        service.initialize().unwrap();
        service.set("k", "v", CacheClass::Default).unwrap();
        assert_eq!(service.memory_cache_size(), 1);

        service.close();
        assert!(!service.is_initialized());
        assert_eq!(service.memory_cache_size(), 0);

        service.initialize().unwrap();
        assert_eq!(
            service.stats().unwrap(),
            CacheStats::Memory { total_keys: 0 }
        );
    }
}
