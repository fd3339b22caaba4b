//! Scripted doubles for unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use bomhub_core::cache::{BlockingCache, Cache, CacheError, RemoteStats, Result as CacheResult};
use bomhub_core::pool::{DriverError, PoolError};

use crate::db::probe::{PROBE_QUERY, ROLLBACK};
use crate::db::{AsyncConnector, Connector};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockConnection {
    pub id: usize,
}

#[derive(Debug, Default)]
struct Script {
    next_id: AtomicUsize,
    connects: AtomicUsize,
    failing_connects: AtomicUsize,
    probes: AtomicUsize,
    rollbacks: AtomicUsize,
    /// Probe outcomes in order; healthy once exhausted.
    probe_results: Mutex<VecDeque<bool>>,
    executed: Mutex<Vec<String>>,
}

impl Script {
    fn connect(&self) -> Result<MockConnection, DriverError> {
        self.connects.fetch_add(1, Ordering::SeqCst);

        let failing = self.failing_connects.load(Ordering::SeqCst);
        if failing > 0 {
            self.failing_connects.store(failing - 1, Ordering::SeqCst);
            return Err(DriverError::new("connection refused"));
        }

        Ok(MockConnection {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
        })
    }

    fn execute(&self, sql: &str) -> Result<(), DriverError> {
        self.executed.lock().push(sql.to_string());

        match sql {
            PROBE_QUERY => {
                self.probes.fetch_add(1, Ordering::SeqCst);
                if self.probe_results.lock().pop_front().unwrap_or(true) {
                    Ok(())
                } else {
                    Err(DriverError::new("server closed the connection unexpectedly"))
                }
            }
            ROLLBACK => {
                self.rollbacks.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

macro_rules! script_accessors {
    ($ty:ty) => {
        impl $ty {
            pub fn new() -> Self {
                Self::default()
            }

            /// Fails the next `n` connects.
            pub fn with_failing_connects(self, n: usize) -> Self {
                self.script.failing_connects.store(n, Ordering::SeqCst);
                self
            }

            /// Queues probe outcomes; probes succeed once the queue is empty.
            pub fn with_probe_results(self, results: impl IntoIterator<Item = bool>) -> Self {
                self.script.probe_results.lock().extend(results);
                self
            }

            pub fn with_connect_delay(mut self, delay: Duration) -> Self {
                self.connect_delay = delay;
                self
            }

            /// Connect attempts, including failed ones.
            pub fn connects(&self) -> usize {
                self.script.connects.load(Ordering::SeqCst)
            }

            pub fn probes(&self) -> usize {
                self.script.probes.load(Ordering::SeqCst)
            }

            pub fn rollbacks(&self) -> usize {
                self.script.rollbacks.load(Ordering::SeqCst)
            }

            pub fn executed(&self) -> Vec<String> {
                self.script.executed.lock().clone()
            }
        }
    };
}

/// Async connector with scripted connect and probe outcomes.
#[derive(Debug, Clone, Default)]
pub struct MockConnector {
    script: Arc<Script>,
    connect_delay: Duration,
    probe_delay: Duration,
}

script_accessors!(MockConnector);

impl MockConnector {
    pub fn with_probe_delay(mut self, delay: Duration) -> Self {
        self.probe_delay = delay;
        self
    }
}

#[async_trait]
impl AsyncConnector for MockConnector {
    type Connection = MockConnection;

    async fn connect(&self) -> Result<MockConnection, DriverError> {
        if !self.connect_delay.is_zero() {
            tokio::time::sleep(self.connect_delay).await;
        }
        self.script.connect()
    }

    async fn batch_execute(&self, _conn: &mut MockConnection, sql: &str) -> Result<(), DriverError> {
        if sql == PROBE_QUERY && !self.probe_delay.is_zero() {
            tokio::time::sleep(self.probe_delay).await;
        }
        self.script.execute(sql)
    }
}

/// Blocking connector with scripted connect and probe outcomes.
#[derive(Debug, Clone, Default)]
pub struct MockBlockingConnector {
    script: Arc<Script>,
    connect_delay: Duration,
}

script_accessors!(MockBlockingConnector);

impl Connector for MockBlockingConnector {
    type Connection = MockConnection;

    fn connect(&self) -> Result<MockConnection, DriverError> {
        if !self.connect_delay.is_zero() {
            std::thread::sleep(self.connect_delay);
        }
        self.script.connect()
    }

    fn batch_execute(&self, _conn: &mut MockConnection, sql: &str) -> Result<(), DriverError> {
        self.script.execute(sql)
    }
}

/// Error type for lease bodies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestError {
    Pool(PoolError),
    Body(String),
}

impl From<PoolError> for TestError {
    fn from(err: PoolError) -> Self {
        TestError::Pool(err)
    }
}

/// Remote cache whose every call fails with the configured error.
#[derive(Debug, Clone)]
pub struct FailingCache {
    error: CacheError,
    calls: Arc<AtomicUsize>,
}

impl FailingCache {
    /// A remote store that refuses connections.
    pub fn unreachable() -> Self {
        Self::with_error(CacheError::ConnectionFailed("Connection refused".to_string()))
    }

    pub fn with_error(error: CacheError) -> Self {
        Self {
            error,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn fail<T>(&self) -> CacheResult<T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(self.error.clone())
    }
}

#[async_trait]
impl Cache for FailingCache {
    async fn ping(&self) -> CacheResult<()> {
        self.fail()
    }

    async fn get(&self, _key: &str) -> CacheResult<Option<String>> {
        self.fail()
    }

    async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> CacheResult<()> {
        self.fail()
    }

    async fn delete(&self, _key: &str) -> CacheResult<bool> {
        self.fail()
    }

    async fn exists(&self, _key: &str) -> CacheResult<bool> {
        self.fail()
    }

    async fn delete_pattern(&self, _pattern: &str) -> CacheResult<u64> {
        self.fail()
    }

    async fn stats(&self) -> CacheResult<RemoteStats> {
        self.fail()
    }
}

impl BlockingCache for FailingCache {
    fn ping(&self) -> CacheResult<()> {
        self.fail()
    }

    fn get(&self, _key: &str) -> CacheResult<Option<String>> {
        self.fail()
    }

    fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> CacheResult<()> {
        self.fail()
    }

    fn delete(&self, _key: &str) -> CacheResult<bool> {
        self.fail()
    }

    fn exists(&self, _key: &str) -> CacheResult<bool> {
        self.fail()
    }

    fn delete_pattern(&self, _pattern: &str) -> CacheResult<u64> {
        self.fail()
    }

    fn stats(&self) -> CacheResult<RemoteStats> {
        self.fail()
    }
}

/// Connection info for a port nothing listens on.
pub fn unreachable_redis() -> redis::ConnectionInfo {
    redis::ConnectionInfo {
        addr: redis::ConnectionAddr::Tcp("127.0.0.1".to_string(), 1),
        redis: redis::RedisConnectionInfo::default(),
    }
}

/// In-memory stand-in for a remote store. Records TTLs without expiring
/// entries and can be switched offline to refuse every call.
#[derive(Debug, Clone, Default)]
pub struct RecordingCache {
    entries: Arc<Mutex<std::collections::BTreeMap<String, (String, Duration)>>>,
    offline: Arc<AtomicBool>,
}

impl RecordingCache {
    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).map(|(value, _)| value.clone())
    }

    pub fn ttl(&self, key: &str) -> Option<Duration> {
        self.entries.lock().get(key).map(|(_, ttl)| *ttl)
    }

    pub fn insert_raw(&self, key: &str, value: &str) {
        self.store(key, value, Duration::ZERO);
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn online(&self) -> CacheResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(CacheError::ConnectionFailed("Connection refused".to_string()));
        }
        Ok(())
    }

    fn store(&self, key: &str, value: &str, ttl: Duration) {
        self.entries
            .lock()
            .insert(key.to_string(), (value.to_string(), ttl));
    }

    fn remove_matching(&self, pattern: &str) -> u64 {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|key, _| !bomhub_core::cache::pattern_matches(pattern, key));
        (before - entries.len()) as u64
    }

    fn remote_stats(&self) -> RemoteStats {
        RemoteStats {
            connected_clients: 1,
            ..Default::default()
        }
    }
}

#[async_trait]
impl Cache for RecordingCache {
    async fn ping(&self) -> CacheResult<()> {
        self.online()
    }

    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        self.online()?;
        Ok(self.raw(key))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        self.online()?;
        self.store(key, value, ttl);
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        self.online()?;
        Ok(self.entries.lock().remove(key).is_some())
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        self.online()?;
        Ok(self.entries.lock().contains_key(key))
    }

    async fn delete_pattern(&self, pattern: &str) -> CacheResult<u64> {
        self.online()?;
        Ok(self.remove_matching(pattern))
    }

    async fn stats(&self) -> CacheResult<RemoteStats> {
        self.online()?;
        Ok(self.remote_stats())
    }
}

impl BlockingCache for RecordingCache {
    fn ping(&self) -> CacheResult<()> {
        self.online()
    }

    fn get(&self, key: &str) -> CacheResult<Option<String>> {
        self.online()?;
        Ok(self.raw(key))
    }

    fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        self.online()?;
        self.store(key, value, ttl);
        Ok(())
    }

    fn delete(&self, key: &str) -> CacheResult<bool> {
        self.online()?;
        Ok(self.entries.lock().remove(key).is_some())
    }

    fn exists(&self, key: &str) -> CacheResult<bool> {
        self.online()?;
        Ok(self.entries.lock().contains_key(key))
    }

    fn delete_pattern(&self, pattern: &str) -> CacheResult<u64> {
        self.online()?;
        Ok(self.remove_matching(pattern))
    }

    fn stats(&self) -> CacheResult<RemoteStats> {
        self.online()?;
        Ok(self.remote_stats())
    }
}
