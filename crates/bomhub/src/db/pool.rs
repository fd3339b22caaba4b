//! Async connection pool.
//!
//! Idle connections sit in a `parking_lot` free-list that is only locked for
//! a push or a pop. A semaphore with `max_size` permits bounds the number of
//! outstanding leases; a lease holds its permit until its connection is back
//! in the free-list, so `idle + leased` never exceeds `max_size`.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use bomhub_core::pool::{DriverError, LeaseState, PoolConfig, PoolError, PoolStats, Result};

use super::lease::{advance, AsyncLease, Disposition};
use super::probe::{is_healthy, ROLLBACK};
use super::AsyncConnector;

/// A connection waiting in a free-list.
pub(crate) struct Idle<T> {
    pub(crate) conn: T,
    /// Set when the connection was released by a lease that did not finish
    /// its work; it may hold an open transaction.
    pub(crate) needs_rollback: bool,
}

impl<T> Idle<T> {
    pub(crate) fn fresh(conn: T) -> Self {
        Self {
            conn,
            needs_rollback: false,
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub(crate) acquired: AtomicU64,
    pub(crate) released: AtomicU64,
    pub(crate) discarded: AtomicU64,
}

impl Counters {
    pub(crate) fn snapshot(&self, size: usize, idle: usize) -> PoolStats {
        PoolStats {
            size,
            idle,
            leased: size.saturating_sub(idle),
            acquired: self.acquired.load(Ordering::SeqCst),
            released: self.released.load(Ordering::SeqCst),
            discarded: self.discarded.load(Ordering::SeqCst),
        }
    }
}

/// A pool of connections opened by an [`AsyncConnector`].
pub struct AsyncPool<C: AsyncConnector> {
    connector: C,
    config: PoolConfig,
    idle: Mutex<VecDeque<Idle<C::Connection>>>,
    semaphore: Arc<Semaphore>,
    /// Live connections, idle and leased.
    size: AtomicUsize,
    closed: AtomicBool,
    counters: Counters,
}

impl<C: AsyncConnector> AsyncPool<C> {
    /// Creates the pool and opens `min_size` connections.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::Create` if any of the initial connections cannot be
    /// opened. Connections opened before the failure are closed.
    pub async fn connect(connector: C, config: PoolConfig) -> Result<Arc<Self>> {
        let mut idle = VecDeque::with_capacity(config.min_size());

        for _ in 0..config.min_size() {
            let conn = tokio::time::timeout(config.acquire_timeout(), connector.connect())
                .await
                .map_err(|_| {
                    PoolError::Create(DriverError::new(format!(
                        "timed out after {:?} opening connection",
                        config.acquire_timeout()
                    )))
                })?
                .map_err(PoolError::Create)?;
            idle.push_back(Idle::fresh(conn));
        }

        tracing::info!(
            min_size = config.min_size(),
            max_size = config.max_size(),
            "Async connection pool created"
        );

        Ok(Arc::new(Self {
            connector,
            semaphore: Arc::new(Semaphore::new(config.max_size())),
            size: AtomicUsize::new(idle.len()),
            idle: Mutex::new(idle),
            closed: AtomicBool::new(false),
            counters: Counters::default(),
            config,
        }))
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub(crate) fn connector(&self) -> &C {
        &self.connector
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Leases a healthy connection.
    ///
    /// Makes up to `retry.max_attempts()` attempts. Each attempt checks out a
    /// connection (idle or newly opened), rolls it back if a previous lease
    /// abandoned it, and probes it. Unhealthy connections are discarded.
    /// Attempts are separated by the retry delay.
    ///
    /// # Errors
    ///
    /// - `PoolError::Closed` if the pool is closed
    /// - `PoolError::Exhausted` once every attempt has failed
    pub async fn acquire(self: &Arc<Self>) -> Result<AsyncLease<C>> {
        let retry = self.config.retry();
        let mut state = LeaseState::Unacquired;
        let mut last_error = String::new();

        advance(&mut state, LeaseState::Acquiring);
        for attempt in 1..=retry.max_attempts() {
            self.replenish().await;

            match self.checkout().await {
                Ok((idle, permit)) => {
                    let mut checkout = Checkout::new(self, idle);
                    if self.prepare(&mut checkout).await {
                        if let Some(conn) = checkout.take() {
                            advance(&mut state, LeaseState::Healthy);
                            self.counters.acquired.fetch_add(1, Ordering::SeqCst);
                            return Ok(AsyncLease::new(Arc::clone(self), conn, state, permit));
                        }
                    }
                    last_error = "connection failed health check".to_string();
                }
                Err(PoolError::Closed) => return Err(PoolError::Closed),
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "Connection checkout failed");
                    last_error = e.to_string();
                }
            }

            if retry.should_retry(attempt) {
                advance(&mut state, LeaseState::Retry);
                let delay = retry.next_delay();
                tracing::warn!(
                    attempt,
                    max_attempts = retry.max_attempts(),
                    delay = ?delay,
                    "Retrying connection acquisition"
                );
                tokio::time::sleep(delay).await;
                advance(&mut state, LeaseState::Acquiring);
            }
        }

        advance(&mut state, LeaseState::Failed);
        tracing::error!(
            attempts = retry.max_attempts(),
            last_error = %last_error,
            "Failed to acquire a healthy connection"
        );

        Err(PoolError::Exhausted {
            attempts: retry.max_attempts(),
            last_error,
        })
    }

    /// Leases a connection for the duration of `body`.
    ///
    /// On `Ok` the connection goes back to the pool. On `Err` the
    /// connection is rolled back first and the error is returned unchanged.
    /// If the returned future is dropped before `body` completes, the
    /// connection is still returned and is rolled back on its next checkout.
    pub async fn with_connection<T, E, F>(self: &Arc<Self>, body: F) -> std::result::Result<T, E>
    where
        F: for<'c> FnOnce(&'c mut C::Connection) -> BoxFuture<'c, std::result::Result<T, E>>,
        E: From<PoolError>,
    {
        let mut lease = self.acquire().await?;

        match body(&mut *lease).await {
            Ok(value) => {
                lease.release();
                Ok(value)
            }
            Err(e) => {
                lease.rollback().await;
                lease.release();
                Err(e)
            }
        }
    }

    /// Closes every idle connection and rejects further checkouts.
    ///
    /// Leased connections are closed when their lease ends. Calling this more
    /// than once is a no-op.
    pub fn close(&self) {
        let drained: Vec<_> = {
            let mut idle = self.idle.lock();
            if self.closed.swap(true, Ordering::SeqCst) {
                return;
            }
            idle.drain(..).collect()
        };

        self.semaphore.close();
        self.size.fetch_sub(drained.len(), Ordering::SeqCst);
        tracing::info!(closed = drained.len(), "Async connection pool closed");
    }

    pub fn stats(&self) -> PoolStats {
        let idle = self.idle.lock().len();
        self.counters
            .snapshot(self.size.load(Ordering::SeqCst), idle)
    }

    /// Returns a leased connection. Never blocks; validation happens on the
    /// next checkout.
    pub(crate) fn release(&self, conn: C::Connection, disposition: Disposition) {
        self.counters.released.fetch_add(1, Ordering::SeqCst);

        let mut idle = self.idle.lock();
        if self.closed.load(Ordering::SeqCst) || disposition == Disposition::Discard {
            drop(idle);
            self.discard(conn);
            return;
        }
        idle.push_back(Idle {
            conn,
            needs_rollback: disposition == Disposition::Rollback,
        });
    }

    fn discard(&self, conn: C::Connection) {
        drop(conn);
        self.size.fetch_sub(1, Ordering::SeqCst);
        self.counters.discarded.fetch_add(1, Ordering::SeqCst);
    }

    async fn checkout(&self) -> Result<(Idle<C::Connection>, OwnedSemaphorePermit)> {
        if self.is_closed() {
            return Err(PoolError::Closed);
        }

        let timeout = self.config.acquire_timeout();
        let permit = tokio::time::timeout(timeout, Arc::clone(&self.semaphore).acquire_owned())
            .await
            .map_err(|_| PoolError::Timeout(timeout))?
            .map_err(|_| PoolError::Closed)?;

        let idle = self.idle.lock().pop_front();
        if let Some(idle) = idle {
            return Ok((idle, permit));
        }

        let conn = tokio::time::timeout(timeout, self.connector.connect())
            .await
            .map_err(|_| PoolError::Timeout(timeout))?
            .map_err(PoolError::Connect)?;
        self.size.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(size = self.size.load(Ordering::SeqCst), "Opened new pooled connection");

        Ok((Idle::fresh(conn), permit))
    }

    /// Opens connections until the pool is back at `min_size`.
    ///
    /// Best effort: stops at the first failure, or when every permit is in
    /// use. A connection opened while another task refilled the pool is
    /// closed instead of pushing `size` past `min_size`.
    async fn replenish(&self) {
        let min = self.config.min_size();

        while self.size.load(Ordering::SeqCst) < min && !self.is_closed() {
            let Ok(_permit) = Arc::clone(&self.semaphore).try_acquire_owned() else {
                return;
            };

            let timeout = self.config.acquire_timeout();
            let conn = match tokio::time::timeout(timeout, self.connector.connect()).await {
                Ok(Ok(conn)) => conn,
                Ok(Err(e)) => {
                    tracing::warn!(error = %e, "Failed to replace discarded connection");
                    return;
                }
                Err(_) => {
                    tracing::warn!(timeout = ?timeout, "Replacing discarded connection timed out");
                    return;
                }
            };

            let mut idle = self.idle.lock();
            if self.is_closed() {
                return;
            }
            let reserved = self
                .size
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |size| {
                    (size < min).then_some(size + 1)
                });
            if reserved.is_err() {
                return;
            }
            idle.push_back(Idle::fresh(conn));
            tracing::debug!(min_size = min, "Replaced discarded connection");
        }
    }

    /// Rolls back an abandoned connection and probes it.
    async fn prepare(&self, checkout: &mut Checkout<'_, C>) -> bool {
        let Some(idle) = checkout.idle.as_mut() else {
            return false;
        };
        let timeout = self.config.command_timeout();

        if idle.needs_rollback {
            match tokio::time::timeout(timeout, self.connector.batch_execute(&mut idle.conn, ROLLBACK))
                .await
            {
                Ok(Ok(())) => idle.needs_rollback = false,
                Ok(Err(e)) => {
                    tracing::warn!(error = %e, "Rollback of abandoned connection failed");
                    return false;
                }
                Err(_) => {
                    tracing::warn!("Rollback of abandoned connection timed out");
                    return false;
                }
            }
        }

        is_healthy(&self.connector, &mut idle.conn, timeout).await
    }
}

/// A connection taken out of the pool that no lease owns yet.
///
/// Dropping it closes the connection and frees its slot. That covers a
/// failed probe as well as the caller being cancelled mid-probe.
struct Checkout<'a, C: AsyncConnector> {
    pool: &'a AsyncPool<C>,
    idle: Option<Idle<C::Connection>>,
}

impl<'a, C: AsyncConnector> Checkout<'a, C> {
    fn new(pool: &'a AsyncPool<C>, idle: Idle<C::Connection>) -> Self {
        Self {
            pool,
            idle: Some(idle),
        }
    }

    /// Hands the connection over to a lease.
    fn take(&mut self) -> Option<C::Connection> {
        self.idle.take().map(|idle| idle.conn)
    }
}

impl<C: AsyncConnector> Drop for Checkout<'_, C> {
    fn drop(&mut self) {
        if let Some(idle) = self.idle.take() {
            self.pool.discard(idle.conn);
        }
    }
}
