//! Blocking connection pool for thread-per-request callers.

use std::collections::VecDeque;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Condvar, Mutex};

use bomhub_core::pool::{LeaseState, PoolConfig, PoolError, PoolStats, Result};

use super::lease::{advance, BlockingLease, Disposition};
use super::pool::{Counters, Idle};
use super::probe::{is_healthy_blocking, ROLLBACK};
use super::Connector;

struct State<T> {
    idle: VecDeque<Idle<T>>,
    /// Live connections, idle and leased, plus slots reserved by in-flight
    /// connects.
    size: usize,
    closed: bool,
}

/// A pool of connections opened by a blocking [`Connector`].
///
/// Waiters block on a condition variable until a connection is released or
/// the acquire timeout elapses.
pub struct BlockingPool<C: Connector> {
    connector: C,
    config: PoolConfig,
    state: Mutex<State<C::Connection>>,
    available: Condvar,
    counters: Counters,
}

impl<C: Connector> BlockingPool<C> {
    /// Creates the pool and opens `min_size` connections.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::Create` if any initial connection cannot be opened.
    pub fn connect(connector: C, config: PoolConfig) -> Result<Arc<Self>> {
        let mut idle = VecDeque::with_capacity(config.min_size());
        for _ in 0..config.min_size() {
            let conn = connector.connect().map_err(PoolError::Create)?;
            idle.push_back(Idle::fresh(conn));
        }

        tracing::info!(
            min_size = config.min_size(),
            max_size = config.max_size(),
            "Blocking connection pool created"
        );

        Ok(Arc::new(Self {
            connector,
            state: Mutex::new(State {
                size: idle.len(),
                idle,
                closed: false,
            }),
            available: Condvar::new(),
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
        self.state.lock().closed
    }

    /// Leases a healthy connection. Same retry contract as
    /// [`AsyncPool::acquire`](super::AsyncPool::acquire), sleeping the
    /// calling thread between attempts.
    pub fn acquire(self: &Arc<Self>) -> Result<BlockingLease<C>> {
        let retry = self.config.retry();
        let mut state = LeaseState::Unacquired;
        let mut last_error = String::new();

        advance(&mut state, LeaseState::Acquiring);
        for attempt in 1..=retry.max_attempts() {
            self.replenish();

            match self.checkout() {
                Ok(mut idle) => {
                    if self.prepare(&mut idle) {
                        advance(&mut state, LeaseState::Healthy);
                        self.counters.acquired.fetch_add(1, Ordering::SeqCst);
                        return Ok(BlockingLease::new(Arc::clone(self), idle.conn, state));
                    }
                    self.discard(idle.conn);
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
                std::thread::sleep(delay);
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
    /// On `Err` the connection is rolled back and the error returned
    /// unchanged. A panic inside `body` still returns the connection, marked
    /// for rollback.
    pub fn with_connection<T, E, F>(self: &Arc<Self>, body: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&mut C::Connection) -> std::result::Result<T, E>,
        E: From<PoolError>,
    {
        let mut lease = self.acquire()?;

        match body(&mut *lease) {
            Ok(value) => {
                lease.release();
                Ok(value)
            }
            Err(e) => {
                lease.rollback();
                lease.release();
                Err(e)
            }
        }
    }

    /// Closes idle connections and wakes every waiter. Idempotent.
    pub fn close(&self) {
        let drained: Vec<_> = {
            let mut state = self.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            let drained: Vec<_> = state.idle.drain(..).collect();
            state.size -= drained.len();
            drained
        };

        self.available.notify_all();
        tracing::info!(closed = drained.len(), "Blocking connection pool closed");
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.state.lock();
        self.counters.snapshot(state.size, state.idle.len())
    }

    pub(crate) fn release(&self, conn: C::Connection, disposition: Disposition) {
        self.counters.released.fetch_add(1, Ordering::SeqCst);

        let mut state = self.state.lock();
        if state.closed || disposition == Disposition::Discard {
            state.size -= 1;
            drop(state);
            drop(conn);
            self.counters.discarded.fetch_add(1, Ordering::SeqCst);
        } else {
            state.idle.push_back(Idle {
                conn,
                needs_rollback: disposition == Disposition::Rollback,
            });
            drop(state);
        }

        self.available.notify_one();
    }

    fn discard(&self, conn: C::Connection) {
        drop(conn);
        self.state.lock().size -= 1;
        self.counters.discarded.fetch_add(1, Ordering::SeqCst);
        self.available.notify_one();
    }

    fn checkout(&self) -> Result<Idle<C::Connection>> {
        let timeout = self.config.acquire_timeout();
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();

        loop {
            if state.closed {
                return Err(PoolError::Closed);
            }
            if let Some(idle) = state.idle.pop_front() {
                return Ok(idle);
            }
            if state.size < self.config.max_size() {
                // Reserve the slot, then connect without holding the lock.
                state.size += 1;
                drop(state);

                return match self.connector.connect() {
                    Ok(conn) => {
                        tracing::debug!("Opened new pooled connection");
                        Ok(Idle::fresh(conn))
                    }
                    Err(e) => {
                        self.state.lock().size -= 1;
                        self.available.notify_one();
                        Err(PoolError::Connect(e))
                    }
                };
            }
            if self.available.wait_until(&mut state, deadline).timed_out() {
                return Err(PoolError::Timeout(timeout));
            }
        }
    }

    /// Opens connections until the pool is back at `min_size`. Stops at the
    /// first failure.
    fn replenish(&self) {
        loop {
            {
                let mut state = self.state.lock();
                if state.closed || state.size >= self.config.min_size() {
                    return;
                }
                state.size += 1;
            }

            match self.connector.connect() {
                Ok(conn) => {
                    let mut state = self.state.lock();
                    if state.closed {
                        state.size -= 1;
                        return;
                    }
                    state.idle.push_back(Idle::fresh(conn));
                    drop(state);
                    tracing::debug!(min_size = self.config.min_size(), "Replaced discarded connection");
                    self.available.notify_one();
                }
                Err(e) => {
                    self.state.lock().size -= 1;
                    self.available.notify_one();
                    tracing::warn!(error = %e, "Failed to replace discarded connection");
                    return;
                }
            }
        }
    }

    fn prepare(&self, idle: &mut Idle<C::Connection>) -> bool {
        if idle.needs_rollback {
            if let Err(e) = self.connector.batch_execute(&mut idle.conn, ROLLBACK) {
                tracing::warn!(error = %e, "Rollback of abandoned connection failed");
                return false;
            }
            idle.needs_rollback = false;
        }

        is_healthy_blocking(&self.connector, &mut idle.conn)
    }
}
