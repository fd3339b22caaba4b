//! Scoped connection leases.
//!
//! A lease owns one pooled connection and hands it back when dropped, on
//! every exit path: normal return, early `?`, panic unwinding, or an async
//! task being cancelled. A lease dropped while still in use marks its
//! connection for rollback on the next checkout.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use tokio::sync::OwnedSemaphorePermit;

use bomhub_core::pool::LeaseState;

use super::probe::{is_healthy, is_healthy_blocking, ROLLBACK};
use super::{AsyncConnector, AsyncPool, BlockingPool, Connector};

/// What the pool should do with a connection coming back from a lease.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Disposition {
    Reuse,
    /// Roll back before the next checkout.
    Rollback,
    Discard,
}

fn disposition(state: LeaseState, broken: bool) -> Disposition {
    if broken {
        Disposition::Discard
    } else if state.needs_rollback_on_release() {
        Disposition::Rollback
    } else {
        Disposition::Reuse
    }
}

pub(crate) fn advance(state: &mut LeaseState, next: LeaseState) {
    debug_assert!(
        state.can_transition_to(next),
        "invalid lease transition {state:?} -> {next:?}"
    );
    tracing::trace!(from = ?state, to = ?next, "Lease transition");
    *state = next;
}

/// A connection leased from an [`AsyncPool`].
pub struct AsyncLease<C: AsyncConnector> {
    pool: Arc<AsyncPool<C>>,
    conn: Option<C::Connection>,
    state: LeaseState,
    /// The connection failed to roll back and must not be reused.
    broken: bool,
    // Dropped after `Drop::drop` has returned the connection.
    _permit: OwnedSemaphorePermit,
}

impl<C: AsyncConnector> AsyncLease<C> {
    /// Takes over a connection that passed its checks in `state`
    /// (`Healthy`).
    pub(crate) fn new(
        pool: Arc<AsyncPool<C>>,
        conn: C::Connection,
        mut state: LeaseState,
        permit: OwnedSemaphorePermit,
    ) -> Self {
        advance(&mut state, LeaseState::InUse);
        Self {
            pool,
            conn: Some(conn),
            state,
            broken: false,
            _permit: permit,
        }
    }

    pub fn state(&self) -> LeaseState {
        self.state
    }

    /// Runs the health probe on the leased connection.
    pub async fn probe(&mut self) -> bool {
        let timeout = self.pool.config().command_timeout();
        let pool = Arc::clone(&self.pool);
        is_healthy(pool.connector(), &mut **self, timeout).await
    }

    /// Rolls back any open transaction.
    ///
    /// A connection that cannot be rolled back is closed when the lease ends
    /// instead of returning to the pool.
    pub async fn rollback(&mut self) {
        if self.state != LeaseState::InUse {
            return;
        }

        let timeout = self.pool.config().command_timeout();
        let pool = Arc::clone(&self.pool);
        let result =
            tokio::time::timeout(timeout, pool.connector().batch_execute(&mut **self, ROLLBACK))
                .await;

        match result {
            Ok(Ok(())) => advance(&mut self.state, LeaseState::RolledBack),
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Rollback failed, discarding connection");
                self.broken = true;
            }
            Err(_) => {
                tracing::warn!(timeout = ?timeout, "Rollback timed out, discarding connection");
                self.broken = true;
            }
        }
    }

    /// Ends the lease after its work completed, returning the connection to
    /// the pool as-is.
    pub fn release(mut self) {
        if !self.broken && !self.state.is_terminal() {
            advance(&mut self.state, LeaseState::Released);
        }
    }
}

impl<C: AsyncConnector> fmt::Debug for AsyncLease<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncLease")
            .field("state", &self.state)
            .field("broken", &self.broken)
            .field("pool", &self.pool.stats())
            .finish()
    }
}

impl<C: AsyncConnector> Deref for AsyncLease<C> {
    type Target = C::Connection;

    fn deref(&self) -> &Self::Target {
        self.conn.as_ref().expect("connection taken")
    }
}

impl<C: AsyncConnector> DerefMut for AsyncLease<C> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.conn.as_mut().expect("connection taken")
    }
}

impl<C: AsyncConnector> Drop for AsyncLease<C> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            let disposition = disposition(self.state, self.broken);
            if disposition == Disposition::Rollback {
                tracing::warn!("Lease dropped while in use, connection will be rolled back");
            }
            self.pool.release(conn, disposition);
        }
    }
}

/// A connection leased from a [`BlockingPool`].
pub struct BlockingLease<C: Connector> {
    pool: Arc<BlockingPool<C>>,
    conn: Option<C::Connection>,
    state: LeaseState,
    broken: bool,
}

impl<C: Connector> BlockingLease<C> {
    pub(crate) fn new(
        pool: Arc<BlockingPool<C>>,
        conn: C::Connection,
        mut state: LeaseState,
    ) -> Self {
        advance(&mut state, LeaseState::InUse);
        Self {
            pool,
            conn: Some(conn),
            state,
            broken: false,
        }
    }

    pub fn state(&self) -> LeaseState {
        self.state
    }

    pub fn probe(&mut self) -> bool {
        let pool = Arc::clone(&self.pool);
        is_healthy_blocking(pool.connector(), &mut **self)
    }

    /// Rolls back any open transaction. See [`AsyncLease::rollback`].
    pub fn rollback(&mut self) {
        if self.state != LeaseState::InUse {
            return;
        }

        let pool = Arc::clone(&self.pool);
        match pool.connector().batch_execute(&mut **self, ROLLBACK) {
            Ok(()) => advance(&mut self.state, LeaseState::RolledBack),
            Err(e) => {
                tracing::warn!(error = %e, "Rollback failed, discarding connection");
                self.broken = true;
            }
        }
    }

    pub fn release(mut self) {
        if !self.broken && !self.state.is_terminal() {
            advance(&mut self.state, LeaseState::Released);
        }
    }
}

impl<C: Connector> fmt::Debug for BlockingLease<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockingLease")
            .field("state", &self.state)
            .field("broken", &self.broken)
            .field("pool", &self.pool.stats())
            .finish()
    }
}

impl<C: Connector> Deref for BlockingLease<C> {
    type Target = C::Connection;

    fn deref(&self) -> &Self::Target {
        self.conn.as_ref().expect("connection taken")
    }
}

impl<C: Connector> DerefMut for BlockingLease<C> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.conn.as_mut().expect("connection taken")
    }
}

impl<C: Connector> Drop for BlockingLease<C> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            let disposition = disposition(self.state, self.broken);
            if disposition == Disposition::Rollback {
                tracing::warn!("Lease dropped while in use, connection will be rolled back");
            }
            self.pool.release(conn, disposition);
        }
    }
}
