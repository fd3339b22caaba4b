//! Lazily created, process-wide pools.
//!
//! A manager owns at most one pool. The first caller of `get_pool` creates
//! it under an initialization lock; concurrent callers wait on that lock and
//! then observe the pool the first caller stored.

use std::sync::Arc;

use futures_util::future::BoxFuture;
use parking_lot::RwLock;

use bomhub_core::pool::{PoolConfig, PoolError, PoolStatus, Result};

use super::{AsyncConnector, AsyncLease, AsyncPool, BlockingLease, BlockingPool, Connector};

/// Owns the async pool of an application context.
pub struct AsyncPoolManager<C: AsyncConnector + Clone> {
    connector: C,
    config: PoolConfig,
    pool: RwLock<Option<Arc<AsyncPool<C>>>>,
    init: tokio::sync::Mutex<()>,
}

impl<C: AsyncConnector + Clone> AsyncPoolManager<C> {
    pub fn new(connector: C, config: PoolConfig) -> Self {
        Self {
            connector,
            config,
            pool: RwLock::new(None),
            init: tokio::sync::Mutex::new(()),
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Returns the pool, creating it on first use.
    ///
    /// # Errors
    ///
    /// `PoolError::Create` if the pool cannot be constructed. The failure is
    /// not retried here; the next call tries again.
    pub async fn get_pool(&self) -> Result<Arc<AsyncPool<C>>> {
        if let Some(pool) = self.current() {
            return Ok(pool);
        }

        let _guard = self.init.lock().await;
        if let Some(pool) = self.current() {
            return Ok(pool);
        }

        let pool = AsyncPool::connect(self.connector.clone(), self.config.clone())
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Failed to create async connection pool"))?;
        *self.pool.write() = Some(Arc::clone(&pool));

        Ok(pool)
    }

    /// Returns the pool if it has been created.
    pub fn current(&self) -> Option<Arc<AsyncPool<C>>> {
        self.pool.read().clone()
    }

    pub async fn acquire(&self) -> Result<AsyncLease<C>> {
        self.get_pool().await?.acquire().await
    }

    /// See [`AsyncPool::with_connection`].
    pub async fn with_connection<T, E, F>(&self, body: F) -> std::result::Result<T, E>
    where
        F: for<'c> FnOnce(&'c mut C::Connection) -> BoxFuture<'c, std::result::Result<T, E>>,
        E: From<PoolError>,
    {
        self.get_pool().await?.with_connection(body).await
    }

    /// Closes and forgets the pool. Safe to call when no pool exists and
    /// more than once.
    pub async fn close_all(&self) {
        let _guard = self.init.lock().await;
        let pool = self.pool.write().take();
        if let Some(pool) = pool {
            pool.close();
        }
    }

    /// Occupancy report. Creates the pool if needed; never fails.
    pub async fn status(&self) -> PoolStatus {
        match self.get_pool().await {
            Ok(pool) => PoolStatus::created(
                self.config.min_size(),
                self.config.max_size(),
                &pool.stats(),
            ),
            Err(e) => PoolStatus::error(e.to_string()),
        }
    }

    /// Leases a connection and probes it.
    pub async fn perform_pool_health_check(&self) -> bool {
        match self.acquire().await {
            Ok(mut lease) => {
                let healthy = lease.probe().await;
                lease.release();
                healthy
            }
            Err(e) => {
                tracing::error!(error = %e, "Async pool health check failed");
                false
            }
        }
    }
}

/// Owns the blocking pool of an application context.
pub struct BlockingPoolManager<C: Connector + Clone> {
    connector: C,
    config: PoolConfig,
    pool: RwLock<Option<Arc<BlockingPool<C>>>>,
    init: parking_lot::Mutex<()>,
}

impl<C: Connector + Clone> BlockingPoolManager<C> {
    pub fn new(connector: C, config: PoolConfig) -> Self {
        Self {
            connector,
            config,
            pool: RwLock::new(None),
            init: parking_lot::Mutex::new(()),
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Returns the pool, creating it on first use. See
    /// [`AsyncPoolManager::get_pool`].
    pub fn get_pool(&self) -> Result<Arc<BlockingPool<C>>> {
        if let Some(pool) = self.current() {
            return Ok(pool);
        }

        let _guard = self.init.lock();
        if let Some(pool) = self.current() {
            return Ok(pool);
        }

        let pool = BlockingPool::connect(self.connector.clone(), self.config.clone())
            .inspect_err(|e| tracing::error!(error = %e, "Failed to create blocking connection pool"))?;
        *self.pool.write() = Some(Arc::clone(&pool));

        Ok(pool)
    }

    pub fn current(&self) -> Option<Arc<BlockingPool<C>>> {
        self.pool.read().clone()
    }

    pub fn acquire(&self) -> Result<BlockingLease<C>> {
        self.get_pool()?.acquire()
    }

    /// See [`BlockingPool::with_connection`].
    pub fn with_connection<T, E, F>(&self, body: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&mut C::Connection) -> std::result::Result<T, E>,
        E: From<PoolError>,
    {
        self.get_pool()?.with_connection(body)
    }

    pub fn close_all(&self) {
        let _guard = self.init.lock();
        let pool = self.pool.write().take();
        if let Some(pool) = pool {
            pool.close();
        }
    }

    pub fn status(&self) -> PoolStatus {
        match self.get_pool() {
            Ok(pool) => PoolStatus::created(
                self.config.min_size(),
                self.config.max_size(),
                &pool.stats(),
            ),
            Err(e) => PoolStatus::error(e.to_string()),
        }
    }

    pub fn perform_pool_health_check(&self) -> bool {
        match self.acquire() {
            Ok(mut lease) => {
                let healthy = lease.probe();
                lease.release();
                healthy
            }
            Err(e) => {
                tracing::error!(error = %e, "Blocking pool health check failed");
                false
            }
        }
    }
}
