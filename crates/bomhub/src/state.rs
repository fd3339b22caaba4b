//! Application context.
//!
//! Owns the pool managers and cache services of one running server. Nothing
//! here is global: every handler reaches the resources through [`AppState`].

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::cache::{BlockingCacheService, CacheService};
use crate::config::Config;
use crate::db::postgres::{PgAsyncConnector, PgConnector};
use crate::db::{AsyncConnector, AsyncPoolManager, BlockingPoolManager, Connector};
use crate::reporter::HealthReporter;

/// Resources shared by the whole process.
pub struct AppContext<A = PgAsyncConnector, B = PgConnector>
where
    A: AsyncConnector + Clone,
    B: Connector + Clone,
{
    pub db: Arc<AsyncPoolManager<A>>,
    pub db_blocking: Arc<BlockingPoolManager<B>>,
    pub cache: Arc<CacheService>,
    pub blocking_cache: Arc<BlockingCacheService>,
}

impl<A, B> Clone for AppContext<A, B>
where
    A: AsyncConnector + Clone,
    B: Connector + Clone,
{
    fn clone(&self) -> Self {
        Self {
            db: Arc::clone(&self.db),
            db_blocking: Arc::clone(&self.db_blocking),
            cache: Arc::clone(&self.cache),
            blocking_cache: Arc::clone(&self.blocking_cache),
        }
    }
}

impl AppContext {
    /// Builds the PostgreSQL and Redis backed context. Nothing connects yet.
    pub fn from_config(config: &Config) -> Result<Self> {
        let db = AsyncPoolManager::new(
            PgAsyncConnector::new(config.pg_config()),
            config
                .async_pool_config()
                .context("invalid async pool configuration")?,
        );
        let db_blocking = BlockingPoolManager::new(
            PgConnector::new(config.pg_blocking_config()),
            config
                .blocking_pool_config()
                .context("invalid blocking pool configuration")?,
        );

        Ok(Self::new(
            db,
            db_blocking,
            CacheService::new(config.cache_settings()),
            BlockingCacheService::new(config.cache_settings()),
        ))
    }
}

impl<A, B> AppContext<A, B>
where
    A: AsyncConnector + Clone,
    B: Connector + Clone,
{
    pub fn new(
        db: AsyncPoolManager<A>,
        db_blocking: BlockingPoolManager<B>,
        cache: CacheService,
        blocking_cache: BlockingCacheService,
    ) -> Self {
        Self {
            db: Arc::new(db),
            db_blocking: Arc::new(db_blocking),
            cache: Arc::new(cache),
            blocking_cache: Arc::new(blocking_cache),
        }
    }

    /// Creates both pools and selects the cache backends.
    ///
    /// # Errors
    ///
    /// Fails if a pool cannot be created or Redis rejects the credentials.
    /// An unreachable Redis is not an error.
    pub async fn start(&self) -> Result<()> {
        self.db
            .get_pool()
            .await
            .context("failed to create async connection pool")?;

        let db_blocking = Arc::clone(&self.db_blocking);
        tokio::task::spawn_blocking(move || db_blocking.get_pool())
            .await?
            .context("failed to create blocking connection pool")?;

        self.cache
            .initialize()
            .await
            .context("failed to initialize cache")?;

        let blocking_cache = Arc::clone(&self.blocking_cache);
        tokio::task::spawn_blocking(move || blocking_cache.initialize())
            .await?
            .context("failed to initialize blocking cache")?;

        Ok(())
    }

    /// Closes both pools and both caches. Safe to call more than once.
    pub async fn shutdown(&self) {
        self.db.close_all().await;
        self.cache.close().await;

        let db_blocking = Arc::clone(&self.db_blocking);
        let blocking_cache = Arc::clone(&self.blocking_cache);
        let closed = tokio::task::spawn_blocking(move || {
            db_blocking.close_all();
            blocking_cache.close();
        })
        .await;
        if let Err(e) = closed {
            tracing::error!(error = %e, "Failed to close blocking resources");
        }

        tracing::info!("Database pools and caches closed");
    }

    /// Purges expired entries from both fallback stores.
    pub fn sweep_expired(&self) -> usize {
        self.cache.cleanup_expired_memory_cache() + self.blocking_cache.cleanup_expired_memory_cache()
    }

    pub fn reporter(&self) -> HealthReporter {
        HealthReporter::new(
            Arc::clone(&self.db) as _,
            Arc::new(Arc::clone(&self.db_blocking)),
            Arc::clone(&self.cache),
        )
    }
}

/// State passed to request handlers.
#[derive(Clone)]
pub struct AppState {
    pub reporter: HealthReporter,
}

impl AppState {
    pub fn new(reporter: HealthReporter) -> Self {
        Self { reporter }
    }
}

impl<A, B> From<&AppContext<A, B>> for AppState
where
    A: AsyncConnector + Clone,
    B: Connector + Clone,
{
    fn from(context: &AppContext<A, B>) -> Self {
        Self::new(context.reporter())
    }
}
