//! Aggregates pool occupancy, synthetic probes and cache statistics into
//! monitoring payloads.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use bomhub_core::cache::CacheStats;
use bomhub_core::pool::{unix_timestamp, PoolStatus};

use crate::cache::CacheService;
use crate::db::{AsyncConnector, AsyncPoolManager, BlockingPoolManager, Connector};

/// A pool that can describe itself and be probed.
#[async_trait]
pub trait PoolHealth: Send + Sync {
    async fn status(&self) -> PoolStatus;

    /// Leases a connection and runs the probe query. Never fails.
    async fn health_check(&self) -> bool;

    /// Leases a healthy connection and returns it, surfacing the
    /// acquisition error.
    async fn ready(&self) -> anyhow::Result<()>;
}

#[async_trait]
impl<C: AsyncConnector + Clone> PoolHealth for AsyncPoolManager<C> {
    async fn status(&self) -> PoolStatus {
        AsyncPoolManager::status(self).await
    }

    async fn health_check(&self) -> bool {
        self.perform_pool_health_check().await
    }

    async fn ready(&self) -> anyhow::Result<()> {
        self.acquire().await?.release();
        Ok(())
    }
}

/// Blocking pools are queried on the blocking thread pool.
#[async_trait]
impl<C: Connector + Clone> PoolHealth for Arc<BlockingPoolManager<C>> {
    async fn status(&self) -> PoolStatus {
        let manager = Arc::clone(self);
        tokio::task::spawn_blocking(move || BlockingPoolManager::status(&manager))
            .await
            .unwrap_or_else(|e| PoolStatus::error(e.to_string()))
    }

    async fn health_check(&self) -> bool {
        let manager = Arc::clone(self);
        let check = tokio::task::spawn_blocking(move || {
            BlockingPoolManager::perform_pool_health_check(&manager)
        });
        match check.await {
            Ok(healthy) => healthy,
            Err(e) => {
                tracing::error!(error = %e, "Blocking pool health check panicked");
                false
            }
        }
    }

    async fn ready(&self) -> anyhow::Result<()> {
        let manager = Arc::clone(self);
        tokio::task::spawn_blocking(move || manager.acquire().map(|lease| lease.release()))
            .await??;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Healthy,
    Unhealthy,
}

impl HealthState {
    fn from_bool(healthy: bool) -> Self {
        if healthy {
            HealthState::Healthy
        } else {
            HealthState::Unhealthy
        }
    }
}

/// Status and probe outcome of one pool.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoolHealthReport {
    pub status: HealthState,
    pub pool_info: PoolStatus,
    pub health_check: bool,
}

impl PoolHealthReport {
    pub fn is_healthy(&self) -> bool {
        self.health_check
    }
}

/// Combined report for both pools. Healthy only if both probes pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DbPoolsReport {
    pub status: HealthState,
    pub sync_pool: PoolHealthReport,
    pub async_pool: PoolHealthReport,
    pub timestamp: f64,
}

impl DbPoolsReport {
    pub fn is_healthy(&self) -> bool {
        self.status == HealthState::Healthy
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheHealthReport {
    pub status: HealthState,
    /// "redis", "memory" or "uninitialized".
    pub backend: &'static str,
    pub stats: CacheStats,
    pub timestamp: f64,
}

impl CacheHealthReport {
    pub fn is_healthy(&self) -> bool {
        self.status == HealthState::Healthy
    }
}

#[derive(Clone)]
pub struct HealthReporter {
    async_pool: Arc<dyn PoolHealth>,
    sync_pool: Arc<dyn PoolHealth>,
    cache: Arc<CacheService>,
}

impl HealthReporter {
    pub fn new(
        async_pool: Arc<dyn PoolHealth>,
        sync_pool: Arc<dyn PoolHealth>,
        cache: Arc<CacheService>,
    ) -> Self {
        Self {
            async_pool,
            sync_pool,
            cache,
        }
    }

    async fn report(pool: &dyn PoolHealth) -> PoolHealthReport {
        let pool_info = pool.status().await;
        let health_check = pool.health_check().await;

        PoolHealthReport {
            status: HealthState::from_bool(health_check),
            pool_info,
            health_check,
        }
    }

    pub async fn async_pool(&self) -> PoolHealthReport {
        Self::report(self.async_pool.as_ref()).await
    }

    pub async fn sync_pool(&self) -> PoolHealthReport {
        Self::report(self.sync_pool.as_ref()).await
    }

    pub async fn db_pools(&self) -> DbPoolsReport {
        let (sync_pool, async_pool) = tokio::join!(self.sync_pool(), self.async_pool());
        let healthy = sync_pool.is_healthy() && async_pool.is_healthy();
        if !healthy {
            tracing::warn!(
                sync_pool = sync_pool.health_check,
                async_pool = async_pool.health_check,
                "Database pool health check failed"
            );
        }

        DbPoolsReport {
            status: HealthState::from_bool(healthy),
            sync_pool,
            async_pool,
            timestamp: unix_timestamp(),
        }
    }

    /// Succeeds when both pools hand out a healthy connection.
    pub async fn ready(&self) -> anyhow::Result<()> {
        self.async_pool.ready().await?;
        self.sync_pool.ready().await
    }

    /// Cache statistics. A cache running on the in-process store is healthy;
    /// an uninitialized cache is not.
    pub async fn cache(&self) -> CacheHealthReport {
        let backend = if !self.cache.is_initialized().await {
            "uninitialized"
        } else if self.cache.is_remote().await {
            "redis"
        } else {
            "memory"
        };

        let stats = match self.cache.stats().await {
            Ok(stats) => stats,
            Err(e) => CacheStats::Unavailable {
                error: e.to_string(),
            },
        };
        let healthy = !matches!(stats, CacheStats::Unavailable { .. });

        CacheHealthReport {
            status: HealthState::from_bool(healthy),
            backend,
            stats,
            timestamp: unix_timestamp(),
        }
    }
}
