//! Pool configuration types

use std::time::Duration;

use super::{PoolError, Result, RetryPolicy};

/// Configuration for a connection pool.
///
/// Controls sizing, per-command and acquire timeouts, and the checkout retry
/// policy.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolConfig {
    /// Connections opened when the pool is created
    min_size: usize,
    /// Upper bound on live connections (idle + leased)
    max_size: usize,
    /// Per-query timeout enforced by the driver
    command_timeout: Duration,
    /// How long a checkout waits for a free slot
    acquire_timeout: Duration,
    retry: RetryPolicy,
}

impl PoolConfig {
    /// Creates a configuration with the given min and max sizes.
    ///
    /// Fails if `max_size` is 0 or `min_size > max_size`.
    pub fn new(min_size: usize, max_size: usize) -> Result<Self> {
        if max_size == 0 {
            return Err(PoolError::InvalidConfig(
                "max_size must be greater than 0".to_string(),
            ));
        }
        if min_size > max_size {
            return Err(PoolError::InvalidConfig(format!(
                "min_size ({min_size}) cannot exceed max_size ({max_size})"
            )));
        }

        Ok(Self {
            min_size,
            max_size,
            ..Self::default()
        })
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn min_size(&self) -> usize {
        self.min_size
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn command_timeout(&self) -> Duration {
        self.command_timeout
    }

    pub fn acquire_timeout(&self) -> Duration {
        self.acquire_timeout
    }

    pub fn retry(&self) -> &RetryPolicy {
        &self.retry
    }
}

impl Default for PoolConfig {
    /// Defaults:
    /// - min_size: 10
    /// - max_size: 100
    /// - command_timeout: 60 seconds
    /// - acquire_timeout: 30 seconds
    /// - retry: 3 attempts, 1 second apart
    fn default() -> Self {
        Self {
            min_size: 10,
            max_size: 100,
            command_timeout: Duration::from_secs(60),
            acquire_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }
}
