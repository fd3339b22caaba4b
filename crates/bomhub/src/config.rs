use std::{env, str::FromStr, time::Duration};

use bomhub_core::pool::{PoolConfig, PoolError, RetryPolicy};
use redis::{ConnectionAddr, ConnectionInfo, RedisConnectionInfo};

use crate::cache::CacheSettings;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// PostgreSQL host (default: "localhost")
    pub db_host: String,
    /// PostgreSQL port (default: 5432)
    pub db_port: u16,
    /// Database name (default: "bom_db")
    pub db_name: String,
    /// Database user (default: "postgres")
    pub db_user: String,
    /// Database password (default: empty)
    pub db_password: String,
    /// Async pool size bounds (default: 10..=100)
    pub db_pool_min: usize,
    pub db_pool_max: usize,
    /// Blocking pool size bounds (default: 1..=20)
    pub db_blocking_pool_min: usize,
    pub db_blocking_pool_max: usize,
    /// Per-statement timeout in seconds (default: 60)
    pub db_command_timeout_secs: u64,
    /// How long a checkout waits for a free connection (default: 30)
    pub db_acquire_timeout_secs: u64,
    /// Acquisition attempts before giving up (default: 3)
    pub db_acquire_attempts: u32,
    /// Fixed delay between attempts in milliseconds (default: 1000)
    pub db_retry_delay_ms: u64,
    /// Relative jitter applied to the retry delay, 0.0 to 1.0 (default: 0.25)
    pub db_retry_jitter: f64,
    /// Redis host (default: "localhost")
    pub redis_host: String,
    /// Redis port (default: 6379)
    pub redis_port: u16,
    /// Redis database index (default: 0)
    pub redis_db: u32,
    /// Redis password (default: none)
    pub redis_password: Option<String>,
    /// Redis connect and response timeout in seconds (default: 5)
    pub redis_timeout_secs: u64,
    /// Maximum entries in the in-process fallback cache (default: 10,000)
    pub cache_max_entries: usize,
    /// Interval of the expired-entry sweep in seconds (default: 60)
    pub cache_sweep_interval_secs: u64,
}

fn parsed<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn string(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `DB_HOST`, `DB_PORT`, `DB_NAME`, `DB_USER`, `DB_PASSWORD`
    /// - `DB_POOL_MIN`, `DB_POOL_MAX` - Async pool bounds (default: 10, 100)
    /// - `DB_BLOCKING_POOL_MIN`, `DB_BLOCKING_POOL_MAX` - Blocking pool bounds (default: 1, 20)
    /// - `DB_COMMAND_TIMEOUT_SECS` - Statement timeout (default: 60)
    /// - `DB_ACQUIRE_TIMEOUT_SECS` - Checkout timeout (default: 30)
    /// - `DB_ACQUIRE_ATTEMPTS` - Attempts per acquisition (default: 3)
    /// - `DB_RETRY_DELAY_MS` - Delay between attempts (default: 1000)
    /// - `DB_RETRY_JITTER` - Retry delay jitter ratio (default: 0.25)
    /// - `REDIS_HOST`, `REDIS_PORT`, `REDIS_DB`, `REDIS_PASSWORD`
    /// - `REDIS_TIMEOUT_SECS` - Redis timeout (default: 5)
    /// - `CACHE_MAX_ENTRIES` - Fallback cache capacity (default: 10,000)
    /// - `CACHE_SWEEP_INTERVAL_SECS` - Expired-entry sweep interval (default: 60)
    pub fn from_env() -> Self {
        Self {
            db_host: string("DB_HOST", "localhost"),
            db_port: parsed("DB_PORT", 5432),
            db_name: string("DB_NAME", "bom_db"),
            db_user: string("DB_USER", "postgres"),
            db_password: string("DB_PASSWORD", ""),
            db_pool_min: parsed("DB_POOL_MIN", 10),
            db_pool_max: parsed("DB_POOL_MAX", 100),
            db_blocking_pool_min: parsed("DB_BLOCKING_POOL_MIN", 1),
            db_blocking_pool_max: parsed("DB_BLOCKING_POOL_MAX", 20),
            db_command_timeout_secs: parsed("DB_COMMAND_TIMEOUT_SECS", 60),
            db_acquire_timeout_secs: parsed("DB_ACQUIRE_TIMEOUT_SECS", 30),
            db_acquire_attempts: parsed("DB_ACQUIRE_ATTEMPTS", 3),
            db_retry_delay_ms: parsed("DB_RETRY_DELAY_MS", 1000),
            db_retry_jitter: parsed("DB_RETRY_JITTER", 0.25),
            redis_host: string("REDIS_HOST", "localhost"),
            redis_port: parsed("REDIS_PORT", 6379),
            redis_db: parsed("REDIS_DB", 0),
            redis_password: env::var("REDIS_PASSWORD").ok().filter(|p| !p.is_empty()),
            redis_timeout_secs: parsed("REDIS_TIMEOUT_SECS", 5),
            cache_max_entries: parsed("CACHE_MAX_ENTRIES", 10_000),
            cache_sweep_interval_secs: parsed("CACHE_SWEEP_INTERVAL_SECS", 60),
        }
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.db_command_timeout_secs)
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.db_acquire_attempts,
            Duration::from_millis(self.db_retry_delay_ms),
        )
        .with_jitter(self.db_retry_jitter)
    }

    fn pool_config(&self, min: usize, max: usize) -> Result<PoolConfig, PoolError> {
        Ok(PoolConfig::new(min, max)?
            .with_command_timeout(self.command_timeout())
            .with_acquire_timeout(Duration::from_secs(self.db_acquire_timeout_secs))
            .with_retry(self.retry_policy()))
    }

    /// Configuration of the async pool.
    pub fn async_pool_config(&self) -> Result<PoolConfig, PoolError> {
        self.pool_config(self.db_pool_min, self.db_pool_max)
    }

    /// Configuration of the blocking pool.
    pub fn blocking_pool_config(&self) -> Result<PoolConfig, PoolError> {
        self.pool_config(self.db_blocking_pool_min, self.db_blocking_pool_max)
    }

    fn statement_timeout_option(&self) -> String {
        format!("-c statement_timeout={}", self.command_timeout().as_millis())
    }

    /// Connection settings for the async driver.
    pub fn pg_config(&self) -> tokio_postgres::Config {
        let mut config = tokio_postgres::Config::new();
        config
            .host(&self.db_host)
            .port(self.db_port)
            .dbname(&self.db_name)
            .user(&self.db_user)
            .password(&self.db_password)
            .application_name("bomhub")
            .connect_timeout(Duration::from_secs(self.db_acquire_timeout_secs))
            .options(&self.statement_timeout_option());
        config
    }

    /// Connection settings for the blocking driver.
    pub fn pg_blocking_config(&self) -> postgres::Config {
        let mut config = postgres::Config::new();
        config
            .host(&self.db_host)
            .port(self.db_port)
            .dbname(&self.db_name)
            .user(&self.db_user)
            .password(&self.db_password)
            .application_name("bomhub")
            .connect_timeout(Duration::from_secs(self.db_acquire_timeout_secs))
            .options(&self.statement_timeout_option());
        config
    }

    /// Redis connection settings. Credentials are passed as-is, never
    /// through a URL.
    pub fn redis_connection_info(&self) -> ConnectionInfo {
        ConnectionInfo {
            addr: ConnectionAddr::Tcp(self.redis_host.clone(), self.redis_port),
            redis: RedisConnectionInfo {
                db: i64::from(self.redis_db),
                password: self.redis_password.clone(),
                ..Default::default()
            },
        }
    }

    pub fn cache_settings(&self) -> CacheSettings {
        CacheSettings {
            redis: Some(self.redis_connection_info()),
            timeout: Duration::from_secs(self.redis_timeout_secs),
            max_entries: self.cache_max_entries,
        }
    }

    pub fn cache_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.cache_sweep_interval_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VARS: &[&str] = &[
        "DB_HOST",
        "DB_PORT",
        "DB_NAME",
        "DB_USER",
        "DB_PASSWORD",
        "DB_POOL_MIN",
        "DB_POOL_MAX",
        "DB_BLOCKING_POOL_MIN",
        "DB_BLOCKING_POOL_MAX",
        "DB_COMMAND_TIMEOUT_SECS",
        "DB_ACQUIRE_TIMEOUT_SECS",
        "DB_ACQUIRE_ATTEMPTS",
        "DB_RETRY_DELAY_MS",
        "DB_RETRY_JITTER",
        "REDIS_HOST",
        "REDIS_PORT",
        "REDIS_DB",
        "REDIS_PASSWORD",
        "REDIS_TIMEOUT_SECS",
        "CACHE_MAX_ENTRIES",
        "CACHE_SWEEP_INTERVAL_SECS",
    ];

    #[test]
    fn test_default_values() {
        // Clear environment variables to test defaults
        for var in VARS {
            env::remove_var(var);
        }

        let config = Config::from_env();

        assert_eq!(config.db_host, "localhost");
        assert_eq!(config.db_port, 5432);
        assert_eq!(config.db_name, "bom_db");
        assert_eq!(config.db_user, "postgres");
        assert_eq!(config.db_pool_min, 10);
        assert_eq!(config.db_pool_max, 100);
        assert_eq!(config.db_command_timeout_secs, 60);
        assert_eq!(config.db_acquire_attempts, 3);
        assert_eq!(config.db_retry_delay_ms, 1000);
        assert_eq!(config.redis_password, None);
        assert_eq!(config.redis_timeout_secs, 5);
        assert_eq!(config.cache_max_entries, 10_000);

        let redis = config.redis_connection_info();
        assert_eq!(redis.addr, ConnectionAddr::Tcp("localhost".to_string(), 6379));
        assert_eq!(redis.redis.db, 0);
        assert_eq!(redis.redis.password, None);
    }

    fn sample() -> Config {
        Config {
            db_host: "db".to_string(),
            db_port: 5433,
            db_name: "bom".to_string(),
            db_user: "app".to_string(),
            db_password: "secret".to_string(),
            db_pool_min: 2,
            db_pool_max: 8,
            db_blocking_pool_min: 1,
            db_blocking_pool_max: 4,
            db_command_timeout_secs: 15,
            db_acquire_timeout_secs: 3,
            db_acquire_attempts: 5,
            db_retry_delay_ms: 200,
            db_retry_jitter: 0.0,
            redis_host: "cache".to_string(),
            redis_port: 6380,
            redis_db: 2,
            redis_password: Some("pw".to_string()),
            redis_timeout_secs: 1,
            cache_max_entries: 50,
            cache_sweep_interval_secs: 10,
        }
    }

    #[test]
    fn test_pool_configs() {
        let config = sample();

        let pool = config.async_pool_config().unwrap();
        assert_eq!(pool.min_size(), 2);
        assert_eq!(pool.max_size(), 8);
        assert_eq!(pool.command_timeout(), Duration::from_secs(15));
        assert_eq!(pool.acquire_timeout(), Duration::from_secs(3));
        assert_eq!(pool.retry().max_attempts(), 5);
        assert_eq!(pool.retry().delay(), Duration::from_millis(200));

        let blocking = config.blocking_pool_config().unwrap();
        assert_eq!(blocking.max_size(), 4);
    }

    #[test]
    fn test_invalid_pool_bounds() {
        let config = Config {
            db_pool_min: 20,
            db_pool_max: 5,
            ..sample()
        };
        assert!(matches!(
            config.async_pool_config(),
            Err(PoolError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_redis_connection_info_with_password() {
        let redis = sample().redis_connection_info();
        assert_eq!(redis.addr, ConnectionAddr::Tcp("cache".to_string(), 6380));
        assert_eq!(redis.redis.db, 2);
        assert_eq!(redis.redis.password.as_deref(), Some("pw"));
    }

    #[test]
    fn test_redis_password_with_url_delimiters_is_kept_verbatim() {
        let config = Config {
            redis_password: Some("p@ss/w#rd?%41:x".to_string()),
            ..sample()
        };

        let settings = config.cache_settings();
        let redis = settings.redis.unwrap();

        assert_eq!(redis.addr, ConnectionAddr::Tcp("cache".to_string(), 6380));
        assert_eq!(redis.redis.password.as_deref(), Some("p@ss/w#rd?%41:x"));
        assert_eq!(redis.redis.db, 2);
    }

    #[test]
    fn test_statement_timeout_option() {
        let config = sample();
        assert_eq!(config.pg_config().get_options(), Some("-c statement_timeout=15000"));
    }
}
