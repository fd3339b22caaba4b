//! Connection pool types shared by the blocking and async pools.

mod config;
mod error;
mod http_mapping;
mod lease;
mod retry;
mod status;

pub use config::PoolConfig;
pub use error::{DriverError, PoolError, Result};
pub use http_mapping::pool_error_to_status_code;
pub use lease::LeaseState;
pub use retry::RetryPolicy;
pub use status::{unix_timestamp, PoolReport, PoolStats, PoolStatus};
