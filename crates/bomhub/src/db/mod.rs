//! Database connection pools.
//!
//! Two pool flavors share one contract: [`AsyncPool`] for async request
//! handlers and [`BlockingPool`] for thread-per-request callers. Each is owned
//! by a manager that creates it lazily and exactly once.

mod blocking;
mod connector;
mod lease;
mod manager;
mod pool;
pub mod postgres;
pub(crate) mod probe;

pub use blocking::BlockingPool;
pub use connector::{AsyncConnector, Connector};
pub use lease::{AsyncLease, BlockingLease};
pub use manager::{AsyncPoolManager, BlockingPoolManager};
pub use pool::AsyncPool;
pub use probe::{is_healthy, is_healthy_blocking, PROBE_QUERY};
