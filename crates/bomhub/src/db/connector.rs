//! Driver seam for the connection pools.
//!
//! A connector knows how to open a physical connection and run a statement
//! batch on it. The pools never see driver types beyond the associated
//! `Connection`.

use async_trait::async_trait;

use bomhub_core::pool::DriverError;

/// Opens and drives connections for [`AsyncPool`](super::AsyncPool).
#[async_trait]
pub trait AsyncConnector: Send + Sync + 'static {
    type Connection: Send + 'static;

    /// Opens a new physical connection.
    async fn connect(&self) -> Result<Self::Connection, DriverError>;

    /// Runs one or more statements, discarding any rows.
    async fn batch_execute(
        &self,
        conn: &mut Self::Connection,
        sql: &str,
    ) -> Result<(), DriverError>;
}

/// Opens and drives connections for [`BlockingPool`](super::BlockingPool).
///
/// Every call may block the current thread; inside an async runtime call
/// through `tokio::task::spawn_blocking`.
pub trait Connector: Send + Sync + 'static {
    type Connection: Send + 'static;

    fn connect(&self) -> Result<Self::Connection, DriverError>;

    fn batch_execute(&self, conn: &mut Self::Connection, sql: &str) -> Result<(), DriverError>;
}
