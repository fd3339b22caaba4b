//! PostgreSQL connectors.

use async_trait::async_trait;

use bomhub_core::pool::DriverError;

use super::{AsyncConnector, Connector};

/// Flattens a PostgreSQL error, keeping the SQLSTATE when the server sent one.
pub fn map_pg_error(err: tokio_postgres::Error) -> DriverError {
    match err.as_db_error() {
        Some(db) => DriverError::new(format!("{} ({})", db.message(), db.code().code())),
        None => DriverError::new(err.to_string()),
    }
}

/// Opens `tokio-postgres` clients. Each client's connection task is spawned
/// onto the current runtime.
#[derive(Clone)]
pub struct PgAsyncConnector {
    config: tokio_postgres::Config,
}

impl PgAsyncConnector {
    pub fn new(config: tokio_postgres::Config) -> Self {
        Self { config }
    }
}

#[async_trait]
impl AsyncConnector for PgAsyncConnector {
    type Connection = tokio_postgres::Client;

    async fn connect(&self) -> Result<tokio_postgres::Client, DriverError> {
        let (client, connection) = self
            .config
            .connect(tokio_postgres::NoTls)
            .await
            .map_err(map_pg_error)?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::warn!(error = %e, "PostgreSQL connection terminated");
            }
        });

        Ok(client)
    }

    async fn batch_execute(
        &self,
        conn: &mut tokio_postgres::Client,
        sql: &str,
    ) -> Result<(), DriverError> {
        if conn.is_closed() {
            return Err(DriverError::new("connection is closed"));
        }
        conn.batch_execute(sql).await.map_err(map_pg_error)
    }
}

/// Opens blocking `postgres` clients.
///
/// The blocking client drives its own runtime, so it must not be used from
/// inside an async task; go through `tokio::task::spawn_blocking`.
#[derive(Clone)]
pub struct PgConnector {
    config: postgres::Config,
}

impl PgConnector {
    pub fn new(config: postgres::Config) -> Self {
        Self { config }
    }
}

impl Connector for PgConnector {
    type Connection = postgres::Client;

    fn connect(&self) -> Result<postgres::Client, DriverError> {
        self.config.connect(postgres::NoTls).map_err(map_pg_error)
    }

    fn batch_execute(&self, conn: &mut postgres::Client, sql: &str) -> Result<(), DriverError> {
        if conn.is_closed() {
            return Err(DriverError::new("connection is closed"));
        }
        conn.batch_execute(sql).map_err(map_pg_error)
    }
}
