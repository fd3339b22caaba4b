//! Resource layer of the BOM backend: PostgreSQL connection pools with
//! health-checked leases, a Redis cache that degrades to an in-process
//! store, and the monitoring surface that reports on both.

pub mod app;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod reporter;
pub mod state;

#[cfg(test)]
pub(crate) mod testing;
