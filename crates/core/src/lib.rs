//! Functional core for the bomhub resource layer.
//!
//! Everything in this crate is free of I/O: cache key and pattern helpers,
//! the tagged cache payload, TTL classes, pool configuration, retry policy,
//! the lease state machine, status payloads and the error taxonomy. The
//! `bomhub` crate supplies the drivers and runtime around them.

pub mod cache;
pub mod pool;
