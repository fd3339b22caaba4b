//! Cache services.
//!
//! [`CacheService`] and [`BlockingCacheService`] front Redis with an
//! in-process [`MemoryStore`] and degrade to it when Redis is unreachable.

mod blocking;
mod fallback;
mod memory;
pub mod redis_impl;
mod service;

pub use blocking::BlockingCacheService;
pub use memory::MemoryStore;
pub use redis_impl::{BlockingRedisCache, RedisCache};
pub use service::{CacheService, CacheSettings};
