//! Query result caching over an expiring key-value backend.
//!
//! This module provides a domain-agnostic caching mechanism that:
//! - Fingerprints structured query parameters into stable keys
//! - Stores serialized results with a TTL in Redis, SQLite, or nowhere
//! - Treats every backend failure as a miss or a no-op

pub mod keys;
mod layer;
mod redis;
mod storage;
mod traits;

pub use layer::QueryCache;
pub use self::redis::RedisStorage;
pub use storage::{Backend, NoopStorage, SqliteStorage};
pub use traits::{CacheStats, CacheStorage};

#[cfg(test)]
pub(crate) use layer::tests::FailingStorage;
