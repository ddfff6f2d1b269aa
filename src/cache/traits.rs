//! Core traits and types for the caching system.

use color_eyre::Result;
use serde::Serialize;
use std::future::Future;
use std::time::Duration;

/// Trait for key-value cache backends with expiring entries.
///
/// Values are opaque bytes; expiry is owned by the backend. Implementations
/// report every failure as an error and leave the policy to `QueryCache`.
pub trait CacheStorage: Send + Sync + 'static {
  /// Backend name for logs and stats (e.g., "redis")
  fn name(&self) -> &'static str;

  /// Fetch a live entry. Expired entries read as `None`.
  fn get(&self, key: &str) -> impl Future<Output = Result<Option<Vec<u8>>>> + Send;

  /// Store an entry that expires after `ttl`.
  fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> impl Future<Output = Result<()>> + Send;

  /// Remove one entry, returning how many were removed.
  fn delete(&self, key: &str) -> impl Future<Output = Result<u64>> + Send;

  /// Remove every entry whose key matches a glob-style `pattern` (`ns:*`).
  fn delete_matching(&self, pattern: &str) -> impl Future<Output = Result<u64>> + Send;

  /// Introspect the entries matching `pattern`.
  fn stats(&self, pattern: &str) -> impl Future<Output = Result<CacheStats>> + Send;
}

/// Best-effort view of the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
  /// Which backend answered ("redis", "sqlite", "none")
  pub backend: String,
  /// Whether the backend answered at all
  pub connected: bool,
  /// Live keys under the cache namespace
  pub keys: u64,
  /// Backend memory usage in bytes, when the backend reports it
  pub memory_bytes: Option<u64>,
}

impl CacheStats {
  /// The shape returned when the backend cannot be reached.
  pub fn disconnected(backend: &str) -> Self {
    Self {
      backend: backend.to_string(),
      ..Self::default()
    }
  }
}
