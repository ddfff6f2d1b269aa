//! Cache-aside access to a storage backend with failure isolation.

use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::keys;
use super::traits::{CacheStats, CacheStorage};

/// Query result cache over a storage backend.
///
/// Every backend failure is logged and absorbed: `get` reads as a miss and
/// writes or invalidations become no-ops. Callers cannot tell an outage from
/// a miss, so the cache never holds anything the gateway can't rebuild.
pub struct QueryCache<S: CacheStorage> {
  storage: Arc<S>,
  namespace: String,
  default_ttl: Duration,
}

impl<S: CacheStorage> QueryCache<S> {
  /// Create a new cache over `storage`, scoping its keys under `namespace`.
  pub fn new(storage: S, namespace: impl Into<String>) -> Self {
    Self {
      storage: Arc::new(storage),
      namespace: namespace.into(),
      default_ttl: Duration::from_secs(300),
    }
  }

  /// Set the TTL used when `set` is called without one.
  pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
    self.default_ttl = ttl;
    self
  }

  pub fn namespace(&self) -> &str {
    &self.namespace
  }

  /// Fingerprint `payload` under this cache's namespace.
  ///
  /// Returns `None` if the payload cannot be serialized; the caller should
  /// then bypass the cache.
  pub fn key_for<T: Serialize + ?Sized>(&self, payload: &T) -> Option<String> {
    match keys::generate_key(&self.namespace, payload) {
      Ok(key) => Some(key),
      Err(e) => {
        warn!(error = %e, "cache key generation failed");
        None
      }
    }
  }

  /// Look up and deserialize an entry. Any failure reads as a miss.
  pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
    let bytes = match self.storage.get(key).await {
      Ok(Some(bytes)) => bytes,
      Ok(None) => {
        debug!(key, "cache miss");
        return None;
      }
      Err(e) => {
        warn!(key, backend = self.storage.name(), error = %e, "cache read failed");
        return None;
      }
    };

    match serde_json::from_slice(&bytes) {
      Ok(value) => {
        debug!(key, "cache hit");
        Some(value)
      }
      Err(e) => {
        warn!(key, error = %e, "discarding malformed cache entry");
        None
      }
    }
  }

  /// Serialize and store `value`. Best-effort: failures are logged only.
  pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Option<Duration>) {
    let bytes = match serde_json::to_vec(value) {
      Ok(bytes) => bytes,
      Err(e) => {
        warn!(key, error = %e, "failed to serialize cache entry");
        return;
      }
    };

    let ttl = ttl.unwrap_or(self.default_ttl);
    if let Err(e) = self.storage.set(key, bytes, ttl).await {
      warn!(key, backend = self.storage.name(), error = %e, "cache write failed");
    } else {
      debug!(key, ttl_ms = ttl.as_millis() as u64, "cache write");
    }
  }

  /// Invalidate one entry. Returns how many entries were removed (0 on failure).
  pub async fn clear_key(&self, key: &str) -> u64 {
    match self.storage.delete(key).await {
      Ok(removed) => removed,
      Err(e) => {
        warn!(key, backend = self.storage.name(), error = %e, "cache invalidation failed");
        0
      }
    }
  }

  /// Invalidate every entry in this namespace.
  pub async fn clear(&self) -> u64 {
    let pattern = self.pattern();
    match self.storage.delete_matching(&pattern).await {
      Ok(removed) => removed,
      Err(e) => {
        warn!(%pattern, backend = self.storage.name(), error = %e, "cache clear failed");
        0
      }
    }
  }

  /// Backend introspection, or a disconnected shape when it can't answer.
  pub async fn stats(&self) -> CacheStats {
    match self.storage.stats(&self.pattern()).await {
      Ok(stats) => stats,
      Err(e) => {
        warn!(backend = self.storage.name(), error = %e, "cache stats unavailable");
        CacheStats::disconnected(self.storage.name())
      }
    }
  }

  fn pattern(&self) -> String {
    format!("{}:*", self.namespace)
  }
}

impl<S: CacheStorage> Clone for QueryCache<S> {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
      namespace: self.namespace.clone(),
      default_ttl: self.default_ttl,
    }
  }
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;
  use crate::cache::SqliteStorage;
  use color_eyre::{eyre::eyre, Result};
  use serde::Deserialize;

  /// Storage whose every call fails, as if the server were gone.
  pub(crate) struct FailingStorage;

  impl CacheStorage for FailingStorage {
    fn name(&self) -> &'static str {
      "failing"
    }

    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>> {
      Err(eyre!("connection refused"))
    }

    async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Duration) -> Result<()> {
      Err(eyre!("connection refused"))
    }

    async fn delete(&self, _key: &str) -> Result<u64> {
      Err(eyre!("connection refused"))
    }

    async fn delete_matching(&self, _pattern: &str) -> Result<u64> {
      Err(eyre!("connection refused"))
    }

    async fn stats(&self, _pattern: &str) -> Result<CacheStats> {
      Err(eyre!("connection refused"))
    }
  }

  #[derive(Debug, PartialEq, Serialize, Deserialize)]
  struct Page {
    items: Vec<String>,
    total: u64,
  }

  fn sample() -> Page {
    Page {
      items: vec!["oak_log".into(), "diamond".into()],
      total: 2,
    }
  }

  fn sqlite_cache() -> QueryCache<SqliteStorage> {
    QueryCache::new(SqliteStorage::in_memory().unwrap(), "test:query")
  }

  #[tokio::test]
  async fn test_set_then_get_before_and_after_ttl() {
    let cache = sqlite_cache();
    let key = cache.key_for(&serde_json::json!({"page": 1})).unwrap();

    cache.set(&key, &sample(), Some(Duration::from_millis(50))).await;
    assert_eq!(cache.get::<Page>(&key).await, Some(sample()));

    tokio::time::sleep(Duration::from_millis(80)).await;
    assert_eq!(cache.get::<Page>(&key).await, None);
  }

  #[tokio::test]
  async fn test_malformed_entry_reads_as_miss() {
    let storage = SqliteStorage::in_memory().unwrap();
    storage
      .set("test:query:bad", b"not json".to_vec(), Duration::from_secs(60))
      .await
      .unwrap();
    let cache = QueryCache::new(storage, "test:query");

    assert_eq!(cache.get::<Page>("test:query:bad").await, None);
  }

  #[tokio::test]
  async fn test_failing_backend_degrades_silently() {
    let cache = QueryCache::new(FailingStorage, "test:query");

    cache.set("test:query:k", &sample(), None).await;
    assert_eq!(cache.get::<Page>("test:query:k").await, None);
    assert_eq!(cache.clear().await, 0);
    assert_eq!(cache.clear_key("test:query:k").await, 0);

    let stats = cache.stats().await;
    assert!(!stats.connected);
    assert_eq!(stats.backend, "failing");
    assert_eq!(stats.keys, 0);
  }

  #[tokio::test]
  async fn test_clear_removes_only_namespace() {
    let storage = SqliteStorage::in_memory().unwrap();
    storage
      .set("elsewhere:k", vec![1], Duration::from_secs(60))
      .await
      .unwrap();
    let cache = QueryCache::new(storage, "test:query");

    cache.set("test:query:a", &sample(), None).await;
    cache.set("test:query:b", &sample(), None).await;

    assert_eq!(cache.stats().await.keys, 2);
    assert_eq!(cache.clear().await, 2);
    assert_eq!(cache.stats().await.keys, 0);
    assert_eq!(cache.storage.get("elsewhere:k").await.unwrap(), Some(vec![1]));
  }

  #[tokio::test]
  async fn test_clear_key() {
    let cache = sqlite_cache();

    cache.set("test:query:a", &sample(), None).await;
    assert_eq!(cache.clear_key("test:query:a").await, 1);
    assert_eq!(cache.get::<Page>("test:query:a").await, None);
  }
}
