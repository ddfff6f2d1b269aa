//! Cache storage backends: SQLite, no-op, and the configured `Backend`.

use chrono::Utc;
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{info, warn};

use super::redis::RedisStorage;
use super::traits::{CacheStats, CacheStorage};
use crate::config::{BackendKind, CacheConfig};

/// Storage implementation that doesn't cache anything.
/// Used when caching is disabled - all operations are no-ops.
pub struct NoopStorage;

impl CacheStorage for NoopStorage {
  fn name(&self) -> &'static str {
    "none"
  }

  async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>> {
    Ok(None) // Always miss
  }

  async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Duration) -> Result<()> {
    Ok(()) // Discard
  }

  async fn delete(&self, _key: &str) -> Result<u64> {
    Ok(0)
  }

  async fn delete_matching(&self, _pattern: &str) -> Result<u64> {
    Ok(0)
  }

  async fn stats(&self, _pattern: &str) -> Result<CacheStats> {
    Ok(CacheStats {
      backend: self.name().to_string(),
      connected: true,
      ..CacheStats::default()
    })
  }
}

/// SQLite-based expiring key-value storage.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

/// Schema for the cache table.
const CACHE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS cache_entries (
    key TEXT PRIMARY KEY,
    value BLOB NOT NULL,
    expires_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_cache_entries_expires
    ON cache_entries(expires_at);
"#;

impl SqliteStorage {
  /// Open (or create) a cache database at `path`.
  pub fn open(path: &Path) -> Result<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    Self::with_connection(conn)
  }

  /// Open a private in-memory database.
  pub fn in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| eyre!("Failed to open in-memory cache database: {}", e))?;

    Self::with_connection(conn)
  }

  fn with_connection(conn: Connection) -> Result<Self> {
    conn
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;

    Ok(Self {
      conn: Mutex::new(conn),
    })
  }

  fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
    self.conn.lock().map_err(|e| eyre!("Lock poisoned: {}", e))
  }
}

/// Translate a `*` glob into a LIKE pattern, escaping LIKE's own wildcards.
fn glob_to_like(pattern: &str) -> String {
  let mut like = String::with_capacity(pattern.len());
  for c in pattern.chars() {
    match c {
      '*' => like.push('%'),
      '%' | '_' | '\\' => {
        like.push('\\');
        like.push(c);
      }
      _ => like.push(c),
    }
  }
  like
}

/// TTL in milliseconds, capped so huge durations never wrap negative.
fn ttl_millis(ttl: Duration) -> i64 {
  i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX)
}

fn now_millis() -> i64 {
  Utc::now().timestamp_millis()
}

impl CacheStorage for SqliteStorage {
  fn name(&self) -> &'static str {
    "sqlite"
  }

  async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
    let conn = self.lock()?;

    conn
      .query_row(
        "SELECT value FROM cache_entries WHERE key = ? AND expires_at > ?",
        params![key, now_millis()],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| eyre!("Failed to read cache entry {}: {}", key, e))
  }

  async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()> {
    let conn = self.lock()?;
    let now = now_millis();
    let expires_at = now.saturating_add(ttl_millis(ttl));

    // Purge expired rows lazily on write
    conn
      .execute("DELETE FROM cache_entries WHERE expires_at <= ?", params![now])
      .map_err(|e| eyre!("Failed to purge expired entries: {}", e))?;

    conn
      .execute(
        "INSERT OR REPLACE INTO cache_entries (key, value, expires_at) VALUES (?, ?, ?)",
        params![key, value, expires_at],
      )
      .map_err(|e| eyre!("Failed to store cache entry {}: {}", key, e))?;

    Ok(())
  }

  async fn delete(&self, key: &str) -> Result<u64> {
    let conn = self.lock()?;

    let removed = conn
      .execute("DELETE FROM cache_entries WHERE key = ?", params![key])
      .map_err(|e| eyre!("Failed to delete cache entry {}: {}", key, e))?;

    Ok(removed as u64)
  }

  async fn delete_matching(&self, pattern: &str) -> Result<u64> {
    let conn = self.lock()?;

    let removed = conn
      .execute(
        "DELETE FROM cache_entries WHERE key LIKE ? ESCAPE '\\'",
        params![glob_to_like(pattern)],
      )
      .map_err(|e| eyre!("Failed to delete entries matching {}: {}", pattern, e))?;

    Ok(removed as u64)
  }

  async fn stats(&self, pattern: &str) -> Result<CacheStats> {
    let conn = self.lock()?;

    let (keys, bytes): (i64, Option<i64>) = conn
      .query_row(
        "SELECT COUNT(*), SUM(LENGTH(value)) FROM cache_entries
         WHERE key LIKE ? ESCAPE '\\' AND expires_at > ?",
        params![glob_to_like(pattern), now_millis()],
        |row| Ok((row.get(0)?, row.get(1)?)),
      )
      .map_err(|e| eyre!("Failed to read cache stats: {}", e))?;

    Ok(CacheStats {
      backend: self.name().to_string(),
      connected: true,
      keys: keys as u64,
      memory_bytes: Some(bytes.unwrap_or(0) as u64),
    })
  }
}

/// The backend chosen by configuration.
pub enum Backend {
  Redis(RedisStorage),
  Sqlite(SqliteStorage),
  Noop(NoopStorage),
}

impl Backend {
  /// Connect the configured backend.
  ///
  /// An unreachable Redis degrades to `Noop` so the service keeps answering
  /// from the gateway. A SQLite file that cannot be opened is an error.
  pub async fn connect(config: &CacheConfig) -> Result<Self> {
    match config.backend {
      BackendKind::Redis => match RedisStorage::connect(config).await {
        Ok(storage) => Ok(Backend::Redis(storage)),
        Err(e) => {
          warn!(error = %e, "cache backend unreachable, continuing without cache");
          Ok(Backend::Noop(NoopStorage))
        }
      },
      BackendKind::Sqlite => {
        let path = config.sqlite_path()?;
        info!(path = %path.display(), "opening sqlite cache");
        Ok(Backend::Sqlite(SqliteStorage::open(&path)?))
      }
      BackendKind::Disabled => Ok(Backend::Noop(NoopStorage)),
    }
  }
}

impl CacheStorage for Backend {
  fn name(&self) -> &'static str {
    match self {
      Backend::Redis(s) => s.name(),
      Backend::Sqlite(s) => s.name(),
      Backend::Noop(s) => s.name(),
    }
  }

  async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
    match self {
      Backend::Redis(s) => s.get(key).await,
      Backend::Sqlite(s) => s.get(key).await,
      Backend::Noop(s) => s.get(key).await,
    }
  }

  async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()> {
    match self {
      Backend::Redis(s) => s.set(key, value, ttl).await,
      Backend::Sqlite(s) => s.set(key, value, ttl).await,
      Backend::Noop(s) => s.set(key, value, ttl).await,
    }
  }

  async fn delete(&self, key: &str) -> Result<u64> {
    match self {
      Backend::Redis(s) => s.delete(key).await,
      Backend::Sqlite(s) => s.delete(key).await,
      Backend::Noop(s) => s.delete(key).await,
    }
  }

  async fn delete_matching(&self, pattern: &str) -> Result<u64> {
    match self {
      Backend::Redis(s) => s.delete_matching(pattern).await,
      Backend::Sqlite(s) => s.delete_matching(pattern).await,
      Backend::Noop(s) => s.delete_matching(pattern).await,
    }
  }

  async fn stats(&self, pattern: &str) -> Result<CacheStats> {
    match self {
      Backend::Redis(s) => s.stats(pattern).await,
      Backend::Sqlite(s) => s.stats(pattern).await,
      Backend::Noop(s) => s.stats(pattern).await,
    }
  }
}
