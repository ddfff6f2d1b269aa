//! Redis-backed cache storage.

use color_eyre::{eyre::eyre, Result};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;
use tracing::{info, warn};

use super::traits::{CacheStats, CacheStorage};
use crate::config::CacheConfig;

/// Redis storage over a shared, cheaply cloned connection manager.
pub struct RedisStorage {
  conn: ConnectionManager,
}

impl RedisStorage {
  /// Connect to the configured server, retrying `max_retries` times.
  pub async fn connect(config: &CacheConfig) -> Result<Self> {
    let url = config.redis_url();
    let client =
      redis::Client::open(url.as_str()).map_err(|e| eyre!("Invalid redis url {}: {}", url, e))?;

    let attempts = config.max_retries + 1;
    let mut attempt = 0;
    loop {
      attempt += 1;
      match ConnectionManager::new(client.clone()).await {
        Ok(conn) => {
          info!(%url, "connected to redis");
          return Ok(Self { conn });
        }
        Err(e) if attempt < attempts => {
          warn!(%url, attempt, error = %e, "redis connect failed, retrying");
          tokio::time::sleep(config.retry_delay()).await;
        }
        Err(e) => {
          return Err(eyre!(
            "Failed to connect to redis at {} after {} attempts: {}",
            url,
            attempt,
            e
          ));
        }
      }
    }
  }
}

/// `PX` argument for `ttl`: at least 1 (zero is rejected) and never past
/// what the server stores as a signed 64-bit expiry.
fn px_millis(ttl: Duration) -> u64 {
  let millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
  millis.clamp(1, i64::MAX as u64)
}

/// Pull `used_memory` out of an `INFO memory` reply.
fn parse_used_memory(info: &str) -> Option<u64> {
  info
    .lines()
    .find_map(|line| line.strip_prefix("used_memory:"))
    .and_then(|v| v.trim().parse().ok())
}

impl CacheStorage for RedisStorage {
  fn name(&self) -> &'static str {
    "redis"
  }

  async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
    let mut conn = self.conn.clone();

    conn
      .get(key)
      .await
      .map_err(|e| eyre!("Redis GET {} failed: {}", key, e))
  }

  async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()> {
    let mut conn = self.conn.clone();
    let ttl_ms = px_millis(ttl);

    let _: () = redis::cmd("SET")
      .arg(key)
      .arg(value)
      .arg("PX")
      .arg(ttl_ms)
      .query_async(&mut conn)
      .await
      .map_err(|e| eyre!("Redis SET {} failed: {}", key, e))?;

    Ok(())
  }

  async fn delete(&self, key: &str) -> Result<u64> {
    let mut conn = self.conn.clone();

    conn
      .del(key)
      .await
      .map_err(|e| eyre!("Redis DEL {} failed: {}", key, e))
  }

  async fn delete_matching(&self, pattern: &str) -> Result<u64> {
    let mut conn = self.conn.clone();

    let keys: Vec<String> = conn
      .keys(pattern)
      .await
      .map_err(|e| eyre!("Redis KEYS {} failed: {}", pattern, e))?;

    if keys.is_empty() {
      return Ok(0);
    }

    conn
      .del(&keys)
      .await
      .map_err(|e| eyre!("Redis DEL failed: {}", e))
  }

  async fn stats(&self, pattern: &str) -> Result<CacheStats> {
    let mut conn = self.conn.clone();

    let _: () = redis::cmd("PING")
      .query_async(&mut conn)
      .await
      .map_err(|e| eyre!("Redis PING failed: {}", e))?;

    let keys: Vec<String> = conn
      .keys(pattern)
      .await
      .map_err(|e| eyre!("Redis KEYS {} failed: {}", pattern, e))?;

    let info: String = redis::cmd("INFO")
      .arg("memory")
      .query_async(&mut conn)
      .await
      .map_err(|e| eyre!("Redis INFO failed: {}", e))?;

    Ok(CacheStats {
      backend: self.name().to_string(),
      connected: true,
      keys: keys.len() as u64,
      memory_bytes: parse_used_memory(&info),
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_px_millis_bounds() {
    assert_eq!(px_millis(Duration::from_secs(30)), 30_000);
    assert_eq!(px_millis(Duration::ZERO), 1);
    assert_eq!(px_millis(Duration::MAX), i64::MAX as u64);
    assert_eq!(px_millis(Duration::from_secs(u64::MAX)), i64::MAX as u64);
  }

  #[test]
  fn test_parse_used_memory() {
    let info = "# Memory\r\nused_memory:1048576\r\nused_memory_human:1.00M\r\n";
    assert_eq!(parse_used_memory(info), Some(1_048_576));
    assert_eq!(parse_used_memory("# Memory\r\n"), None);
  }
}
