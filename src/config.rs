use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub gateway: GatewayConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub listings: ListingsConfig,
  #[serde(default)]
  pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
  /// EnvFilter directive, overridden by RUST_LOG
  pub level: String,
  /// Append logs to this file instead of stderr
  pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
  fn default() -> Self {
    Self {
      level: "marketgate=info".to_string(),
      file: None,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
  /// REST base URL, e.g. https://db.example.com/rest/v1
  pub url: String,
  /// Table or view holding the listings
  #[serde(default = "default_resource")]
  pub resource: String,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

fn default_resource() -> String {
  "listings".to_string()
}

fn default_timeout_secs() -> u64 {
  10
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
  #[default]
  Redis,
  Sqlite,
  /// Caching disabled
  #[serde(rename = "none")]
  Disabled,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  pub backend: BackendKind,
  pub host: String,
  pub port: u16,
  /// Logical database index
  pub database: u32,
  pub default_ttl_secs: u64,
  pub max_retries: u32,
  pub retry_delay_ms: u64,
  /// Prefix for every cache key
  pub namespace: String,
  /// SQLite file (defaults to $XDG_DATA_HOME/marketgate/cache.db)
  pub path: Option<PathBuf>,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      backend: BackendKind::Redis,
      host: "127.0.0.1".to_string(),
      port: 6379,
      database: 0,
      default_ttl_secs: 300,
      max_retries: 3,
      retry_delay_ms: 500,
      namespace: "marketplace:query".to_string(),
      path: None,
    }
  }
}

impl CacheConfig {
  pub fn redis_url(&self) -> String {
    format!("redis://{}:{}/{}", self.host, self.port, self.database)
  }

  pub fn default_ttl(&self) -> Duration {
    Duration::from_secs(self.default_ttl_secs)
  }

  pub fn retry_delay(&self) -> Duration {
    Duration::from_millis(self.retry_delay_ms)
  }

  /// Resolve the SQLite cache file location.
  pub fn sqlite_path(&self) -> Result<PathBuf> {
    if let Some(path) = &self.path {
      return Ok(path.clone());
    }

    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("marketgate").join("cache.db"))
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ListingsConfig {
  /// How long an assembled listing page stays cached
  pub ttl_secs: u64,
  pub featured_limit: u64,
  /// Items shown per category group
  pub category_preview: usize,
  pub activity_limit: usize,
  /// Most rows read for the shop, category and stats aggregates
  pub aggregate_row_limit: u64,
}

impl Default for ListingsConfig {
  fn default() -> Self {
    Self {
      ttl_secs: 30,
      featured_limit: 6,
      category_preview: 3,
      activity_limit: 5,
      aggregate_row_limit: 1000,
    }
  }
}

impl ListingsConfig {
  pub fn ttl(&self) -> Duration {
    Duration::from_secs(self.ttl_secs)
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./marketgate.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/marketgate/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    let mut config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => {
        return Err(eyre!(
          "No configuration file found. Create one at ~/.config/marketgate/config.yaml\n\
                 See config.example.yaml for the format."
        ))
      }
    };

    config.apply_env_overrides()?;
    Ok(config)
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("marketgate.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("marketgate").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::from_yaml(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  pub fn from_yaml(contents: &str) -> Result<Self> {
    serde_yaml::from_str(contents).map_err(|e| eyre!("{}", e))
  }

  /// Let deployments point at a different cache without editing the file.
  fn apply_env_overrides(&mut self) -> Result<()> {
    if let Ok(host) = std::env::var("MARKETGATE_CACHE_HOST") {
      self.cache.host = host;
    }
    if let Ok(port) = std::env::var("MARKETGATE_CACHE_PORT") {
      self.cache.port = port
        .parse()
        .map_err(|e| eyre!("Invalid MARKETGATE_CACHE_PORT {:?}: {}", port, e))?;
    }
    Ok(())
  }

  /// Get the gateway API key from the environment, if one is set.
  ///
  /// Anonymous access is allowed, so a missing key is not an error.
  pub fn get_api_key() -> Option<String> {
    std::env::var("MARKETGATE_API_KEY").ok()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_minimal_config_uses_defaults() {
    let config = Config::from_yaml("gateway:\n  url: https://db.test/rest/v1\n").unwrap();

    assert_eq!(config.gateway.resource, "listings");
    assert_eq!(config.cache.backend, BackendKind::Redis);
    assert_eq!(config.cache.redis_url(), "redis://127.0.0.1:6379/0");
    assert_eq!(config.cache.namespace, "marketplace:query");
    assert_eq!(config.listings.ttl(), Duration::from_secs(30));
    assert_eq!(config.logging.level, "marketgate=info");
  }

  #[test]
  fn test_cache_section_overrides() {
    let yaml = r#"
gateway:
  url: https://db.test/rest/v1
  resource: shop_items
cache:
  backend: none
  host: cache.internal
  port: 6380
  database: 2
  retry_delay_ms: 50
listings:
  featured_limit: 4
"#;
    let config = Config::from_yaml(yaml).unwrap();

    assert_eq!(config.gateway.resource, "shop_items");
    assert_eq!(config.cache.backend, BackendKind::Disabled);
    assert_eq!(config.cache.redis_url(), "redis://cache.internal:6380/2");
    assert_eq!(config.cache.retry_delay(), Duration::from_millis(50));
    // Unset fields keep their defaults
    assert_eq!(config.cache.max_retries, 3);
    assert_eq!(config.listings.featured_limit, 4);
    assert_eq!(config.listings.category_preview, 3);
    assert_eq!(config.listings.aggregate_row_limit, 1000);
  }

  #[test]
  fn test_missing_gateway_is_an_error() {
    assert!(Config::from_yaml("cache:\n  port: 1\n").is_err());
  }

  #[test]
  fn test_explicit_missing_path_is_an_error() {
    let err = Config::load(Some(Path::new("/nonexistent/marketgate.yaml"))).unwrap_err();
    assert!(err.to_string().contains("Config file not found"));
  }
}
