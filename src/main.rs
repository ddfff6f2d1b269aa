use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use serde::de::DeserializeOwned;
use std::path::PathBuf;
use tracing::info;

use marketgate::cache::{Backend, CacheStorage, QueryCache};
use marketgate::config::Config;
use marketgate::gateway::GatewayClient;
use marketgate::listings::{
  ConfidenceLevel, Direction, FilterCriteria, ListingService, Pagination, SortOrder, ViewerContext,
};

#[derive(Parser, Debug)]
#[command(name = "marketgate")]
#[command(about = "Cached marketplace listings over a REST data gateway")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/marketgate/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Print one page of listings as JSON
  Listings(ListingsArgs),
  /// Inspect or clear the query cache
  Cache {
    #[command(subcommand)]
    action: CacheAction,
  },
}

#[derive(clap::Args, Debug)]
struct ListingsArgs {
  #[arg(long, default_value_t = 1)]
  page: u64,
  #[arg(long, default_value_t = 20)]
  per_page: u64,
  #[arg(long)]
  search: Option<String>,
  #[arg(long)]
  category: Option<String>,
  #[arg(long)]
  biome: Option<String>,
  /// north, east, south, west or spawn
  #[arg(long, value_parser = parse_enum::<Direction>)]
  direction: Option<Direction>,
  #[arg(long)]
  shop: Option<String>,
  #[arg(long)]
  min_price: Option<f64>,
  #[arg(long)]
  max_price: Option<f64>,
  #[arg(long)]
  verified_only: bool,
  /// low, medium or high
  #[arg(long, value_parser = parse_enum::<ConfidenceLevel>)]
  confidence: Option<ConfidenceLevel>,
  /// newest, oldest, price_asc, price_desc, name or stock
  #[arg(long, value_parser = parse_enum::<SortOrder>)]
  sort: Option<SortOrder>,
  /// View as this user id (anonymous if omitted)
  #[arg(long)]
  user: Option<String>,
  /// Grant the viewer a permission; repeatable
  #[arg(long = "permission")]
  permissions: Vec<String>,
}

impl ListingsArgs {
  fn filters(&self) -> FilterCriteria {
    FilterCriteria {
      search: self.search.clone(),
      category: self.category.clone(),
      biome: self.biome.clone(),
      direction: self.direction,
      shop: self.shop.clone(),
      min_price: self.min_price,
      max_price: self.max_price,
      verified_only: self.verified_only,
      confidence: self.confidence,
      sort: self.sort,
    }
  }

  fn viewer(&self) -> ViewerContext {
    let viewer = match &self.user {
      Some(id) => ViewerContext::user(id.clone()),
      None => ViewerContext::anonymous(),
    };
    self
      .permissions
      .iter()
      .fold(viewer, |v, p| v.with_permission(p.clone()))
  }
}

#[derive(Subcommand, Debug)]
enum CacheAction {
  /// Show backend health and key counts
  Stats,
  /// Remove one key, or every key in the namespace
  Clear {
    #[arg(long)]
    key: Option<String>,
  },
}

/// Reuse the serde names so the CLI accepts what the config and API use.
fn parse_enum<T: DeserializeOwned>(raw: &str) -> std::result::Result<T, String> {
  serde_json::from_value(serde_json::Value::String(raw.to_string()))
    .map_err(|_| format!("unknown value {:?}", raw))
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  let config = Config::load(args.config.as_deref())?;
  let _log_guard = marketgate::logging::init(&config.logging)?;

  let storage = Backend::connect(&config.cache).await?;
  info!(backend = storage.name(), "cache ready");
  let cache = QueryCache::new(storage, config.cache.namespace.clone())
    .with_default_ttl(config.cache.default_ttl());

  match args.command {
    Command::Listings(opts) => {
      let client = GatewayClient::new(&config.gateway)?;
      let service = ListingService::new(
        client,
        cache,
        config.gateway.resource.clone(),
        config.listings.clone(),
      );

      let page = service
        .get_listings(
          &opts.filters(),
          Pagination::new(opts.page, opts.per_page),
          &opts.viewer(),
        )
        .await;
      print_json(&page)?;
    }
    Command::Cache { action: CacheAction::Stats } => {
      print_json(&cache.stats().await)?;
    }
    Command::Cache { action: CacheAction::Clear { key } } => {
      let removed = match key {
        Some(key) => cache.clear_key(&key).await,
        None => cache.clear().await,
      };
      info!(removed, namespace = cache.namespace(), "cache cleared");
      print_json(&serde_json::json!({ "removed": removed }))?;
    }
  }

  Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
  let out = serde_json::to_string_pretty(value).map_err(|e| eyre!("Failed to encode output: {}", e))?;
  println!("{}", out);
  Ok(())
}
