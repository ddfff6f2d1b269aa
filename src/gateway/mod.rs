//! Access to the REST data gateway.

pub mod api_types;
mod client;

use color_eyre::Result;
use serde::de::DeserializeOwned;
use std::future::Future;

use crate::query::QueryBuilder;

pub use client::GatewayClient;

/// Something that can answer builder queries with rows and counts.
pub trait RestSource: Send + Sync {
  /// Execute `query` and deserialize every returned row.
  fn fetch_rows<T>(&self, query: &QueryBuilder) -> impl Future<Output = Result<Vec<T>>> + Send
  where
    T: DeserializeOwned + Send;

  /// Count the rows `query` matches.
  fn count(&self, query: &QueryBuilder) -> impl Future<Output = Result<u64>> + Send;
}
