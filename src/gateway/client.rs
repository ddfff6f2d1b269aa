use color_eyre::{eyre::eyre, Result};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_RANGE};
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::api_types::parse_content_range;
use super::RestSource;
use crate::config::{Config, GatewayConfig};
use crate::query::QueryBuilder;

/// Longest slice of an error body kept in reports
const ERROR_BODY_LIMIT: usize = 200;

/// REST gateway client
#[derive(Clone)]
pub struct GatewayClient {
  http: reqwest::Client,
  base_url: String,
  api_key: Option<String>,
}

impl GatewayClient {
  pub fn new(config: &GatewayConfig) -> Result<Self> {
    Self::with_api_key(config, Config::get_api_key())
  }

  pub fn with_api_key(config: &GatewayConfig, api_key: Option<String>) -> Result<Self> {
    // Validate early so every later join is known to parse
    Url::parse(&config.url).map_err(|e| eyre!("Invalid gateway url {}: {}", config.url, e))?;

    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

    let http = reqwest::Client::builder()
      .default_headers(headers)
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()
      .map_err(|e| eyre!("Failed to create gateway client: {}", e))?;

    Ok(Self {
      http,
      base_url: config.url.clone(),
      api_key,
    })
  }

  /// Resource URL with every query pair percent-encoded.
  fn url_for(&self, query: &QueryBuilder) -> Result<Url> {
    let raw = format!("{}/{}", self.base_url.trim_end_matches('/'), query.resource());
    let mut url = Url::parse(&raw).map_err(|e| eyre!("Failed to build url {}: {}", raw, e))?;

    let pairs = query.pairs();
    if !pairs.is_empty() {
      url.query_pairs_mut().extend_pairs(pairs);
    }
    Ok(url)
  }

  fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
    match &self.api_key {
      Some(key) => request
        .header("apikey", key)
        .header(AUTHORIZATION, format!("Bearer {}", key)),
      None => request,
    }
  }

  /// Turn a non-success response into an error carrying status and body.
  async fn check(response: Response, what: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
      return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let snippet: String = body.chars().take(ERROR_BODY_LIMIT).collect();
    Err(eyre!("{} failed with {}: {}", what, status, snippet))
  }
}

impl RestSource for GatewayClient {
  async fn fetch_rows<T>(&self, query: &QueryBuilder) -> Result<Vec<T>>
  where
    T: DeserializeOwned + Send,
  {
    let url = self.url_for(query)?;
    debug!(%url, "gateway fetch");

    let response = self
      .authorize(self.http.get(url.clone()))
      .send()
      .await
      .map_err(|e| eyre!("Request to {} failed: {}", url, e))?;

    let response = Self::check(response, "Fetch").await?;

    response
      .json()
      .await
      .map_err(|e| eyre!("Failed to parse rows from {}: {}", url, e))
  }

  async fn count(&self, query: &QueryBuilder) -> Result<u64> {
    let url = self.url_for(query)?;
    debug!(%url, "gateway count");

    // HEAD with an exact count returns only the Content-Range header
    let response = self
      .authorize(self.http.head(url.clone()))
      .header("Prefer", "count=exact")
      .send()
      .await
      .map_err(|e| eyre!("Count request to {} failed: {}", url, e))?;

    let response = Self::check(response, "Count").await?;

    let header = response
      .headers()
      .get(CONTENT_RANGE)
      .ok_or_else(|| eyre!("Count response from {} has no Content-Range", url))?
      .to_str()
      .map_err(|e| eyre!("Unreadable Content-Range from {}: {}", url, e))?;

    parse_content_range(header).ok_or_else(|| eyre!("Unexpected Content-Range {:?}", header))
  }
}
