//! Listing pages assembled from gateway fan-out queries, cached as a unit.

use color_eyre::Report;
use std::fmt;
use tracing::{debug, error, info, warn};

use super::assemble;
use super::cache::ListingQueryKey;
use super::enhance::enhance;
use super::filters::{FilterCriteria, Pagination};
use super::types::{EnhancedListing, ListingAggregate, ListingItem, PaginationInfo, ViewerContext};
use crate::cache::{CacheStorage, QueryCache};
use crate::config::ListingsConfig;
use crate::gateway::api_types::{ListingRow, ShopRow, LISTING_COLUMNS};
use crate::gateway::RestSource;
use crate::query::{Filter, QueryBuilder};

/// The fan-out sub-queries behind one aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStage {
  Page,
  Featured,
  Count,
  Shops,
  Categories,
}

impl fmt::Display for FetchStage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      FetchStage::Page => "page",
      FetchStage::Featured => "featured",
      FetchStage::Count => "count",
      FetchStage::Shops => "shops",
      FetchStage::Categories => "categories",
    };
    f.write_str(name)
  }
}

type StageResult<T> = Result<T, (FetchStage, Report)>;

/// Serves listing pages with cache-aside over the gateway.
///
/// Cached aggregates are viewer-agnostic; links are attached per call after
/// the cache lookup, so two viewers sharing a key each get their own links.
pub struct ListingService<S: CacheStorage, R: RestSource> {
  source: R,
  cache: QueryCache<S>,
  resource: String,
  settings: ListingsConfig,
}

impl<S: CacheStorage, R: RestSource> ListingService<S, R> {
  pub fn new(
    source: R,
    cache: QueryCache<S>,
    resource: impl Into<String>,
    settings: ListingsConfig,
  ) -> Self {
    Self {
      source,
      cache,
      resource: resource.into(),
      settings,
    }
  }

  pub fn cache(&self) -> &QueryCache<S> {
    &self.cache
  }

  /// Page `pagination` of listings matching `filters`, as seen by `viewer`.
  ///
  /// Never fails: if the gateway can't answer, the result is the empty
  /// aggregate (no items, zero pages, zero shops).
  pub async fn get_listings(
    &self,
    filters: &FilterCriteria,
    pagination: Pagination,
    viewer: &ViewerContext,
  ) -> ListingAggregate<EnhancedListing> {
    self
      .load(filters, pagination)
      .await
      .map_items(|item| enhance(item, viewer))
  }

  /// The viewer-agnostic aggregate, from cache or freshly assembled.
  pub async fn load(
    &self,
    filters: &FilterCriteria,
    pagination: Pagination,
  ) -> ListingAggregate<ListingItem> {
    let key = self.cache.key_for(&ListingQueryKey::new(filters, pagination));

    if let Some(key) = &key {
      if let Some(hit) = self.cache.get::<ListingAggregate<ListingItem>>(key).await {
        debug!(%key, "serving listings from cache");
        return hit;
      }
    }

    match self.fetch(filters, pagination).await {
      Ok(aggregate) => {
        if let Some(key) = &key {
          self.cache.set(key, &aggregate, Some(self.settings.ttl())).await;
        }
        aggregate
      }
      Err((stage, e)) => {
        error!(%stage, error = ?e, page = pagination.page, "listing fetch failed, serving empty result");
        ListingAggregate::empty(pagination)
      }
    }
  }

  fn base_query(&self, filters: &FilterCriteria) -> QueryBuilder {
    filters.apply(QueryBuilder::new(self.resource.as_str()))
  }

  /// Run the five sub-queries concurrently and assemble the result.
  async fn fetch(
    &self,
    filters: &FilterCriteria,
    pagination: Pagination,
  ) -> StageResult<ListingAggregate<ListingItem>> {
    let base = self.base_query(filters);

    let page_query = filters
      .sort_order()
      .apply(base.clone().select(LISTING_COLUMNS))
      .limit(pagination.limit())
      .offset(pagination.offset());

    let mut featured_query = base.clone().select(LISTING_COLUMNS);
    // An explicit confidence filter already decides what's shown. Unrated
    // rows count as medium, so NULL has to be let through explicitly.
    if filters.confidence.is_none() {
      featured_query = featured_query.any_of(
        "confidence_level",
        vec![Filter::Neq("low".to_string()), Filter::IsNull],
      );
    }
    let featured_query = featured_query
      .order("price", false)
      .limit(self.settings.featured_limit);

    let count_query = base.clone().select("id");

    let row_limit = self.settings.aggregate_row_limit;

    let shops_query = base.clone().select("shop_name").limit(row_limit);

    let categories_query = base
      .select(LISTING_COLUMNS)
      .order("price", false)
      .limit(row_limit);

    let (page_rows, featured_rows, total_items, shop_rows, category_rows) = futures::try_join!(
      stage(FetchStage::Page, self.source.fetch_rows::<ListingRow>(&page_query)),
      stage(FetchStage::Featured, self.source.fetch_rows::<ListingRow>(&featured_query)),
      stage(FetchStage::Count, self.source.count(&count_query)),
      stage(FetchStage::Shops, self.source.fetch_rows::<ShopRow>(&shops_query)),
      stage(FetchStage::Categories, self.source.fetch_rows::<ListingRow>(&categories_query)),
    )?;

    let all_items: Vec<ListingItem> = page_rows.into_iter().map(ListingItem::from).collect();
    let featured_items: Vec<ListingItem> = featured_rows.into_iter().map(ListingItem::from).collect();
    let matching: Vec<ListingItem> = category_rows.into_iter().map(ListingItem::from).collect();

    if matching.len() as u64 >= row_limit && total_items > row_limit {
      warn!(
        total_items,
        row_limit,
        "aggregate read capped, category and price stats cover a sample"
      );
    }

    let categories = assemble::group_categories(&matching, self.settings.category_preview);
    let market_stats = assemble::market_stats(
      total_items,
      assemble::active_shops(&shop_rows),
      categories.len(),
      &matching,
    );
    let recent_activity = assemble::recent_activity(&matching, self.settings.activity_limit);

    info!(
      total_items,
      page = pagination.page,
      items = all_items.len(),
      "assembled listing page"
    );

    Ok(ListingAggregate {
      featured_items,
      all_items,
      pagination: PaginationInfo::new(pagination, total_items),
      market_stats,
      categories,
      recent_activity,
    })
  }
}

/// Tag a sub-query's error with the stage it came from.
async fn stage<T>(
  stage: FetchStage,
  fut: impl std::future::Future<Output = color_eyre::Result<T>>,
) -> StageResult<T> {
  fut.await.map_err(|e| (stage, e))
}
