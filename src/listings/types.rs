use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::filters::Pagination;

/// Permission that unlocks the verify link
pub const VERIFY_PERMISSION: &str = "verify_listings";

/// How much a listing's price and stock can be trusted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
  High,
  #[default]
  Medium,
  Low,
}

impl ConfidenceLevel {
  pub fn as_str(&self) -> &'static str {
    match self {
      ConfidenceLevel::High => "high",
      ConfidenceLevel::Medium => "medium",
      ConfidenceLevel::Low => "low",
    }
  }

  /// Parse a stored level, falling back to medium for anything unknown.
  pub fn parse_or_default(raw: Option<&str>) -> Self {
    match raw.map(|s| s.trim().to_lowercase()).as_deref() {
      Some("high") => ConfidenceLevel::High,
      Some("low") => ConfidenceLevel::Low,
      _ => ConfidenceLevel::Medium,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coordinates {
  pub x: i64,
  pub y: i64,
  pub z: i64,
}

/// Where in the world the shop is
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationInfo {
  pub biome: Option<String>,
  pub direction: Option<String>,
  pub warp_command: Option<String>,
  pub coordinates: Option<Coordinates>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationInfo {
  pub last_verified_at: Option<DateTime<Utc>>,
  pub verified_by: Option<String>,
  pub confidence: ConfidenceLevel,
}

/// A listing with location and verification merged in.
///
/// Contains nothing that depends on who is looking, so it is safe to cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingItem {
  pub id: String,
  pub item_name: String,
  pub category: Option<String>,
  pub price: f64,
  pub stock_quantity: i64,
  pub shop_name: String,
  pub owner_id: Option<String>,
  pub location: LocationInfo,
  pub verification: VerificationInfo,
  pub created_at: Option<DateTime<Utc>>,
  pub updated_at: Option<DateTime<Utc>>,
}

/// Who is looking at the listings.
#[derive(Debug, Clone, Default)]
pub struct ViewerContext {
  pub user_id: Option<String>,
  pub permissions: HashSet<String>,
}

impl ViewerContext {
  pub fn anonymous() -> Self {
    Self::default()
  }

  pub fn user(id: impl Into<String>) -> Self {
    Self {
      user_id: Some(id.into()),
      permissions: HashSet::new(),
    }
  }

  pub fn with_permission(mut self, permission: impl Into<String>) -> Self {
    self.permissions.insert(permission.into());
    self
  }

  pub fn is_authenticated(&self) -> bool {
    self.user_id.is_some()
  }

  pub fn owns(&self, item: &ListingItem) -> bool {
    matches!((&self.user_id, &item.owner_id), (Some(me), Some(owner)) if me == owner)
  }

  pub fn has_permission(&self, permission: &str) -> bool {
    self.permissions.contains(permission)
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Link {
  pub href: String,
  pub method: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingLinks {
  #[serde(rename = "self")]
  pub self_link: Link,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub edit: Option<Link>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub update_stock: Option<Link>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub report_price: Option<Link>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub verify: Option<Link>,
}

/// A listing as shown to one viewer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnhancedListing {
  #[serde(flatten)]
  pub item: ListingItem,
  #[serde(rename = "_links")]
  pub links: ListingLinks,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationInfo {
  pub page: u64,
  pub items_per_page: u64,
  pub total_items: u64,
  pub total_pages: u64,
  pub has_next: bool,
  pub has_previous: bool,
}

impl PaginationInfo {
  pub fn new(pagination: Pagination, total_items: u64) -> Self {
    let total_pages = pagination.total_pages(total_items);
    Self {
      page: pagination.page,
      items_per_page: pagination.items_per_page,
      total_items,
      total_pages,
      has_next: pagination.page < total_pages,
      has_previous: pagination.page > 1,
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketStats {
  pub total_items: u64,
  pub active_shops: u64,
  pub total_categories: u64,
  pub average_price: f64,
  pub verified_items: u64,
  /// Rows the category and price stats were computed from; less than
  /// `total_items` when the aggregate read was capped
  pub sample_size: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryGroup<T> {
  pub category: String,
  pub item_count: u64,
  /// Highest-priced items in the category
  pub top_items: Vec<T>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
  NewListing,
  PriceUpdate,
  Verified,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEntry {
  pub kind: ActivityKind,
  pub listing_id: String,
  pub item_name: String,
  pub shop_name: String,
  pub price: f64,
  pub at: DateTime<Utc>,
}

/// One page of listings with the market context around it.
///
/// Cached as `ListingAggregate<ListingItem>`, returned as
/// `ListingAggregate<EnhancedListing>` once links are attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingAggregate<T> {
  pub featured_items: Vec<T>,
  pub all_items: Vec<T>,
  pub pagination: PaginationInfo,
  pub market_stats: MarketStats,
  pub categories: Vec<CategoryGroup<T>>,
  pub recent_activity: Vec<ActivityEntry>,
}

impl<T> ListingAggregate<T> {
  /// The degraded result served when the gateway can't be reached.
  pub fn empty(pagination: Pagination) -> Self {
    Self {
      featured_items: Vec::new(),
      all_items: Vec::new(),
      pagination: PaginationInfo::new(pagination, 0),
      market_stats: MarketStats::default(),
      categories: Vec::new(),
      recent_activity: Vec::new(),
    }
  }

  /// True for the degraded shape (and for a genuinely empty catalog).
  pub fn is_empty(&self) -> bool {
    self.all_items.is_empty() && self.pagination.total_items == 0
  }

  /// Convert every item, keeping the rest of the aggregate.
  pub fn map_items<U>(self, mut f: impl FnMut(T) -> U) -> ListingAggregate<U> {
    let featured_items = self.featured_items.into_iter().map(&mut f).collect();
    let all_items = self.all_items.into_iter().map(&mut f).collect();
    let categories = self
      .categories
      .into_iter()
      .map(|group| CategoryGroup {
        category: group.category,
        item_count: group.item_count,
        top_items: group.top_items.into_iter().map(&mut f).collect(),
      })
      .collect();

    ListingAggregate {
      featured_items,
      all_items,
      pagination: self.pagination,
      market_stats: self.market_stats,
      categories,
      recent_activity: self.recent_activity,
    }
  }
}
