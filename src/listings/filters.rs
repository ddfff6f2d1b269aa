//! Listing filter criteria and pagination, and how they map onto queries.

use serde::{Deserialize, Serialize};

use super::types::ConfidenceLevel;
use crate::query::QueryBuilder;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
  North,
  East,
  South,
  West,
  Spawn,
}

impl Direction {
  pub fn as_str(&self) -> &'static str {
    match self {
      Direction::North => "north",
      Direction::East => "east",
      Direction::South => "south",
      Direction::West => "west",
      Direction::Spawn => "spawn",
    }
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
  #[default]
  Newest,
  Oldest,
  PriceAsc,
  PriceDesc,
  Name,
  Stock,
}

impl SortOrder {
  /// Append this ordering to `query`, with id as a tiebreak so pages don't overlap.
  pub fn apply(&self, query: QueryBuilder) -> QueryBuilder {
    let query = match self {
      SortOrder::Newest => query.order("created_at", false),
      SortOrder::Oldest => query.order("created_at", true),
      SortOrder::PriceAsc => query.order("price", true),
      SortOrder::PriceDesc => query.order("price", false),
      SortOrder::Name => query.order("item_name", true),
      SortOrder::Stock => query.order("stock_quantity", false),
    };
    query.order("id", true)
  }
}

/// What the caller wants to see. Unset fields don't constrain anything.
///
/// Unset fields are also left out of the serialized form, so two criteria
/// with the same predicates always fingerprint the same.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterCriteria {
  /// Case-insensitive substring of the item name
  #[serde(skip_serializing_if = "Option::is_none")]
  pub search: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub category: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub biome: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub direction: Option<Direction>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub shop: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub min_price: Option<f64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub max_price: Option<f64>,
  #[serde(skip_serializing_if = "std::ops::Not::not")]
  pub verified_only: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub confidence: Option<ConfidenceLevel>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub sort: Option<SortOrder>,
}

impl FilterCriteria {
  pub fn category(category: impl Into<String>) -> Self {
    Self {
      category: Some(category.into()),
      ..Self::default()
    }
  }

  pub fn sort_order(&self) -> SortOrder {
    self.sort.unwrap_or_default()
  }

  /// The same criteria with search trimmed (blank dropped) and sort resolved.
  pub fn normalized(&self) -> Self {
    let search = self
      .search
      .as_deref()
      .map(str::trim)
      .filter(|t| !t.is_empty())
      .map(String::from);

    Self {
      search,
      sort: Some(self.sort_order()),
      ..self.clone()
    }
  }

  /// Add the predicates (not the ordering) to `query`.
  pub fn apply(&self, mut query: QueryBuilder) -> QueryBuilder {
    if let Some(term) = self.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
      query = query.ilike("item_name", format!("*{}*", term));
    }
    if let Some(category) = &self.category {
      query = query.eq("category", category);
    }
    if let Some(biome) = &self.biome {
      query = query.eq("biome", biome);
    }
    if let Some(direction) = self.direction {
      query = query.eq("direction", direction.as_str());
    }
    if let Some(shop) = &self.shop {
      query = query.eq("shop_name", shop);
    }
    if let Some(confidence) = self.confidence {
      query = query.eq("confidence_level", confidence.as_str());
    }

    // One predicate per column, so a full range needs the combined form
    query = match (self.min_price, self.max_price) {
      (Some(min), Some(max)) => query.between("price", min, max),
      (Some(min), None) => query.gte("price", min),
      (None, Some(max)) => query.lte("price", max),
      (None, None) => query,
    };

    if self.verified_only {
      query = query.is_not_null("last_verified_at");
    }

    query
  }
}

/// A 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
  pub page: u64,
  pub items_per_page: u64,
}

impl Pagination {
  /// Both values are clamped to at least 1.
  pub fn new(page: u64, items_per_page: u64) -> Self {
    Self {
      page: page.max(1),
      items_per_page: items_per_page.max(1),
    }
  }

  /// Saturates instead of overflowing for absurd page numbers.
  pub fn offset(&self) -> u64 {
    self.page.saturating_sub(1).saturating_mul(self.items_per_page)
  }

  pub fn limit(&self) -> u64 {
    self.items_per_page
  }

  pub fn total_pages(&self, total_items: u64) -> u64 {
    // Fields are public, so don't trust the clamp from `new`
    total_items.div_ceil(self.items_per_page.max(1))
  }
}

impl Default for Pagination {
  fn default() -> Self {
    Self::new(1, 20)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::listings::types::PaginationInfo;

  #[test]
  fn test_pagination_math() {
    let first = Pagination::new(1, 20);
    let last = Pagination::new(5, 20);

    assert_eq!(first.total_pages(100), 5);
    // Items 1-20 and 81-100 (1-based)
    assert_eq!((first.offset() + 1, first.offset() + first.limit()), (1, 20));
    assert_eq!((last.offset() + 1, last.offset() + last.limit()), (81, 100));
    assert_eq!(first.total_pages(101), 6);
    assert_eq!(first.total_pages(0), 0);
  }

  #[test]
  fn test_pagination_clamps_to_one() {
    let p = Pagination::new(0, 0);

    assert_eq!(p, Pagination::new(1, 1));
    assert_eq!(p.offset(), 0);
  }

  #[test]
  fn test_huge_page_saturates_offset() {
    let p = Pagination::new(u64::MAX, 2);

    assert_eq!(p.offset(), u64::MAX);
    assert_eq!(Pagination::new(u64::MAX, u64::MAX).offset(), u64::MAX);
    assert_eq!(p.total_pages(100), 50);
  }

  #[test]
  fn test_unclamped_fields_do_not_panic() {
    let p = Pagination {
      page: 0,
      items_per_page: 0,
    };

    assert_eq!(p.offset(), 0);
    assert_eq!(p.total_pages(10), 10);
  }

  #[test]
  fn test_pagination_info_flags() {
    let info = PaginationInfo::new(Pagination::new(2, 20), 100);

    assert_eq!(info.total_pages, 5);
    assert!(info.has_next);
    assert!(info.has_previous);
    assert!(!PaginationInfo::new(Pagination::new(5, 20), 100).has_next);
  }

  #[test]
  fn test_filters_map_onto_query() {
    let filters = FilterCriteria {
      search: Some("  diamond ".into()),
      category: Some("tools".into()),
      direction: Some(Direction::North),
      min_price: Some(10.0),
      max_price: Some(50.5),
      verified_only: true,
      ..FilterCriteria::default()
    };

    let endpoint = filters
      .apply(QueryBuilder::new("listings"))
      .build_endpoint();

    assert_eq!(
      endpoint,
      "listings?item_name=ilike.*diamond*&category=eq.tools&direction=eq.north\
       &and=(price.gte.10,price.lte.50.5)&last_verified_at=not.is.null"
    );
  }

  #[test]
  fn test_single_price_bound() {
    let filters = FilterCriteria {
      max_price: Some(5.0),
      ..FilterCriteria::default()
    };

    assert_eq!(
      filters.apply(QueryBuilder::new("listings")).build_endpoint(),
      "listings?price=lte.5"
    );
  }

  #[test]
  fn test_blank_search_is_ignored() {
    let filters = FilterCriteria {
      search: Some("   ".into()),
      ..FilterCriteria::default()
    };

    assert_eq!(filters.apply(QueryBuilder::new("listings")).build_endpoint(), "listings");
  }

  #[test]
  fn test_sort_appends_tiebreak() {
    let endpoint = SortOrder::PriceDesc
      .apply(QueryBuilder::new("listings"))
      .build_endpoint();

    assert_eq!(endpoint, "listings?order=price.desc,id.asc");
  }

  #[test]
  fn test_normalized_resolves_sort_and_trims_search() {
    let filters = FilterCriteria {
      search: Some(" oak ".into()),
      ..FilterCriteria::default()
    };
    let normalized = filters.normalized();

    assert_eq!(normalized.search.as_deref(), Some("oak"));
    assert_eq!(normalized.sort, Some(SortOrder::Newest));
  }

  #[test]
  fn test_unset_fields_are_not_serialized() {
    let value = serde_json::to_value(FilterCriteria::category("blocks")).unwrap();

    assert_eq!(value, serde_json::json!({"category": "blocks"}));
  }
}
