//! Cache identity for listing pages.

use serde::Serialize;

use super::filters::{FilterCriteria, Pagination};

/// Everything that shapes a cached listing aggregate.
///
/// Viewer identity is absent: cached aggregates hold no links.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingQueryKey {
  pub filters: FilterCriteria,
  pub pagination: Pagination,
}

impl ListingQueryKey {
  /// Filters are normalized so equivalent criteria share one key.
  pub fn new(filters: &FilterCriteria, pagination: Pagination) -> Self {
    Self {
      filters: filters.normalized(),
      pagination,
    }
  }
}
