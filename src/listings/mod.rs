//! Marketplace listings: filters, enhancement, and the cached page service.

mod assemble;
mod cache;
mod enhance;
mod filters;
mod service;
mod types;

pub use cache::ListingQueryKey;
pub use enhance::{enhance, links_for};
pub use filters::{Direction, FilterCriteria, Pagination, SortOrder};
pub use service::{FetchStage, ListingService};
pub use types::{
  ActivityEntry, ActivityKind, CategoryGroup, ConfidenceLevel, Coordinates, EnhancedListing, Link,
  ListingAggregate, ListingItem, ListingLinks, LocationInfo, MarketStats, PaginationInfo,
  VerificationInfo, ViewerContext, VERIFY_PERMISSION,
};
