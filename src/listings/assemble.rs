//! Aggregates derived from fetched listings: stats, category groups, activity.

use std::collections::{BTreeMap, HashSet};

use super::types::{ActivityEntry, ActivityKind, CategoryGroup, ListingItem, MarketStats};
use crate::gateway::api_types::ShopRow;

const UNCATEGORIZED: &str = "uncategorized";

/// Distinct, non-blank shop names.
pub fn active_shops(rows: &[ShopRow]) -> u64 {
  rows
    .iter()
    .filter_map(|r| r.shop_name.as_deref())
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .collect::<HashSet<_>>()
    .len() as u64
}

/// Market-wide numbers. `items` is the full matching set, not one page.
pub fn market_stats(total_items: u64, active_shops: u64, groups: usize, items: &[ListingItem]) -> MarketStats {
  let average_price = if items.is_empty() {
    0.0
  } else {
    let sum: f64 = items.iter().map(|i| i.price).sum();
    (sum / items.len() as f64 * 100.0).round() / 100.0
  };

  MarketStats {
    total_items,
    active_shops,
    total_categories: groups as u64,
    average_price,
    verified_items: items
      .iter()
      .filter(|i| i.verification.last_verified_at.is_some())
      .count() as u64,
    sample_size: items.len() as u64,
  }
}

/// Group `items` by category, largest group first, keeping the first
/// `preview` items of each. Input order decides which items are previewed.
pub fn group_categories(items: &[ListingItem], preview: usize) -> Vec<CategoryGroup<ListingItem>> {
  let mut groups: BTreeMap<&str, (u64, Vec<ListingItem>)> = BTreeMap::new();

  for item in items {
    let category = item.category.as_deref().unwrap_or(UNCATEGORIZED);
    let (count, top) = groups.entry(category).or_default();
    *count += 1;
    if top.len() < preview {
      top.push(item.clone());
    }
  }

  let mut groups: Vec<CategoryGroup<ListingItem>> = groups
    .into_iter()
    .map(|(category, (item_count, top_items))| CategoryGroup {
      category: category.to_string(),
      item_count,
      top_items,
    })
    .collect();

  // Stable sort keeps categories with equal counts alphabetical
  groups.sort_by(|a, b| b.item_count.cmp(&a.item_count));
  groups
}

/// Most recent events across `items`, newest first.
pub fn recent_activity(items: &[ListingItem], limit: usize) -> Vec<ActivityEntry> {
  let mut entries: Vec<ActivityEntry> = items.iter().filter_map(latest_event).collect();

  entries.sort_by(|a, b| b.at.cmp(&a.at));
  entries.truncate(limit);
  entries
}

/// The newest thing that happened to `item`, if it carries any timestamp.
fn latest_event(item: &ListingItem) -> Option<ActivityEntry> {
  let candidates = [
    (ActivityKind::NewListing, item.created_at),
    (ActivityKind::PriceUpdate, item.updated_at.filter(|u| Some(*u) != item.created_at)),
    (ActivityKind::Verified, item.verification.last_verified_at),
  ];

  let (kind, at) = candidates
    .into_iter()
    .filter_map(|(kind, at)| at.map(|at| (kind, at)))
    .max_by_key(|(_, at)| *at)?;

  Some(ActivityEntry {
    kind,
    listing_id: item.id.clone(),
    item_name: item.item_name.clone(),
    shop_name: item.shop_name.clone(),
    price: item.price,
    at,
  })
}
