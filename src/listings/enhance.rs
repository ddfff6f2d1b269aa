//! Turning raw rows into listing items, and items into per-viewer listings.

use super::types::{
  ConfidenceLevel, Coordinates, EnhancedListing, Link, ListingItem, ListingLinks, LocationInfo,
  VerificationInfo, ViewerContext, VERIFY_PERMISSION,
};
use crate::gateway::api_types::ListingRow;

const LISTINGS_PATH: &str = "/api/listings";

impl From<ListingRow> for ListingItem {
  fn from(row: ListingRow) -> Self {
    ListingItem {
      id: row.id,
      item_name: row.item_name,
      category: row.category,
      price: row.price,
      stock_quantity: row.stock_quantity,
      shop_name: row.shop_name,
      owner_id: row.owner_id,
      location: LocationInfo {
        biome: row.biome,
        direction: row.direction,
        warp_command: row.warp_command,
        coordinates: row.coordinates.map(|c| Coordinates {
          x: c.x,
          y: c.y,
          z: c.z,
        }),
      },
      verification: VerificationInfo {
        last_verified_at: row.last_verified_at,
        verified_by: row.verified_by,
        confidence: ConfidenceLevel::parse_or_default(row.confidence_level.as_deref()),
      },
      created_at: row.created_at,
      updated_at: row.updated_at,
    }
  }
}

/// Build the links `viewer` may follow from `item`.
pub fn links_for(item: &ListingItem, viewer: &ViewerContext) -> ListingLinks {
  let href = format!("{}/{}", LISTINGS_PATH, item.id);
  let owner = viewer.owns(item);

  ListingLinks {
    self_link: Link {
      href: href.clone(),
      method: "GET",
    },
    edit: owner.then(|| Link {
      href: href.clone(),
      method: "PUT",
    }),
    update_stock: owner.then(|| Link {
      href: format!("{}/stock", href),
      method: "PATCH",
    }),
    report_price: viewer.is_authenticated().then(|| Link {
      href: format!("{}/price-reports", href),
      method: "POST",
    }),
    verify: viewer.has_permission(VERIFY_PERMISSION).then(|| Link {
      href: format!("{}/verify", href),
      method: "POST",
    }),
  }
}

pub fn enhance(item: ListingItem, viewer: &ViewerContext) -> EnhancedListing {
  let links = links_for(&item, viewer);
  EnhancedListing { item, links }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn row() -> ListingRow {
    serde_json::from_value(serde_json::json!({
      "id": "l-1",
      "item_name": "Oak Log",
      "category": "blocks",
      "price": 2.0,
      "stock_quantity": 64,
      "shop_name": "Timber Co",
      "owner_id": "alice",
      "biome": "forest",
      "direction": "north",
      "warp_command": "/warp timber",
      "coordinates": {"x": 1, "y": 70, "z": -3},
      "last_verified_at": "2026-03-01T12:00:00Z",
      "verified_by": "mod-bob",
      "confidence_level": "HIGH"
    }))
    .unwrap()
  }

  #[test]
  fn test_row_merges_location_and_verification() {
    let item = ListingItem::from(row());

    assert_eq!(item.location.warp_command.as_deref(), Some("/warp timber"));
    assert_eq!(item.location.coordinates, Some(Coordinates { x: 1, y: 70, z: -3 }));
    assert_eq!(item.verification.verified_by.as_deref(), Some("mod-bob"));
    assert_eq!(item.verification.confidence, ConfidenceLevel::High);
  }

  #[test]
  fn test_missing_confidence_defaults_to_medium() {
    let mut raw = row();
    raw.confidence_level = None;

    assert_eq!(ListingItem::from(raw).verification.confidence, ConfidenceLevel::Medium);
  }

  #[test]
  fn test_anonymous_viewer_gets_only_self_link() {
    let links = links_for(&ListingItem::from(row()), &ViewerContext::anonymous());

    assert_eq!(links.self_link.href, "/api/listings/l-1");
    assert!(links.edit.is_none());
    assert!(links.update_stock.is_none());
    assert!(links.report_price.is_none());
    assert!(links.verify.is_none());
  }

  #[test]
  fn test_owner_gets_edit_links() {
    let links = links_for(&ListingItem::from(row()), &ViewerContext::user("alice"));

    assert_eq!(links.edit.unwrap().method, "PUT");
    assert_eq!(links.update_stock.unwrap().href, "/api/listings/l-1/stock");
    assert!(links.report_price.is_some());
    assert!(links.verify.is_none());
  }

  #[test]
  fn test_verifier_gets_verify_link_but_not_edit() {
    let viewer = ViewerContext::user("carol").with_permission(VERIFY_PERMISSION);
    let links = links_for(&ListingItem::from(row()), &viewer);

    assert!(links.edit.is_none());
    assert!(links.report_price.is_some());
    assert_eq!(links.verify.unwrap().href, "/api/listings/l-1/verify");
  }

  #[test]
  fn test_enhanced_listing_serializes_flat_with_links() {
    let json = serde_json::to_value(enhance(ListingItem::from(row()), &ViewerContext::anonymous()))
      .unwrap();

    assert_eq!(json["itemName"], "Oak Log");
    assert_eq!(json["_links"]["self"]["method"], "GET");
    assert!(json["_links"].get("edit").is_none());
  }
}
