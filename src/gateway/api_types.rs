//! Serde types matching the REST gateway's row and header formats.
//!
//! These types are separate from domain types so column naming and loose
//! typing stay contained here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Columns requested for full listing rows.
pub const LISTING_COLUMNS: [&str; 16] = [
  "id",
  "item_name",
  "category",
  "price",
  "stock_quantity",
  "shop_name",
  "owner_id",
  "biome",
  "direction",
  "warp_command",
  "coordinates",
  "last_verified_at",
  "verified_by",
  "confidence_level",
  "created_at",
  "updated_at",
];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ApiCoordinates {
  pub x: i64,
  pub y: i64,
  pub z: i64,
}

/// One listing row as stored upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingRow {
  #[serde(deserialize_with = "string_or_number")]
  pub id: String,
  pub item_name: String,
  pub category: Option<String>,
  #[serde(default)]
  pub price: f64,
  #[serde(default)]
  pub stock_quantity: i64,
  #[serde(default)]
  pub shop_name: String,
  pub owner_id: Option<String>,
  pub biome: Option<String>,
  pub direction: Option<String>,
  pub warp_command: Option<String>,
  pub coordinates: Option<ApiCoordinates>,
  pub last_verified_at: Option<DateTime<Utc>>,
  pub verified_by: Option<String>,
  pub confidence_level: Option<String>,
  pub created_at: Option<DateTime<Utc>>,
  pub updated_at: Option<DateTime<Utc>>,
}

/// Projection used for the active-shop aggregate.
#[derive(Debug, Deserialize)]
pub struct ShopRow {
  pub shop_name: Option<String>,
}

/// Ids may be serial integers or uuids depending on the table.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
  D: Deserializer<'de>,
{
  #[derive(Deserialize)]
  #[serde(untagged)]
  enum Id {
    Text(String),
    Number(i64),
  }

  Ok(match Id::deserialize(deserializer)? {
    Id::Text(s) => s,
    Id::Number(n) => n.to_string(),
  })
}

/// Parse the total out of a `Content-Range` header (`0-19/100`, `*/100`).
///
/// Returns `None` when the total is unknown (`0-19/*`) or the header is malformed.
pub fn parse_content_range(header: &str) -> Option<u64> {
  let (_, total) = header.trim().rsplit_once('/')?;
  total.parse().ok()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_row_accepts_numeric_id_and_sparse_columns() {
    let row: ListingRow = serde_json::from_str(
      r#"{"id": 42, "item_name": "Oak Log", "category": null, "price": 2.5,
          "shop_name": "Timber Co", "coordinates": {"x": 10, "y": 64, "z": -20},
          "updated_at": "2026-01-02T03:04:05Z"}"#,
    )
    .unwrap();

    assert_eq!(row.id, "42");
    assert_eq!(row.stock_quantity, 0);
    assert_eq!(row.coordinates, Some(ApiCoordinates { x: 10, y: 64, z: -20 }));
    assert!(row.updated_at.is_some());
    assert!(row.last_verified_at.is_none());
  }

  #[test]
  fn test_parse_content_range() {
    assert_eq!(parse_content_range("0-19/100"), Some(100));
    assert_eq!(parse_content_range("*/0"), Some(0));
    assert_eq!(parse_content_range("0-19/*"), None);
    assert_eq!(parse_content_range("garbage"), None);
  }
}
