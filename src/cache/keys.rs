//! Deterministic cache fingerprints for structured query parameters.

use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Rebuild `value` with every object's keys in sorted order.
pub fn canonicalize(value: &Value) -> Value {
  match value {
    Value::Object(map) => {
      let mut entries: Vec<(&String, &Value)> = map.iter().collect();
      entries.sort_by(|a, b| a.0.cmp(b.0));

      let mut sorted = Map::new();
      for (k, v) in entries {
        sorted.insert(k.clone(), canonicalize(v));
      }
      Value::Object(sorted)
    }
    Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
    scalar => scalar.clone(),
  }
}

/// Fingerprint an already-built JSON payload as `namespace:sha256hex`.
pub fn fingerprint(namespace: &str, payload: &Value) -> String {
  let canonical = canonicalize(payload).to_string();

  // SHA256 hash for stable, fixed-length keys
  let mut hasher = Sha256::new();
  hasher.update(canonical.as_bytes());
  format!("{}:{}", namespace, hex::encode(hasher.finalize()))
}

/// Fingerprint any serializable payload.
///
/// Fails only when the payload cannot become JSON (e.g. a map with
/// non-string keys).
pub fn generate_key<T: Serialize + ?Sized>(namespace: &str, payload: &T) -> serde_json::Result<String> {
  let value = serde_json::to_value(payload)?;
  Ok(fingerprint(namespace, &value))
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  const NS: &str = "marketplace:query";

  #[test]
  fn test_key_ignores_property_order() {
    let a: Value = serde_json::from_str(r#"{"a":1,"b":2}"#).unwrap();
    let b: Value = serde_json::from_str(r#"{"b":2,"a":1}"#).unwrap();

    assert_eq!(fingerprint(NS, &a), fingerprint(NS, &b));
  }

  #[test]
  fn test_key_ignores_nested_property_order() {
    let a = json!({"filters": {"category": "tools", "biome": "desert"}, "pagination": {"page": 1, "itemsPerPage": 20}});
    let b = json!({"pagination": {"itemsPerPage": 20, "page": 1}, "filters": {"biome": "desert", "category": "tools"}});

    assert_eq!(fingerprint(NS, &a), fingerprint(NS, &b));
  }

  #[test]
  fn test_key_is_sensitive_to_scalars() {
    let tools = generate_key(NS, &json!({"category": "tools"})).unwrap();
    let weapons = generate_key(NS, &json!({"category": "weapons"})).unwrap();

    assert_ne!(tools, weapons);
  }

  #[test]
  fn test_key_is_sensitive_to_array_order() {
    let a = fingerprint(NS, &json!({"biomes": ["desert", "jungle"]}));
    let b = fingerprint(NS, &json!({"biomes": ["jungle", "desert"]}));

    assert_ne!(a, b);
  }

  #[test]
  fn test_key_format() {
    let key = fingerprint(NS, &json!({}));
    let (ns, hash) = key.rsplit_once(':').unwrap();

    assert_eq!(ns, NS);
    assert_eq!(hash.len(), 64);
    assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
  }

  #[test]
  fn test_canonicalize_sorts_recursively() {
    let value: Value = serde_json::from_str(r#"{"z":[{"y":1,"x":2}],"a":null}"#).unwrap();

    assert_eq!(canonicalize(&value).to_string(), r#"{"a":null,"z":[{"x":2,"y":1}]}"#);
  }
}
