//! Fluent builder for filtered, ordered and paginated REST queries.
//!
//! Operators are suffix-encoded the way PostgREST-style gateways expect them:
//!
//! ```ignore
//! let endpoint = QueryBuilder::new("listings")
//!   .select(["item_name", "price"])
//!   .eq("category", "tools")
//!   .order("price", false)
//!   .limit(10)
//!   .build_endpoint();
//!
//! assert_eq!(endpoint, "listings?select=item_name,price&category=eq.tools&order=price.desc&limit=10");
//! ```
//!
//! The builder never validates input. Each column holds at most one predicate;
//! setting a second one replaces the first in place.

use std::fmt::Display;

/// A single column predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
  Eq(String),
  Neq(String),
  Gt(String),
  Gte(String),
  Lt(String),
  Lte(String),
  /// Case-insensitive pattern, `*` is the wildcard
  ILike(String),
  Contains(String),
  In(Vec<String>),
  IsNull,
  IsNotNull,
  /// Inclusive bounds on one column, rendered as a logical `and` group
  Between { min: String, max: String },
  /// Any of the predicates holds, rendered as a logical `or` group
  AnyOf(Vec<Filter>),
}

impl Filter {
  /// The `name=value` pair for this predicate on `column`, unencoded.
  fn render(&self, column: &str) -> (String, String) {
    match self {
      Filter::Between { .. } => ("and".to_string(), self.logical_group(column)),
      Filter::AnyOf(_) => ("or".to_string(), self.logical_group(column)),
      other => (column.to_string(), other.operand()),
    }
  }

  /// Operator and value for a plain predicate, e.g. `eq.tools`.
  fn operand(&self) -> String {
    match self {
      Filter::Eq(v) => format!("eq.{}", v),
      Filter::Neq(v) => format!("neq.{}", v),
      Filter::Gt(v) => format!("gt.{}", v),
      Filter::Gte(v) => format!("gte.{}", v),
      Filter::Lt(v) => format!("lt.{}", v),
      Filter::Lte(v) => format!("lte.{}", v),
      Filter::ILike(p) => format!("ilike.{}", p),
      Filter::Contains(v) => format!("cs.{}", v),
      Filter::In(values) => format!("in.({})", values.join(",")),
      Filter::IsNull => "is.null".to_string(),
      Filter::IsNotNull => "not.is.null".to_string(),
      Filter::Between { .. } | Filter::AnyOf(_) => String::new(),
    }
  }

  /// The parenthesized member list of a logical group.
  fn logical_group(&self, column: &str) -> String {
    match self {
      Filter::Between { min, max } => format!("({col}.gte.{min},{col}.lte.{max})", col = column),
      Filter::AnyOf(filters) => {
        let members: Vec<String> = filters.iter().map(|f| f.nested(column)).collect();
        format!("({})", members.join(","))
      }
      _ => String::new(),
    }
  }

  /// This predicate as a member of a logical group.
  fn nested(&self, column: &str) -> String {
    match self {
      Filter::Between { .. } => format!("and{}", self.logical_group(column)),
      Filter::AnyOf(_) => format!("or{}", self.logical_group(column)),
      other => format!("{}.{}", column, other.operand()),
    }
  }
}

/// Anything that can name the selected columns: one name or an ordered list.
pub trait IntoFields {
  fn into_fields(self) -> Vec<String>;
}

impl IntoFields for &str {
  fn into_fields(self) -> Vec<String> {
    vec![self.to_string()]
  }
}

impl IntoFields for String {
  fn into_fields(self) -> Vec<String> {
    vec![self]
  }
}

impl IntoFields for &[&str] {
  fn into_fields(self) -> Vec<String> {
    self.iter().map(|s| s.to_string()).collect()
  }
}

impl<const N: usize> IntoFields for [&str; N] {
  fn into_fields(self) -> Vec<String> {
    self.iter().map(|s| s.to_string()).collect()
  }
}

impl IntoFields for Vec<&str> {
  fn into_fields(self) -> Vec<String> {
    self.into_iter().map(String::from).collect()
  }
}

impl IntoFields for Vec<String> {
  fn into_fields(self) -> Vec<String> {
    self
  }
}

/// Accumulated query state for one REST resource.
///
/// `Clone` is a deep copy, so a base query can be branched into several
/// variants without the variants seeing each other's changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryBuilder {
  resource: String,
  selected: Vec<String>,
  /// Column predicates in first-insertion order
  filters: Vec<(String, Filter)>,
  order_by: Vec<String>,
  limit: Option<u64>,
  offset: Option<u64>,
}

impl QueryBuilder {
  pub fn new(resource: impl Into<String>) -> Self {
    Self {
      resource: resource.into(),
      selected: Vec::new(),
      filters: Vec::new(),
      order_by: Vec::new(),
      limit: None,
      offset: None,
    }
  }

  pub fn resource(&self) -> &str {
    &self.resource
  }

  /// Replace the selected columns.
  pub fn select(mut self, fields: impl IntoFields) -> Self {
    self.selected = fields.into_fields();
    self
  }

  /// Set the predicate for `column`, replacing any earlier one.
  pub fn filter(mut self, column: impl Into<String>, filter: Filter) -> Self {
    let column = column.into();
    match self.filters.iter_mut().find(|(c, _)| *c == column) {
      Some(slot) => slot.1 = filter,
      None => self.filters.push((column, filter)),
    }
    self
  }

  pub fn eq(self, column: impl Into<String>, value: impl Display) -> Self {
    self.filter(column, Filter::Eq(value.to_string()))
  }

  pub fn neq(self, column: impl Into<String>, value: impl Display) -> Self {
    self.filter(column, Filter::Neq(value.to_string()))
  }

  pub fn gt(self, column: impl Into<String>, value: impl Display) -> Self {
    self.filter(column, Filter::Gt(value.to_string()))
  }

  pub fn gte(self, column: impl Into<String>, value: impl Display) -> Self {
    self.filter(column, Filter::Gte(value.to_string()))
  }

  pub fn lt(self, column: impl Into<String>, value: impl Display) -> Self {
    self.filter(column, Filter::Lt(value.to_string()))
  }

  pub fn lte(self, column: impl Into<String>, value: impl Display) -> Self {
    self.filter(column, Filter::Lte(value.to_string()))
  }

  pub fn ilike(self, column: impl Into<String>, pattern: impl Display) -> Self {
    self.filter(column, Filter::ILike(pattern.to_string()))
  }

  pub fn contains(self, column: impl Into<String>, value: impl Display) -> Self {
    self.filter(column, Filter::Contains(value.to_string()))
  }

  pub fn in_list<I, V>(self, column: impl Into<String>, values: I) -> Self
  where
    I: IntoIterator<Item = V>,
    V: Display,
  {
    let values = values.into_iter().map(|v| v.to_string()).collect();
    self.filter(column, Filter::In(values))
  }

  pub fn is_null(self, column: impl Into<String>) -> Self {
    self.filter(column, Filter::IsNull)
  }

  pub fn is_not_null(self, column: impl Into<String>) -> Self {
    self.filter(column, Filter::IsNotNull)
  }

  pub fn between(self, column: impl Into<String>, min: impl Display, max: impl Display) -> Self {
    self.filter(
      column,
      Filter::Between {
        min: min.to_string(),
        max: max.to_string(),
      },
    )
  }

  /// Match rows where any of `filters` holds on `column`.
  pub fn any_of(self, column: impl Into<String>, filters: Vec<Filter>) -> Self {
    self.filter(column, Filter::AnyOf(filters))
  }

  /// Append a sort term. Terms apply in call order.
  pub fn order(mut self, column: impl Into<String>, ascending: bool) -> Self {
    let direction = if ascending { "asc" } else { "desc" };
    self.order_by.push(format!("{}.{}", column.into(), direction));
    self
  }

  pub fn limit(mut self, n: u64) -> Self {
    self.limit = Some(n);
    self
  }

  pub fn offset(mut self, n: u64) -> Self {
    self.offset = Some(n);
    self
  }

  /// Unencoded `(name, value)` pairs in render order: select, filters,
  /// order, limit, offset. HTTP clients should encode these themselves.
  pub fn pairs(&self) -> Vec<(String, String)> {
    let mut pairs = Vec::new();

    if !self.selected.is_empty() {
      pairs.push(("select".to_string(), self.selected.join(",")));
    }
    pairs.extend(self.filters.iter().map(|(column, f)| f.render(column)));
    if !self.order_by.is_empty() {
      pairs.push(("order".to_string(), self.order_by.join(",")));
    }
    if let Some(limit) = self.limit {
      pairs.push(("limit".to_string(), limit.to_string()));
    }
    if let Some(offset) = self.offset {
      pairs.push(("offset".to_string(), offset.to_string()));
    }

    pairs
  }

  /// Query-string parameters as `name=value`, unencoded.
  pub fn params(&self) -> Vec<String> {
    self
      .pairs()
      .into_iter()
      .map(|(name, value)| format!("{}={}", name, value))
      .collect()
  }

  /// Render `resource?params`, or just the resource when nothing is set.
  pub fn build_endpoint(&self) -> String {
    let params = self.params();
    if params.is_empty() {
      self.resource.clone()
    } else {
      format!("{}?{}", self.resource, params.join("&"))
    }
  }

  /// Render the endpoint under `base_url`. Values are not percent-encoded;
  /// send requests from `pairs` instead.
  pub fn build_url(&self, base_url: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), self.build_endpoint())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_golden_rendering() {
    let url = QueryBuilder::new("listings")
      .select(["name"])
      .eq("category", "tools")
      .order("price", false)
      .limit(10)
      .offset(5)
      .build_url("https://gateway.test/rest/v1/");

    assert_eq!(
      url,
      "https://gateway.test/rest/v1/listings?select=name&category=eq.tools&order=price.desc&limit=10&offset=5"
    );
  }

  #[test]
  fn test_param_order_is_fixed() {
    // Call order differs from render order
    let endpoint = QueryBuilder::new("listings")
      .offset(40)
      .limit(20)
      .order("created_at", false)
      .gte("price", 5)
      .select("id")
      .build_endpoint();

    assert_eq!(
      endpoint,
      "listings?select=id&price=gte.5&order=created_at.desc&limit=20&offset=40"
    );
  }

  #[test]
  fn test_operator_encoding() {
    let params = QueryBuilder::new("listings")
      .neq("confidence_level", "low")
      .gt("stock", 0)
      .lt("price", 99.5)
      .lte("quantity", 64)
      .ilike("item_name", "*diamond*")
      .contains("tags", "{rare}")
      .in_list("biome", ["desert", "jungle"])
      .is_null("deleted_at")
      .is_not_null("last_verified_at")
      .params();

    assert_eq!(
      params,
      vec![
        "confidence_level=neq.low",
        "stock=gt.0",
        "price=lt.99.5",
        "quantity=lte.64",
        "item_name=ilike.*diamond*",
        "tags=cs.{rare}",
        "biome=in.(desert,jungle)",
        "deleted_at=is.null",
        "last_verified_at=not.is.null",
      ]
    );
  }

  #[test]
  fn test_last_write_wins_per_column() {
    let endpoint = QueryBuilder::new("listings")
      .eq("category", "tools")
      .eq("biome", "desert")
      .neq("category", "weapons")
      .build_endpoint();

    // Replaced predicate keeps its original position
    assert_eq!(endpoint, "listings?category=neq.weapons&biome=eq.desert");
  }

  #[test]
  fn test_select_replaces_previous_fields() {
    let endpoint = QueryBuilder::new("listings")
      .select(["id", "price"])
      .select("shop_name")
      .build_endpoint();

    assert_eq!(endpoint, "listings?select=shop_name");
  }

  #[test]
  fn test_multi_column_order() {
    let endpoint = QueryBuilder::new("listings")
      .order("category", true)
      .order("price", false)
      .build_endpoint();

    assert_eq!(endpoint, "listings?order=category.asc,price.desc");
  }

  #[test]
  fn test_between_renders_and_group() {
    let endpoint = QueryBuilder::new("listings").between("price", 10, 50).build_endpoint();

    assert_eq!(endpoint, "listings?and=(price.gte.10,price.lte.50)");
  }

  #[test]
  fn test_any_of_renders_or_group() {
    let endpoint = QueryBuilder::new("listings")
      .any_of("confidence_level", vec![Filter::Neq("low".into()), Filter::IsNull])
      .build_endpoint();

    assert_eq!(endpoint, "listings?or=(confidence_level.neq.low,confidence_level.is.null)");
  }

  #[test]
  fn test_any_of_nests_groups() {
    let params = QueryBuilder::new("listings")
      .any_of(
        "price",
        vec![
          Filter::Between {
            min: "1".into(),
            max: "5".into(),
          },
          Filter::In(vec!["10".into(), "20".into()]),
        ],
      )
      .params();

    assert_eq!(params, vec!["or=(and(price.gte.1,price.lte.5),price.in.(10,20))"]);
  }

  #[test]
  fn test_pairs_keep_values_unencoded() {
    let pairs = QueryBuilder::new("listings")
      .ilike("item_name", "*gold & iron*")
      .limit(20)
      .pairs();

    assert_eq!(
      pairs,
      vec![
        ("item_name".to_string(), "ilike.*gold & iron*".to_string()),
        ("limit".to_string(), "20".to_string()),
      ]
    );
  }

  #[test]
  fn test_no_implicit_pagination() {
    let builder = QueryBuilder::new("listings");

    assert!(builder.params().is_empty());
    assert_eq!(builder.build_endpoint(), "listings");
  }

  #[test]
  fn test_clone_is_independent() {
    let base = QueryBuilder::new("listings").eq("category", "blocks").order("price", true);

    let branched = base.clone().eq("category", "tools").order("name", true).limit(3);

    assert_eq!(base.build_endpoint(), "listings?category=eq.blocks&order=price.asc");
    assert_eq!(
      branched.build_endpoint(),
      "listings?category=eq.tools&order=price.asc,name.asc&limit=3"
    );
  }
}
