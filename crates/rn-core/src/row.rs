//! Schema-less row values and the default matcher/comparator
//!
//! The navigator never interprets cell contents itself; it applies the
//! comparator and matcher configured at creation, which default to the
//! functions below.

use std::cmp::Ordering;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use crate::query::Filter;

/// An opaque, column-ordered mapping from column name to value
pub type Row = IndexMap<String, Value>;

/// Comparator applied to two cells of the sort column
pub type CellCompare = Arc<dyn Fn(&Value, &Value) -> Ordering + Send + Sync>;

/// Predicate deciding whether a row matches a filter
pub type RowMatcher = Arc<dyn Fn(&Row, &Filter) -> bool + Send + Sync>;

/// Render a cell as text for filter matching
pub fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Default filter matcher: case-insensitive substring over the scoped
/// columns, or over every column when no scope is given.
pub fn default_matches(row: &Row, filter: &Filter) -> bool {
    if filter.is_empty() {
        return true;
    }
    let needle = filter.text.to_lowercase();
    let mut cells = row.iter().filter(|(name, _)| {
        filter.columns.is_empty() || filter.columns.iter().any(|c| c == *name)
    });
    cells.any(|(_, value)| cell_text(value).to_lowercase().contains(&needle))
}

/// Default cell comparator: nulls first, then booleans, numbers, strings;
/// arrays and objects compare by their JSON rendering.
pub fn default_compare(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) | Value::Object(_) => 4,
        }
    }
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(f64::NAN), y.as_f64().unwrap_or(f64::NAN));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ if rank(a) != rank(b) => rank(a).cmp(&rank(b)),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

/// Build a row from (column, value) pairs
pub fn row_from_pairs<I, K>(pairs: I) -> Row
where
    I: IntoIterator<Item = (K, Value)>,
    K: Into<String>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Row {
        row_from_pairs([
            ("name", json!("Walker Basic")),
            ("price", json!(129.95)),
            ("active", json!(true)),
        ])
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert!(default_matches(&sample(), &Filter::default()));
    }

    #[test]
    fn filter_is_case_insensitive_and_scans_all_columns() {
        assert!(default_matches(&sample(), &Filter::new("WALKER")));
        assert!(default_matches(&sample(), &Filter::new("129.95")));
        assert!(!default_matches(&sample(), &Filter::new("wheelchair")));
    }

    #[test]
    fn scoped_filter_ignores_other_columns() {
        let filter = Filter::scoped("walker", vec!["price".into()]);
        assert!(!default_matches(&sample(), &filter));
        let filter = Filter::scoped("walker", vec!["name".into()]);
        assert!(default_matches(&sample(), &filter));
    }

    #[test]
    fn compare_orders_nulls_before_values() {
        assert_eq!(default_compare(&json!(null), &json!(1)), Ordering::Less);
        assert_eq!(default_compare(&json!(2), &json!(10)), Ordering::Less);
        assert_eq!(default_compare(&json!("a"), &json!("b")), Ordering::Less);
    }
}
