//! In-memory data source
//!
//! Holds its rows resident and evaluates filter, sort, and paging with the
//! same default matcher and comparator the navigator uses. Intended for
//! fixtures, small lookup tables, and non-paged navigators.

use parking_lot::RwLock;
use serde_json::Value;

use rn_core::query::{Filter, PageRequest, SortDirection};
use rn_core::row::{default_compare, default_matches, Row};
use rn_core::source::DataSource;

pub struct MemorySource {
    name: String,
    rows: RwLock<Vec<Row>>,
}

impl MemorySource {
    pub fn new(name: impl Into<String>, rows: Vec<Row>) -> Self {
        Self {
            name: name.into(),
            rows: RwLock::new(rows),
        }
    }

    /// Swap the resident rows, e.g. after a fixture reload
    pub fn replace_rows(&self, rows: Vec<Row>) {
        *self.rows.write() = rows;
    }

    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }

    fn matching(&self, filter: &Filter) -> Vec<Row> {
        self.rows
            .read()
            .iter()
            .filter(|row| default_matches(row, filter))
            .cloned()
            .collect()
    }
}

#[async_trait::async_trait]
impl DataSource for MemorySource {
    async fn count(&self, filter: &Filter) -> anyhow::Result<usize> {
        Ok(self.matching(filter).len())
    }

    async fn fetch(&self, request: &PageRequest) -> anyhow::Result<Vec<Row>> {
        let mut rows = self.matching(&request.filter);
        if let Some(sort) = &request.sort {
            rows.sort_by(|a, b| {
                let av = a.get(&sort.column).unwrap_or(&Value::Null);
                let bv = b.get(&sort.column).unwrap_or(&Value::Null);
                let ordering = default_compare(av, bv);
                match sort.direction {
                    SortDirection::Ascending => ordering,
                    SortDirection::Descending => ordering.reverse(),
                }
            });
        }
        let start = request.offset.min(rows.len());
        let end = request.offset.saturating_add(request.limit).min(rows.len());
        Ok(rows[start..end].to_vec())
    }

    fn source_name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rn_core::query::SortSpec;
    use rn_core::row::row_from_pairs;
    use serde_json::json;

    fn source() -> MemorySource {
        MemorySource::new(
            "items",
            vec![
                row_from_pairs([("id", json!(1)), ("name", json!("Walker"))]),
                row_from_pairs([("id", json!(2)), ("name", json!("Wheelchair"))]),
                row_from_pairs([("id", json!(3)), ("name", json!("Cane"))]),
                row_from_pairs([("id", json!(4)), ("name", json!("Walker Deluxe"))]),
            ],
        )
    }

    #[tokio::test]
    async fn count_honors_the_filter() {
        let source = source();
        assert_eq!(source.count(&Filter::default()).await.unwrap(), 4);
        assert_eq!(source.count(&Filter::new("walker")).await.unwrap(), 2);
        assert_eq!(source.count(&Filter::new("missing")).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn fetch_applies_filter_sort_and_paging() {
        let source = source();
        let rows = source
            .fetch(&PageRequest {
                offset: 1,
                limit: 2,
                filter: Filter::default(),
                sort: Some(SortSpec::ascending("name")),
            })
            .await
            .unwrap();
        let names: Vec<_> = rows.iter().map(|r| r["name"].as_str().unwrap()).collect();
        assert_eq!(names, ["Walker", "Walker Deluxe"]);
    }

    #[tokio::test]
    async fn fetch_past_the_end_returns_empty() {
        let source = source();
        let rows = source
            .fetch(&PageRequest {
                offset: 10,
                limit: 5,
                filter: Filter::default(),
                sort: None,
            })
            .await
            .unwrap();
        assert!(rows.is_empty());
    }
}
