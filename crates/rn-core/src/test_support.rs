//! In-memory mock source with call counters, shared by unit tests

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::json;
use tokio::sync::Semaphore;

use crate::query::{Filter, PageRequest, SortDirection};
use crate::row::{default_compare, default_matches, row_from_pairs, Row};
use crate::source::DataSource;

pub(crate) struct MockSource {
    rows: Vec<Row>,
    pub counts: AtomicUsize,
    pub fetches: AtomicUsize,
    pub fail: AtomicBool,
    gate: Option<Arc<Semaphore>>,
}

impl MockSource {
    pub fn new(rows: Vec<Row>) -> Arc<Self> {
        Arc::new(Self {
            rows,
            counts: AtomicUsize::new(0),
            fetches: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
            gate: None,
        })
    }

    /// Fetches block until a permit is added to `gate`
    pub fn gated(rows: Vec<Row>, gate: Arc<Semaphore>) -> Arc<Self> {
        Arc::new(Self {
            rows,
            counts: AtomicUsize::new(0),
            fetches: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
            gate: Some(gate),
        })
    }

    pub fn with_names(names: &[&str]) -> Arc<Self> {
        Self::new(Self::name_rows(names))
    }

    /// Rows shaped `{ id, name }`, ids assigned in order
    pub fn name_rows(names: &[&str]) -> Vec<Row> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| row_from_pairs([("id", json!(i + 1)), ("name", json!(name))]))
            .collect()
    }

    fn matching(&self, filter: &Filter) -> Vec<Row> {
        self.rows
            .iter()
            .filter(|row| default_matches(row, filter))
            .cloned()
            .collect()
    }
}

#[async_trait::async_trait]
impl DataSource for MockSource {
    async fn count(&self, filter: &Filter) -> anyhow::Result<usize> {
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("mock source is down");
        }
        self.counts.fetch_add(1, Ordering::SeqCst);
        Ok(self.matching(filter).len())
    }

    async fn fetch(&self, request: &PageRequest) -> anyhow::Result<Vec<Row>> {
        if let Some(gate) = &self.gate {
            let permit = gate.acquire().await?;
            permit.forget();
        }
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("mock source is down");
        }
        self.fetches.fetch_add(1, Ordering::SeqCst);

        let mut rows = self.matching(&request.filter);
        if let Some(sort) = &request.sort {
            rows.sort_by(|a, b| {
                let av = a.get(&sort.column).unwrap_or(&serde_json::Value::Null);
                let bv = b.get(&sort.column).unwrap_or(&serde_json::Value::Null);
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
        "mock"
    }
}
