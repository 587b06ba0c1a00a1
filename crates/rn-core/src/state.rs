//! Navigator state and the snapshot returned to callers

use serde::Serialize;

use crate::query::{Filter, SortSpec};
use crate::row::Row;

/// Lifecycle phase of a navigator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NavigatorPhase {
    Idle,
    Loading,
    Error,
}

/// Mutable state owned by a navigator, guarded by its lock
#[derive(Debug)]
pub(crate) struct NavigatorState {
    pub filter: Filter,
    pub sort: Option<SortSpec>,
    /// Index of the most recently loaded page
    pub page: usize,
    pub page_size: usize,
    /// Known only after the first successful fetch
    pub total: Option<usize>,
    /// Rows visible to the caller (accumulated pages, or the filtered
    /// view of `master` in non-paged mode)
    pub rows: Vec<Row>,
    /// Full resident row set, non-paged mode only
    pub master: Vec<Row>,
    pub master_loaded: bool,
    pub phase: NavigatorPhase,
    pub error: Option<String>,
    /// Bumped whenever an issued fetch becomes stale; a completing fetch
    /// whose tag no longer matches is discarded
    pub generation: u64,
    /// Set by `delete`; retired navigators reject every operation
    pub retired: bool,
    /// CreateSource has been announced to handlers
    pub source_announced: bool,
    pub active_table: String,
}

impl NavigatorState {
    pub fn new(filter: Filter, sort: Option<SortSpec>, page_size: usize, table: String) -> Self {
        Self {
            filter,
            sort,
            page: 0,
            page_size,
            total: None,
            rows: Vec::new(),
            master: Vec::new(),
            master_loaded: false,
            phase: NavigatorPhase::Idle,
            error: None,
            generation: 0,
            retired: false,
            source_announced: false,
            active_table: table,
        }
    }

    /// Snapshot the current state for the caller
    pub fn snapshot(&self) -> NavigatorData {
        let total = self.total.unwrap_or(0);
        NavigatorData {
            rows: self.rows.clone(),
            total_rows: total,
            loaded_rows: self.rows.len(),
            page: self.page,
            page_count: if self.page_size > 0 {
                (total + self.page_size - 1) / self.page_size
            } else {
                0
            },
            state: self.phase,
            error: self.error.clone(),
        }
    }
}

/// Immutable view of a navigator handed back from every operation;
/// serializes to the wire shape the HTTP layer returns as JSON.
#[derive(Debug, Clone, Serialize)]
pub struct NavigatorData {
    pub rows: Vec<Row>,
    pub total_rows: usize,
    pub loaded_rows: usize,
    pub page: usize,
    pub page_count: usize,
    pub state: NavigatorPhase,
    pub error: Option<String>,
}
