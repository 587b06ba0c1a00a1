//! Core record-navigation functionality
//!
//! This crate provides the navigator abstraction used by the admin grids:
//! a named, filterable, sortable, paginated view over a tabular data source,
//! with lifecycle events delivered to caller-supplied handlers.

pub mod events;
pub mod navigator;
pub mod query;
pub mod registry;
pub mod row;
pub mod state;

#[cfg(test)]
pub(crate) mod test_support;

use thiserror::Error;

// Re-export commonly used types
pub use events::{CreateSource, EventHandlers, FillSource, NavigatorEvent, RowClick};
pub use navigator::{
    Appearance, NavigatorMode, NavigatorOptions, RecordNavigator, TableBinding,
};
pub use query::{Filter, PageRequest, SortDirection, SortSpec};
pub use registry::{NavigatorHandle, NavigatorRegistry, TableCatalog};
pub use row::Row;
pub use source::DataSource;
pub use state::{NavigatorData, NavigatorPhase};

/// Errors that can occur in navigator operations
#[derive(Error, Debug)]
pub enum NavigatorError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("data source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("row index {index} out of range (loaded rows: {loaded})")]
    IndexOutOfRange { index: usize, loaded: usize },

    #[error("navigator not found")]
    NotFound,

    #[error("operation attempted while a fetch is in flight")]
    Busy,
}

/// The contract the surrounding system implements to back a navigator.
pub mod source {
    use crate::query::{Filter, PageRequest};
    use crate::row::Row;

    /// Trait for tabular data sources
    ///
    /// Implementations own query execution, including any retry of
    /// transient failures; the navigator never retries on its own.
    #[async_trait::async_trait]
    pub trait DataSource: Send + Sync {
        /// Count the rows matching a filter
        async fn count(&self, filter: &Filter) -> anyhow::Result<usize>;

        /// Fetch one page of rows
        async fn fetch(&self, request: &PageRequest) -> anyhow::Result<Vec<Row>>;

        /// Get the source name (table or fixture label)
        fn source_name(&self) -> &str;
    }
}
