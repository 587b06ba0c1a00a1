//! Handle-addressed navigator registry
//!
//! The registry owns the live navigators of a session and resolves logical
//! table names through an injected catalog. Handles are opaque uuids; every
//! operation on an unknown or deleted handle fails with `NotFound`.

use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::RwLock;
use tracing::debug;

use crate::events::RowClick;
use crate::navigator::{NavigatorOptions, RecordNavigator, TableBinding};
use crate::query::{Filter, SortDirection};
use crate::state::NavigatorData;
use crate::NavigatorError;

/// Opaque navigator identity
pub type NavigatorHandle = uuid::Uuid;

/// Injected logical-to-physical table name lookup.
///
/// Names without an entry pass through unchanged.
#[derive(Debug, Clone, Default)]
pub struct TableCatalog {
    entries: AHashMap<String, String>,
}

impl TableCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, logical: impl Into<String>, physical: impl Into<String>) {
        self.entries.insert(logical.into(), physical.into());
    }

    pub fn resolve(&self, name: &str) -> String {
        self.entries
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_owned())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for TableCatalog {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Registry of live navigators, keyed by handle
pub struct NavigatorRegistry {
    catalog: TableCatalog,
    navigators: RwLock<AHashMap<NavigatorHandle, Arc<RecordNavigator>>>,
}

impl NavigatorRegistry {
    pub fn new(catalog: TableCatalog) -> Self {
        Self {
            catalog,
            navigators: RwLock::new(AHashMap::new()),
        }
    }

    /// Register a new navigator over the given bindings; logical table
    /// names are resolved through the catalog.
    pub fn create(
        &self,
        bindings: Vec<TableBinding>,
        options: NavigatorOptions,
    ) -> Result<NavigatorHandle, NavigatorError> {
        let bindings = bindings
            .into_iter()
            .map(|b| TableBinding {
                table: self.catalog.resolve(&b.table),
                source: b.source,
            })
            .collect();
        let navigator = RecordNavigator::new(bindings, options)?;
        let handle = uuid::Uuid::new_v4();
        self.navigators
            .write()
            .insert(handle, Arc::new(navigator));
        debug!(%handle, "navigator registered");
        Ok(handle)
    }

    /// Deregister a navigator. An in-flight fetch for it is discarded when
    /// it completes.
    pub fn delete(&self, handle: NavigatorHandle) -> Result<(), NavigatorError> {
        let navigator = self
            .navigators
            .write()
            .remove(&handle)
            .ok_or(NavigatorError::NotFound)?;
        navigator.retire();
        debug!(%handle, "navigator deleted");
        Ok(())
    }

    pub fn get(&self, handle: NavigatorHandle) -> Result<Arc<RecordNavigator>, NavigatorError> {
        self.navigators
            .read()
            .get(&handle)
            .cloned()
            .ok_or(NavigatorError::NotFound)
    }

    pub fn len(&self) -> usize {
        self.navigators.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.navigators.read().is_empty()
    }

    // Handle-addressed convenience operations, thin wrappers over
    // RecordNavigator for HTTP-layer callers.

    pub async fn set_filter(
        &self,
        handle: NavigatorHandle,
        filter: impl Into<Filter>,
    ) -> Result<NavigatorData, NavigatorError> {
        self.get(handle)?.set_filter(filter).await
    }

    pub async fn set_sort(
        &self,
        handle: NavigatorHandle,
        column: impl Into<String>,
        direction: SortDirection,
    ) -> Result<NavigatorData, NavigatorError> {
        self.get(handle)?.set_sort(column, direction).await
    }

    pub async fn load_page(
        &self,
        handle: NavigatorHandle,
        page_index: usize,
    ) -> Result<NavigatorData, NavigatorError> {
        self.get(handle)?.load_page(page_index).await
    }

    pub async fn load_next_page(
        &self,
        handle: NavigatorHandle,
    ) -> Result<NavigatorData, NavigatorError> {
        self.get(handle)?.load_next_page().await
    }

    pub async fn switch_table(
        &self,
        handle: NavigatorHandle,
        table: impl AsRef<str>,
    ) -> Result<NavigatorData, NavigatorError> {
        self.get(handle)?.switch_table(table).await
    }

    pub fn clear(&self, handle: NavigatorHandle) -> Result<NavigatorData, NavigatorError> {
        self.get(handle)?.clear()
    }

    pub fn handle_row_click(
        &self,
        handle: NavigatorHandle,
        row_index: usize,
        column: Option<&str>,
    ) -> Result<RowClick, NavigatorError> {
        self.get(handle)?.handle_row_click(row_index, column)
    }

    pub fn snapshot(&self, handle: NavigatorHandle) -> Result<NavigatorData, NavigatorError> {
        self.get(handle)?.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::NavigatorPhase;
    use crate::test_support::MockSource;
    use tokio::sync::Semaphore;

    fn registry() -> NavigatorRegistry {
        NavigatorRegistry::new(TableCatalog::new())
    }

    #[test]
    fn create_rejects_an_empty_table_set() {
        let err = registry()
            .create(Vec::new(), NavigatorOptions::default())
            .unwrap_err();
        assert!(matches!(err, NavigatorError::Configuration(_)));
    }

    #[test]
    fn catalog_normalizes_logical_table_names() {
        let catalog: TableCatalog =
            [("PriceList", "tbl_pricelist"), ("Users", "tbl_users")]
                .into_iter()
                .collect();
        let registry = NavigatorRegistry::new(catalog);
        let source = MockSource::with_names(&["A"]);
        let handle = registry
            .create(
                vec![TableBinding::new("PriceList", source)],
                NavigatorOptions::default(),
            )
            .unwrap();
        assert_eq!(registry.get(handle).unwrap().active_table(), "tbl_pricelist");
    }

    #[tokio::test]
    async fn operations_on_unknown_handles_fail_not_found() {
        let registry = registry();
        let handle = uuid::Uuid::new_v4();
        assert!(matches!(
            registry.load_next_page(handle).await.unwrap_err(),
            NavigatorError::NotFound
        ));
        assert!(matches!(
            registry.clear(handle).unwrap_err(),
            NavigatorError::NotFound
        ));
        assert!(matches!(
            registry.delete(handle).unwrap_err(),
            NavigatorError::NotFound
        ));
    }

    #[tokio::test]
    async fn delete_retires_the_handle() {
        let registry = registry();
        let source = MockSource::with_names(&["A", "B"]);
        let handle = registry
            .create(
                vec![TableBinding::new("t", source)],
                NavigatorOptions::default(),
            )
            .unwrap();
        registry.load_page(handle, 0).await.unwrap();
        registry.delete(handle).unwrap();
        assert!(matches!(
            registry.load_page(handle, 0).await.unwrap_err(),
            NavigatorError::NotFound
        ));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn delete_during_a_fetch_discards_the_result() {
        let registry = Arc::new(registry());
        let gate = Arc::new(Semaphore::new(0));
        let source = MockSource::gated(MockSource::name_rows(&["A", "B"]), gate.clone());
        let handle = registry
            .create(
                vec![TableBinding::new("t", source)],
                NavigatorOptions::default(),
            )
            .unwrap();

        // Keep a reference alive across the delete, as an in-flight fetch does
        let navigator = registry.get(handle).unwrap();
        let worker = {
            let navigator = navigator.clone();
            tokio::spawn(async move { navigator.load_page(0).await })
        };
        while navigator.snapshot().unwrap().state != NavigatorPhase::Loading {
            tokio::task::yield_now().await;
        }

        registry.delete(handle).unwrap();
        gate.add_permits(1);

        assert!(matches!(
            worker.await.unwrap().unwrap_err(),
            NavigatorError::NotFound
        ));
    }
}
