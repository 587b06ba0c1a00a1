//! Navigator lifecycle events and handler dispatch
//!
//! Events are a tagged enum delivered synchronously to every registered
//! handler in registration order. A failing handler is logged and skipped;
//! it never aborts the remaining handlers or the operation that raised the
//! event.

use parking_lot::RwLock;

use crate::query::PageRequest;
use crate::row::Row;

/// The underlying source view was (re)created for a table
#[derive(Debug, Clone)]
pub struct CreateSource {
    pub table: String,
    pub caption: String,
}

/// A fetch against the data source is about to run
#[derive(Debug, Clone)]
pub struct FillSource {
    pub table: String,
    pub request: PageRequest,
}

/// A loaded row was clicked
#[derive(Debug, Clone)]
pub struct RowClick {
    pub row_index: usize,
    pub column: Option<String>,
    pub row: Row,
}

/// Lifecycle events raised by a navigator
#[derive(Debug, Clone)]
pub enum NavigatorEvent {
    CreateSource(CreateSource),
    FillSource(FillSource),
    RowClick(RowClick),
}

type Handler = Box<dyn Fn(&NavigatorEvent) -> anyhow::Result<()> + Send + Sync>;

struct NamedHandler {
    name: String,
    handler: Handler,
}

/// Ordered handler list with per-handler failure isolation
#[derive(Default)]
pub struct EventHandlers {
    handlers: RwLock<Vec<NamedHandler>>,
}

impl EventHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler; `name` identifies it in logs
    pub fn register<F>(&self, name: impl Into<String>, handler: F)
    where
        F: Fn(&NavigatorEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.handlers.write().push(NamedHandler {
            name: name.into(),
            handler: Box::new(handler),
        });
    }

    /// Deliver an event to every handler, in registration order
    pub fn dispatch(&self, event: &NavigatorEvent) {
        let handlers = self.handlers.read();
        for named in handlers.iter() {
            if let Err(e) = (named.handler)(event) {
                tracing::error!(handler = %named.name, error = %e, "event handler failed");
            }
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.read().is_empty()
    }
}
