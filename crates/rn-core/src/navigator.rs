//! The record navigator
//!
//! A navigator mediates between a UI session and a data source: it owns the
//! current filter/sort/paging state and the rows fetched so far, and raises
//! lifecycle events to registered handlers. One logical caller per
//! navigator; an operation entered while a fetch is in flight fails with
//! [`NavigatorError::Busy`].

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::events::{CreateSource, EventHandlers, FillSource, NavigatorEvent, RowClick};
use crate::query::{Filter, PageRequest, SortDirection, SortSpec};
use crate::row::{default_compare, default_matches, CellCompare, Row, RowMatcher};
use crate::source::DataSource;
use crate::state::{NavigatorData, NavigatorPhase, NavigatorState};
use crate::NavigatorError;

/// Row-loading strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigatorMode {
    /// Fetch rows incrementally, page by page
    Paged,
    /// Hold the full row set resident; filter and sort in memory
    Full,
}

/// Presentation hints the UI layer reads off the navigator
#[derive(Debug, Clone)]
pub struct Appearance {
    pub caption: String,
    pub striped: bool,
    pub show_row_numbers: bool,
}

/// Callback invoked once at creation to adjust the appearance
pub type AppearanceFn = Box<dyn FnOnce(&mut Appearance) + Send>;

/// Creation options for a navigator
pub struct NavigatorOptions {
    pub caption: String,
    /// Whether `switch_table` may swap the active bound table
    pub switchable: bool,
    pub mode: NavigatorMode,
    pub page_size: usize,
    /// Initial filter
    pub filter: Filter,
    /// Initial sort
    pub sort: Option<SortSpec>,
    /// Cell comparator override; defaults to [`default_compare`]
    pub compare: Option<CellCompare>,
    /// Filter matcher override; defaults to [`default_matches`]
    pub matches: Option<RowMatcher>,
    pub configure_appearance: Option<AppearanceFn>,
}

impl Default for NavigatorOptions {
    fn default() -> Self {
        Self {
            caption: String::new(),
            switchable: false,
            mode: NavigatorMode::Paged,
            page_size: 50,
            filter: Filter::default(),
            sort: None,
            compare: None,
            matches: None,
            configure_appearance: None,
        }
    }
}

/// A table bound to a navigator, with the source that serves it
#[derive(Clone)]
pub struct TableBinding {
    pub table: String,
    pub source: Arc<dyn DataSource>,
}

impl TableBinding {
    pub fn new(table: impl Into<String>, source: Arc<dyn DataSource>) -> Self {
        Self {
            table: table.into(),
            source,
        }
    }
}

/// How a completed fetch is applied to the resident row set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ApplyMode {
    /// Jump-to-page: replace resident rows
    Replace,
    /// Load-more: append to resident rows
    Append,
    /// Non-paged: load the full set and project the visible view
    FullLoad,
}

/// Everything a fetch needs, snapshotted at issue time. The generation tag
/// lets a completing fetch detect that it has been superseded.
struct FetchTicket {
    generation: u64,
    table: String,
    request: PageRequest,
    apply: ApplyMode,
    page: usize,
    announce_source: bool,
}

/// A named, filterable, sortable, paginated view over a tabular source
pub struct RecordNavigator {
    caption: String,
    switchable: bool,
    mode: NavigatorMode,
    appearance: Appearance,
    bindings: Vec<TableBinding>,
    compare: CellCompare,
    matches: RowMatcher,
    handlers: EventHandlers,
    state: Mutex<NavigatorState>,
}

impl std::fmt::Debug for RecordNavigator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordNavigator")
            .field("caption", &self.caption)
            .field("switchable", &self.switchable)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl RecordNavigator {
    /// Create a navigator over the given table bindings
    pub fn new(
        bindings: Vec<TableBinding>,
        options: NavigatorOptions,
    ) -> Result<Self, NavigatorError> {
        if bindings.is_empty() {
            return Err(NavigatorError::Configuration(
                "a navigator requires at least one bound table".into(),
            ));
        }
        if options.page_size == 0 {
            return Err(NavigatorError::Configuration("page_size must be > 0".into()));
        }

        let mut appearance = Appearance {
            caption: options.caption.clone(),
            striped: true,
            show_row_numbers: false,
        };
        if let Some(configure) = options.configure_appearance {
            configure(&mut appearance);
        }

        let active_table = bindings[0].table.clone();
        Ok(Self {
            caption: options.caption,
            switchable: options.switchable,
            mode: options.mode,
            appearance,
            bindings,
            compare: options.compare.unwrap_or_else(|| Arc::new(default_compare)),
            matches: options.matches.unwrap_or_else(|| Arc::new(default_matches)),
            handlers: EventHandlers::new(),
            state: Mutex::new(NavigatorState::new(
                options.filter,
                options.sort,
                options.page_size,
                active_table,
            )),
        })
    }

    pub fn caption(&self) -> &str {
        &self.caption
    }

    pub fn appearance(&self) -> &Appearance {
        &self.appearance
    }

    pub fn mode(&self) -> NavigatorMode {
        self.mode
    }

    /// Event handler registration point
    pub fn handlers(&self) -> &EventHandlers {
        &self.handlers
    }

    /// The table currently being navigated
    pub fn active_table(&self) -> String {
        self.state.lock().active_table.clone()
    }

    /// Read-only snapshot of the current state
    pub fn snapshot(&self) -> Result<NavigatorData, NavigatorError> {
        let st = self.state.lock();
        if st.retired {
            return Err(NavigatorError::NotFound);
        }
        Ok(st.snapshot())
    }

    /// Store a new filter and rebuild the visible rows.
    ///
    /// Paged mode discards accumulated pages and refetches from page 0;
    /// non-paged mode re-applies the filter to the resident set without a
    /// source call. An empty filter clears filtering.
    pub async fn set_filter(
        &self,
        filter: impl Into<Filter>,
    ) -> Result<NavigatorData, NavigatorError> {
        let filter = filter.into();
        let ticket = {
            let mut st = self.state.lock();
            self.check_ready(&st)?;
            st.filter = filter;
            st.page = 0;
            match self.mode {
                NavigatorMode::Full if st.master_loaded => {
                    let projected = self.project(&st.master, &st.filter, st.sort.as_ref());
                    st.total = Some(projected.len());
                    st.rows = projected;
                    return Ok(st.snapshot());
                }
                NavigatorMode::Full => self.begin_full_load(&mut st),
                NavigatorMode::Paged => {
                    st.rows.clear();
                    st.total = None;
                    self.begin_page_fetch(&mut st, ApplyMode::Replace, 0)
                }
            }
        };
        self.run_fetch(ticket).await
    }

    /// Store a new sort and rebuild the visible rows.
    ///
    /// Non-paged mode re-sorts resident rows in place (stable, no source
    /// call); paged mode refetches from page 0.
    pub async fn set_sort(
        &self,
        column: impl Into<String>,
        direction: SortDirection,
    ) -> Result<NavigatorData, NavigatorError> {
        let sort = SortSpec {
            column: column.into(),
            direction,
        };
        let ticket = {
            let mut st = self.state.lock();
            self.check_ready(&st)?;
            st.sort = Some(sort.clone());
            match self.mode {
                NavigatorMode::Full if st.master_loaded => {
                    self.sort_rows(&mut st.rows, &sort);
                    return Ok(st.snapshot());
                }
                NavigatorMode::Full => self.begin_full_load(&mut st),
                NavigatorMode::Paged => {
                    st.page = 0;
                    st.rows.clear();
                    st.total = None;
                    self.begin_page_fetch(&mut st, ApplyMode::Replace, 0)
                }
            }
        };
        self.run_fetch(ticket).await
    }

    /// Fetch a specific page, replacing the resident rows
    pub async fn load_page(&self, page_index: usize) -> Result<NavigatorData, NavigatorError> {
        let ticket = {
            let mut st = self.state.lock();
            self.check_ready(&st)?;
            match self.mode {
                NavigatorMode::Full if st.master_loaded => {
                    // Everything is already resident
                    return Ok(st.snapshot());
                }
                NavigatorMode::Full => self.begin_full_load(&mut st),
                NavigatorMode::Paged => {
                    self.begin_page_fetch(&mut st, ApplyMode::Replace, page_index)
                }
            }
        };
        self.run_fetch(ticket).await
    }

    /// Fetch the next unloaded page, appending to the resident rows.
    ///
    /// Once every page is loaded this is a no-op returning the unchanged
    /// snapshot.
    pub async fn load_next_page(&self) -> Result<NavigatorData, NavigatorError> {
        let ticket = {
            let mut st = self.state.lock();
            self.check_ready(&st)?;
            if let Some(total) = st.total {
                if st.rows.len() >= total {
                    return Ok(st.snapshot());
                }
            }
            match self.mode {
                NavigatorMode::Full if st.master_loaded => return Ok(st.snapshot()),
                NavigatorMode::Full => self.begin_full_load(&mut st),
                NavigatorMode::Paged => {
                    let page = if st.rows.is_empty() { 0 } else { st.page + 1 };
                    self.begin_page_fetch(&mut st, ApplyMode::Append, page)
                }
            }
        };
        self.run_fetch(ticket).await
    }

    /// Validate the index, then dispatch a row-click event to every
    /// registered handler in registration order.
    pub fn handle_row_click(
        &self,
        row_index: usize,
        column: Option<&str>,
    ) -> Result<RowClick, NavigatorError> {
        let event = {
            let st = self.state.lock();
            if st.retired {
                return Err(NavigatorError::NotFound);
            }
            if row_index >= st.rows.len() {
                return Err(NavigatorError::IndexOutOfRange {
                    index: row_index,
                    loaded: st.rows.len(),
                });
            }
            RowClick {
                row_index,
                column: column.map(str::to_owned),
                row: st.rows[row_index].clone(),
            }
        };
        self.handlers
            .dispatch(&NavigatorEvent::RowClick(event.clone()));
        Ok(event)
    }

    /// Discard resident rows and counts; filter and sort are kept.
    ///
    /// Clearing while a fetch is in flight cancels it: the eventual result
    /// is discarded on arrival.
    pub fn clear(&self) -> Result<NavigatorData, NavigatorError> {
        let mut st = self.state.lock();
        if st.retired {
            return Err(NavigatorError::NotFound);
        }
        st.generation += 1;
        st.rows.clear();
        st.master.clear();
        st.master_loaded = false;
        st.total = None;
        st.page = 0;
        st.phase = NavigatorPhase::Idle;
        st.error = None;
        Ok(st.snapshot())
    }

    /// Swap the active bound table and reload from scratch
    pub async fn switch_table(
        &self,
        table: impl AsRef<str>,
    ) -> Result<NavigatorData, NavigatorError> {
        let table = table.as_ref();
        if !self.switchable {
            return Err(NavigatorError::Configuration(format!(
                "navigator '{}' is not switchable",
                self.caption
            )));
        }
        if !self.bindings.iter().any(|b| b.table == table) {
            return Err(NavigatorError::Configuration(format!(
                "table '{table}' is not bound to this navigator"
            )));
        }
        let ticket = {
            let mut st = self.state.lock();
            self.check_ready(&st)?;
            st.active_table = table.to_owned();
            st.rows.clear();
            st.master.clear();
            st.master_loaded = false;
            st.total = None;
            st.page = 0;
            st.source_announced = false;
            match self.mode {
                NavigatorMode::Full => self.begin_full_load(&mut st),
                NavigatorMode::Paged => {
                    self.begin_page_fetch(&mut st, ApplyMode::Replace, 0)
                }
            }
        };
        self.run_fetch(ticket).await
    }

    /// Mark this navigator deleted; every later operation fails with
    /// `NotFound` and an in-flight fetch result is discarded.
    pub(crate) fn retire(&self) {
        let mut st = self.state.lock();
        st.retired = true;
        st.generation += 1;
    }

    fn check_ready(&self, st: &NavigatorState) -> Result<(), NavigatorError> {
        if st.retired {
            return Err(NavigatorError::NotFound);
        }
        if st.phase == NavigatorPhase::Loading {
            return Err(NavigatorError::Busy);
        }
        Ok(())
    }

    fn begin_page_fetch(
        &self,
        st: &mut NavigatorState,
        apply: ApplyMode,
        page: usize,
    ) -> FetchTicket {
        let offset = match apply {
            ApplyMode::Append => st.rows.len(),
            _ => page * st.page_size,
        };
        let request = PageRequest {
            offset,
            limit: st.page_size,
            filter: st.filter.clone(),
            sort: st.sort.clone(),
        };
        self.begin_fetch(st, apply, request, page)
    }

    fn begin_full_load(&self, st: &mut NavigatorState) -> FetchTicket {
        st.rows.clear();
        st.master.clear();
        st.master_loaded = false;
        st.total = None;
        // The master set is fetched unfiltered; filter and sort are applied
        // in memory when the view is projected.
        let request = PageRequest {
            offset: 0,
            limit: usize::MAX,
            filter: Filter::default(),
            sort: None,
        };
        self.begin_fetch(st, ApplyMode::FullLoad, request, 0)
    }

    fn begin_fetch(
        &self,
        st: &mut NavigatorState,
        apply: ApplyMode,
        request: PageRequest,
        page: usize,
    ) -> FetchTicket {
        st.generation += 1;
        st.phase = NavigatorPhase::Loading;
        let announce_source = !st.source_announced;
        st.source_announced = true;
        FetchTicket {
            generation: st.generation,
            table: st.active_table.clone(),
            request,
            apply,
            page,
            announce_source,
        }
    }

    /// Run a fetch against the source and apply the outcome, unless the
    /// ticket has been superseded in the meantime.
    async fn run_fetch(&self, ticket: FetchTicket) -> Result<NavigatorData, NavigatorError> {
        if ticket.announce_source {
            self.handlers
                .dispatch(&NavigatorEvent::CreateSource(CreateSource {
                    table: ticket.table.clone(),
                    caption: self.caption.clone(),
                }));
        }
        self.handlers
            .dispatch(&NavigatorEvent::FillSource(FillSource {
                table: ticket.table.clone(),
                request: ticket.request.clone(),
            }));

        let source = self.source_for(&ticket.table)?;
        let outcome = self.execute(source.as_ref(), &ticket).await;

        let mut st = self.state.lock();
        if st.retired {
            debug!(table = %ticket.table, "discarding fetch result for deleted navigator");
            return Err(NavigatorError::NotFound);
        }
        if st.generation != ticket.generation {
            debug!(table = %ticket.table, "discarding superseded fetch result");
            return Ok(st.snapshot());
        }
        match outcome {
            Ok((counted, rows)) => {
                match ticket.apply {
                    ApplyMode::Replace => st.rows = rows,
                    ApplyMode::Append => st.rows.extend(rows),
                    ApplyMode::FullLoad => {
                        st.master = rows;
                        st.master_loaded = true;
                        let projected = self.project(&st.master, &st.filter, st.sort.as_ref());
                        st.rows = projected;
                    }
                }
                let total = match ticket.apply {
                    ApplyMode::FullLoad => st.rows.len(),
                    _ => counted,
                };
                if st.rows.len() > total {
                    warn!(
                        loaded = st.rows.len(),
                        total, "source returned more rows than it counted; truncating"
                    );
                    st.rows.truncate(total);
                }
                st.total = Some(total);
                st.page = ticket.page;
                st.phase = NavigatorPhase::Idle;
                st.error = None;
            }
            Err(e) => {
                warn!(table = %ticket.table, error = %e, "data source fetch failed");
                st.phase = NavigatorPhase::Error;
                st.error = Some(e.to_string());
            }
        }
        Ok(st.snapshot())
    }

    async fn execute(
        &self,
        source: &dyn DataSource,
        ticket: &FetchTicket,
    ) -> anyhow::Result<(usize, Vec<Row>)> {
        let counted = source.count(&ticket.request.filter).await?;
        let request = match ticket.apply {
            // Full load fetches exactly the counted rows
            ApplyMode::FullLoad => PageRequest {
                limit: counted,
                ..ticket.request.clone()
            },
            _ => ticket.request.clone(),
        };
        let rows = source.fetch(&request).await?;
        Ok((counted, rows))
    }

    fn source_for(&self, table: &str) -> Result<Arc<dyn DataSource>, NavigatorError> {
        self.bindings
            .iter()
            .find(|b| b.table == table)
            .map(|b| b.source.clone())
            .ok_or_else(|| {
                NavigatorError::Configuration(format!("no source bound for table '{table}'"))
            })
    }

    fn project(&self, master: &[Row], filter: &Filter, sort: Option<&SortSpec>) -> Vec<Row> {
        let mut rows: Vec<Row> = master
            .iter()
            .filter(|row| (self.matches)(row, filter))
            .cloned()
            .collect();
        if let Some(sort) = sort {
            self.sort_rows(&mut rows, sort);
        }
        rows
    }

    fn sort_rows(&self, rows: &mut [Row], sort: &SortSpec) {
        // sort_by is stable: ties keep their prior relative order
        rows.sort_by(|a, b| {
            let av = a.get(&sort.column).unwrap_or(&Value::Null);
            let bv = b.get(&sort.column).unwrap_or(&Value::Null);
            let ordering = (self.compare)(av, bv);
            match sort.direction {
                SortDirection::Ascending => ordering,
                SortDirection::Descending => ordering.reverse(),
            }
        });
    }
}
