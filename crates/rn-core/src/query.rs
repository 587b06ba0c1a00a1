use serde::{Deserialize, Serialize};

/// Free-text row predicate, optionally scoped to specific columns
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    /// Case-insensitive substring to look for; empty means "match all"
    pub text: String,
    /// Columns to search; empty means every column
    pub columns: Vec<String>,
}

impl Filter {
    /// Create a filter over all columns
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            columns: Vec::new(),
        }
    }

    /// Create a filter scoped to the given columns
    pub fn scoped(text: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            text: text.into(),
            columns,
        }
    }

    /// Whether this filter matches everything
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

impl From<&str> for Filter {
    fn from(text: &str) -> Self {
        Filter::new(text)
    }
}

impl From<String> for Filter {
    fn from(text: String) -> Self {
        Filter::new(text)
    }
}

/// Sort direction for a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// Sort specification: column plus direction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortSpec {
    pub column: String,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn ascending(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Ascending,
        }
    }

    pub fn descending(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Descending,
        }
    }
}

/// The contract handed to a data source on each fetch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRequest {
    /// Index of the first row to return
    pub offset: usize,
    /// Maximum number of rows to return
    pub limit: usize,
    /// Filter active when the fetch was issued
    pub filter: Filter,
    /// Sort active when the fetch was issued
    pub sort: Option<SortSpec>,
}
