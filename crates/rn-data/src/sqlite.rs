//! SQLite data source implementation
//!
//! One table per source. The column set is probed once at construction and
//! used to validate filter scoping and sort columns; identifiers are always
//! quoted. The free-text filter becomes a `LIKE` predicate over the scoped
//! columns (all of them by default), which is case-insensitive for ASCII in
//! SQLite.

use std::path::Path;

use parking_lot::Mutex;
use rusqlite::{types::ValueRef, Connection};
use serde_json::Value;
use tracing::debug;

use rn_core::query::{Filter, PageRequest, SortDirection, SortSpec};
use rn_core::row::Row;
use rn_core::source::DataSource;

use crate::DataError;

#[derive(Debug)]
pub struct SqliteSource {
    conn: Mutex<Connection>,
    table: String,
    columns: Vec<String>,
}

impl SqliteSource {
    /// Open a database file and bind to one of its tables
    pub fn open<P: AsRef<Path>>(path: P, table: impl Into<String>) -> Result<Self, DataError> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn, table)
    }

    /// Bind to a table over an existing connection
    pub fn with_connection(conn: Connection, table: impl Into<String>) -> Result<Self, DataError> {
        let table = table.into();
        let columns = Self::probe_columns(&conn, &table)?;
        if columns.is_empty() {
            return Err(DataError::EmptyTable(table));
        }
        Ok(Self {
            conn: Mutex::new(conn),
            table,
            columns,
        })
    }

    /// Column names probed at construction
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    fn probe_columns(conn: &Connection, table: &str) -> Result<Vec<String>, DataError> {
        let sql = format!("PRAGMA table_info({})", quote_ident(table));
        let mut stmt = conn.prepare(&sql)?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }

    /// Build the WHERE clause and its single LIKE parameter
    fn filter_clause(&self, filter: &Filter) -> Result<(String, Option<String>), DataError> {
        if filter.is_empty() {
            return Ok((String::new(), None));
        }
        let columns: Vec<&String> = if filter.columns.is_empty() {
            self.columns.iter().collect()
        } else {
            for column in &filter.columns {
                if !self.columns.contains(column) {
                    return Err(DataError::UnknownColumn(column.clone()));
                }
            }
            filter.columns.iter().collect()
        };
        let predicates: Vec<String> = columns
            .iter()
            .map(|column| {
                format!("CAST({} AS TEXT) LIKE ?1 ESCAPE '\\'", quote_ident(column))
            })
            .collect();
        let pattern = format!("%{}%", escape_like(&filter.text));
        Ok((format!("WHERE ({})", predicates.join(" OR ")), Some(pattern)))
    }

    fn order_clause(&self, sort: &SortSpec) -> Result<String, DataError> {
        if !self.columns.contains(&sort.column) {
            return Err(DataError::UnknownColumn(sort.column.clone()));
        }
        let direction = match sort.direction {
            SortDirection::Ascending => "ASC",
            SortDirection::Descending => "DESC",
        };
        Ok(format!("ORDER BY {} {}", quote_ident(&sort.column), direction))
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn escape_like(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn value_from_sql(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(s) => Value::String(String::from_utf8_lossy(s).into_owned()),
        // Blobs are not navigated
        ValueRef::Blob(_) => Value::Null,
    }
}

#[async_trait::async_trait]
impl DataSource for SqliteSource {
    async fn count(&self, filter: &Filter) -> anyhow::Result<usize> {
        let (where_sql, pattern) = self.filter_clause(filter)?;
        let sql = format!(
            "SELECT COUNT(*) FROM {} {}",
            quote_ident(&self.table),
            where_sql
        );
        let conn = self.conn.lock();
        let count: i64 = match &pattern {
            Some(p) => conn.query_row(&sql, [p], |row| row.get(0)),
            None => conn.query_row(&sql, [], |row| row.get(0)),
        }
        .map_err(DataError::from)?;
        Ok(count as usize)
    }

    async fn fetch(&self, request: &PageRequest) -> anyhow::Result<Vec<Row>> {
        let (where_sql, pattern) = self.filter_clause(&request.filter)?;
        let order_sql = match &request.sort {
            Some(sort) => self.order_clause(sort)?,
            None => String::new(),
        };
        let limit = i64::try_from(request.limit).unwrap_or(i64::MAX);
        let offset = i64::try_from(request.offset).unwrap_or(i64::MAX);
        let sql = format!(
            "SELECT * FROM {} {} {} LIMIT {} OFFSET {}",
            quote_ident(&self.table),
            where_sql,
            order_sql,
            limit,
            offset
        );
        debug!(%sql, "executing fetch");

        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&sql).map_err(DataError::from)?;
        let column_names: Vec<String> = stmt
            .column_names()
            .iter()
            .map(|name| name.to_string())
            .collect();
        let mut sql_rows = match &pattern {
            Some(p) => stmt.query([p]),
            None => stmt.query([]),
        }
        .map_err(DataError::from)?;

        let mut rows = Vec::new();
        while let Some(sql_row) = sql_rows.next().map_err(DataError::from)? {
            let mut row = Row::new();
            for (idx, name) in column_names.iter().enumerate() {
                let value = sql_row.get_ref(idx).map_err(DataError::from)?;
                row.insert(name.clone(), value_from_sql(value));
            }
            rows.push(row);
        }
        Ok(rows)
    }

    fn source_name(&self) -> &str {
        &self.table
    }
}
