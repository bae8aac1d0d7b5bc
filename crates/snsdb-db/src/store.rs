//! The table-oriented persistence collaborator.
//!
//! Rows travel as JSON objects so the same merge rules run against PostgREST,
//! a direct Postgres pool, or the in-memory store used by tests.

use std::collections::BTreeSet;
use std::future::Future;

use serde_json::{Map, Value};

use crate::memory::MemoryStore;
use crate::pg::PgStore;
use crate::rest::RestStore;
use crate::DbError;

pub type Row = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// Column text equals the value.
    Eq(String, String),
    /// Column text contains the value, case-insensitively.
    Contains(String, String),
}

/// A single-table read: projection, conjunctive filters, ordering and limit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pub columns: Vec<String>,
    pub filters: Vec<Filter>,
    pub order_desc: Option<String>,
    pub limit: Option<usize>,
}

impl Query {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn select(mut self, columns: &[&str]) -> Self {
        self.columns = columns.iter().map(|c| (*c).to_string()).collect();
        self
    }

    #[must_use]
    pub fn eq(mut self, column: &str, value: impl ToString) -> Self {
        self.filters
            .push(Filter::Eq(column.to_string(), value.to_string()));
        self
    }

    #[must_use]
    pub fn contains(mut self, column: &str, value: &str) -> Self {
        self.filters
            .push(Filter::Contains(column.to_string(), value.to_string()));
        self
    }

    #[must_use]
    pub fn order_desc(mut self, column: &str) -> Self {
        self.order_desc = Some(column.to_string());
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Keep only the selected columns of `row` (all of them when no
    /// projection was requested).
    #[must_use]
    pub fn project(&self, row: Row) -> Row {
        if self.columns.is_empty() {
            return row;
        }
        row.into_iter()
            .filter(|(k, _)| self.columns.iter().any(|c| c == k))
            .collect()
    }
}

/// Text form of a JSON value as a filter would compare it.
/// The map inside a JSON object; anything else becomes an empty row.
pub(crate) fn into_row(value: Value) -> Row {
    match value {
        Value::Object(row) => row,
        _ => Row::new(),
    }
}

pub(crate) fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Integer column that may arrive as a JSON number or a numeric string.
#[must_use]
pub fn int_field(row: &Row, column: &str) -> Option<i64> {
    match row.get(column)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Table-level reads and idempotent writes.
pub trait Store: Send + Sync {
    /// Rows of `table` matching `query`.
    fn get(
        &self,
        table: &str,
        query: &Query,
    ) -> impl Future<Output = Result<Vec<Row>, DbError>> + Send;

    /// Insert `rows`, updating in place on `conflict` when given. Returns the
    /// written rows including generated ids.
    fn upsert(
        &self,
        table: &str,
        rows: &[Row],
        conflict: Option<&[&str]>,
    ) -> impl Future<Output = Result<Vec<Row>, DbError>> + Send;

    /// Set `fields` on every row matching `query`'s filters.
    fn patch(
        &self,
        table: &str,
        query: &Query,
        fields: &Row,
    ) -> impl Future<Output = Result<(), DbError>> + Send;

    /// Column names of `table`, or `None` when the backend cannot tell.
    fn columns(
        &self,
        table: &str,
    ) -> impl Future<Output = Result<Option<BTreeSet<String>>, DbError>> + Send;
}

/// The backend chosen at startup.
pub enum AnyStore {
    Rest(RestStore),
    Postgres(PgStore),
    Memory(MemoryStore),
}

impl AnyStore {
    #[must_use]
    pub fn backend_name(&self) -> &'static str {
        match self {
            Self::Rest(_) => "rest",
            Self::Postgres(_) => "postgres",
            Self::Memory(_) => "memory",
        }
    }
}

impl Store for AnyStore {
    async fn get(&self, table: &str, query: &Query) -> Result<Vec<Row>, DbError> {
        match self {
            Self::Rest(s) => s.get(table, query).await,
            Self::Postgres(s) => s.get(table, query).await,
            Self::Memory(s) => s.get(table, query).await,
        }
    }

    async fn upsert(
        &self,
        table: &str,
        rows: &[Row],
        conflict: Option<&[&str]>,
    ) -> Result<Vec<Row>, DbError> {
        match self {
            Self::Rest(s) => s.upsert(table, rows, conflict).await,
            Self::Postgres(s) => s.upsert(table, rows, conflict).await,
            Self::Memory(s) => s.upsert(table, rows, conflict).await,
        }
    }

    async fn patch(&self, table: &str, query: &Query, fields: &Row) -> Result<(), DbError> {
        match self {
            Self::Rest(s) => s.patch(table, query, fields).await,
            Self::Postgres(s) => s.patch(table, query, fields).await,
            Self::Memory(s) => s.patch(table, query, fields).await,
        }
    }

    async fn columns(&self, table: &str) -> Result<Option<BTreeSet<String>>, DbError> {
        match self {
            Self::Rest(s) => s.columns(table).await,
            Self::Postgres(s) => s.columns(table).await,
            Self::Memory(s) => s.columns(table).await,
        }
    }
}
