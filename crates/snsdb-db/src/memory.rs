//! In-process [`Store`] with the same upsert semantics as the remote
//! backends. Used by the coordinator tests and for dry runs.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::Value;

use crate::store::{value_text, Filter, Query, Row, Store};
use crate::DbError;

#[derive(Default)]
struct Tables {
    rows: HashMap<String, Vec<Row>>,
    columns: HashMap<String, BTreeSet<String>>,
    next_id: i64,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Tables>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `columns` for `table` from [`Store::columns`], as a live
    /// schema would.
    #[must_use]
    pub fn with_columns(self, table: &str, columns: &[&str]) -> Self {
        self.lock().columns.insert(
            table.to_string(),
            columns.iter().map(|c| (*c).to_string()).collect(),
        );
        self
    }

    /// Every row of `table`, in insertion order.
    #[must_use]
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.lock().rows.get(table).cloned().unwrap_or_default()
    }

    /// Seed rows directly, assigning ids where missing.
    pub fn insert(&self, table: &str, rows: Vec<Row>) {
        let mut tables = self.lock();
        for mut row in rows {
            tables.next_id += 1;
            let id = tables.next_id;
            row.entry("id").or_insert_with(|| Value::from(id));
            tables.rows.entry(table.to_string()).or_default().push(row);
        }
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn matches(row: &Row, filters: &[Filter]) -> bool {
    filters.iter().all(|filter| match filter {
        Filter::Eq(column, expected) => {
            row.get(column).and_then(value_text).as_deref() == Some(expected.as_str())
        }
        Filter::Contains(column, needle) => row
            .get(column)
            .and_then(value_text)
            .is_some_and(|text| text.to_lowercase().contains(&needle.to_lowercase())),
    })
}

fn same_key(a: &Row, b: &Row, keys: &[&str]) -> bool {
    keys.iter().all(|key| {
        let left = a.get(*key).and_then(value_text);
        left.is_some() && left == b.get(*key).and_then(value_text)
    })
}

fn compare(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(x), Some(y)) => value_text(x).cmp(&value_text(y)),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => Ordering::Equal,
    }
}

impl Store for MemoryStore {
    async fn get(&self, table: &str, query: &Query) -> Result<Vec<Row>, DbError> {
        let tables = self.lock();
        let mut rows: Vec<Row> = tables
            .rows
            .get(table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| matches(row, &query.filters))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        if let Some(column) = &query.order_desc {
            rows.sort_by(|a, b| compare(b.get(column), a.get(column)));
        }
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        Ok(rows.into_iter().map(|row| query.project(row)).collect())
    }

    async fn upsert(
        &self,
        table: &str,
        rows: &[Row],
        conflict: Option<&[&str]>,
    ) -> Result<Vec<Row>, DbError> {
        let mut tables = self.lock();
        let mut written = Vec::with_capacity(rows.len());
        for row in rows {
            let existing = conflict.and_then(|keys| {
                tables
                    .rows
                    .get(table)
                    .and_then(|stored| stored.iter().position(|s| same_key(s, row, keys)))
            });
            if let Some(index) = existing {
                let stored = &mut tables.rows.entry(table.to_string()).or_default()[index];
                for (key, value) in row {
                    stored.insert(key.clone(), value.clone());
                }
                written.push(stored.clone());
            } else {
                tables.next_id += 1;
                let id = tables.next_id;
                let mut fresh = row.clone();
                fresh.entry("id").or_insert_with(|| Value::from(id));
                tables
                    .rows
                    .entry(table.to_string())
                    .or_default()
                    .push(fresh.clone());
                written.push(fresh);
            }
        }
        Ok(written)
    }

    async fn patch(&self, table: &str, query: &Query, fields: &Row) -> Result<(), DbError> {
        let mut tables = self.lock();
        if let Some(rows) = tables.rows.get_mut(table) {
            for row in rows.iter_mut().filter(|row| matches(row, &query.filters)) {
                for (key, value) in fields {
                    row.insert(key.clone(), value.clone());
                }
            }
        }
        Ok(())
    }

    async fn columns(&self, table: &str) -> Result<Option<BTreeSet<String>>, DbError> {
        Ok(self.lock().columns.get(table).cloned())
    }
}
