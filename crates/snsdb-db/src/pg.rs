//! Direct Postgres transport for [`Store`].
//!
//! Rows are shipped as a single `jsonb` parameter and expanded server-side
//! with `jsonb_populate_recordset`, so one statement shape serves every
//! table without per-table structs.

use std::collections::BTreeSet;

use serde_json::Value;
use sqlx::PgPool;

use crate::store::{Filter, Query, Row, Store};
use crate::DbError;

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Accepts lower-case `snake_case` names only; everything is interpolated
/// into SQL text.
pub(crate) fn ident(name: &str) -> Result<&str, DbError> {
    let mut chars = name.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c == '_')
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if valid {
        Ok(name)
    } else {
        Err(DbError::InvalidIdentifier(name.to_string()))
    }
}

fn escape_like(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('%');
    for c in value.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}

/// `WHERE` clause over `filters`, numbering binds from `first_bind`.
fn where_clause(
    alias: &str,
    filters: &[Filter],
    first_bind: usize,
) -> Result<(String, Vec<String>), DbError> {
    let mut clauses = Vec::with_capacity(filters.len());
    let mut binds = Vec::with_capacity(filters.len());
    for (i, filter) in filters.iter().enumerate() {
        let n = first_bind + i;
        match filter {
            Filter::Eq(column, value) => {
                clauses.push(format!("{alias}.{}::text = ${n}", ident(column)?));
                binds.push(value.clone());
            }
            Filter::Contains(column, value) => {
                clauses.push(format!("{alias}.{}::text ILIKE ${n}", ident(column)?));
                binds.push(escape_like(value));
            }
        }
    }
    if clauses.is_empty() {
        return Ok((String::new(), binds));
    }
    Ok((format!(" WHERE {}", clauses.join(" AND ")), binds))
}

pub(crate) fn select_sql(table: &str, query: &Query) -> Result<(String, Vec<String>), DbError> {
    let table = ident(table)?;
    let (filter, binds) = where_clause("t", &query.filters, 1)?;
    let mut sql = format!("SELECT to_jsonb(t) FROM {table} AS t{filter}");
    if let Some(column) = &query.order_desc {
        sql.push_str(&format!(" ORDER BY t.{} DESC", ident(column)?));
    }
    if let Some(limit) = query.limit {
        sql.push_str(&format!(" LIMIT {limit}"));
    }
    Ok((sql, binds))
}

/// Rows in one batch are expected to share a key set; columns absent from a
/// row are written as `NULL`.
pub(crate) fn upsert_sql(
    table: &str,
    columns: &BTreeSet<String>,
    conflict: Option<&[&str]>,
) -> Result<String, DbError> {
    let table = ident(table)?;
    let cols = columns
        .iter()
        .map(|c| ident(c))
        .collect::<Result<Vec<_>, _>>()?;
    let col_list = cols.join(", ");
    let mut sql = format!(
        "INSERT INTO {table} AS target ({col_list}) \
         SELECT {col_list} FROM jsonb_populate_recordset(NULL::{table}, $1::jsonb)"
    );
    if let Some(conflict) = conflict {
        let keys = conflict
            .iter()
            .map(|c| ident(c))
            .collect::<Result<Vec<_>, _>>()?;
        let mut updates: Vec<String> = cols
            .iter()
            .filter(|c| !keys.contains(c))
            .map(|c| format!("{c} = EXCLUDED.{c}"))
            .collect();
        if updates.is_empty() {
            // A no-op update still returns the existing row.
            let key = keys.first().ok_or_else(|| DbError::InvalidIdentifier(String::new()))?;
            updates.push(format!("{key} = EXCLUDED.{key}"));
        }
        sql.push_str(&format!(
            " ON CONFLICT ({}) DO UPDATE SET {}",
            keys.join(", "),
            updates.join(", ")
        ));
    }
    sql.push_str(" RETURNING to_jsonb(target.*)");
    Ok(sql)
}

pub(crate) fn patch_sql(
    table: &str,
    fields: &Row,
    query: &Query,
) -> Result<(String, Vec<String>), DbError> {
    let table = ident(table)?;
    let sets = fields
        .keys()
        .map(|c| ident(c).map(|c| format!("{c} = patch.{c}")))
        .collect::<Result<Vec<_>, _>>()?;
    let (filter, binds) = where_clause("target", &query.filters, 2)?;
    Ok((
        format!(
            "UPDATE {table} AS target SET {} \
             FROM jsonb_populate_record(NULL::{table}, $1::jsonb) AS patch{filter}",
            sets.join(", ")
        ),
        binds,
    ))
}

fn into_rows(values: Vec<Value>, table: &str) -> Result<Vec<Row>, DbError> {
    values
        .into_iter()
        .map(|value| match value {
            Value::Object(row) => Ok(row),
            other => Err(DbError::Malformed {
                context: table.to_string(),
                reason: format!("expected a row object, got {other}"),
            }),
        })
        .collect()
}

impl Store for PgStore {
    async fn get(&self, table: &str, query: &Query) -> Result<Vec<Row>, DbError> {
        let (sql, binds) = select_sql(table, query)?;
        let mut q = sqlx::query_scalar::<_, Value>(&sql);
        for bind in binds {
            q = q.bind(bind);
        }
        let rows = into_rows(q.fetch_all(&self.pool).await?, table)?;
        Ok(rows.into_iter().map(|row| query.project(row)).collect())
    }

    async fn upsert(
        &self,
        table: &str,
        rows: &[Row],
        conflict: Option<&[&str]>,
    ) -> Result<Vec<Row>, DbError> {
        let columns: BTreeSet<String> = rows.iter().flat_map(|r| r.keys().cloned()).collect();
        if columns.is_empty() {
            return Ok(Vec::new());
        }
        let sql = upsert_sql(table, &columns, conflict)?;
        let payload = Value::Array(rows.iter().cloned().map(Value::Object).collect());
        let written = sqlx::query_scalar::<_, Value>(&sql)
            .bind(payload)
            .fetch_all(&self.pool)
            .await?;
        into_rows(written, table)
    }

    async fn patch(&self, table: &str, query: &Query, fields: &Row) -> Result<(), DbError> {
        if fields.is_empty() {
            return Ok(());
        }
        let (sql, binds) = patch_sql(table, fields, query)?;
        let mut q = sqlx::query(&sql).bind(Value::Object(fields.clone()));
        for bind in binds {
            q = q.bind(bind);
        }
        q.execute(&self.pool).await?;
        Ok(())
    }

    async fn columns(&self, table: &str) -> Result<Option<BTreeSet<String>>, DbError> {
        let names: Vec<String> = sqlx::query_scalar::<_, String>(
            "SELECT column_name::text FROM information_schema.columns \
             WHERE table_schema = current_schema() AND table_name = $1",
        )
        .bind(ident(table)?)
        .fetch_all(&self.pool)
        .await?;
        if names.is_empty() {
            return Ok(None);
        }
        Ok(Some(names.into_iter().collect()))
    }
}
