//! PostgREST (Supabase) transport for [`Store`].

use std::collections::BTreeSet;
use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Response};
use serde_json::Value;

use crate::store::{Filter, Query, Row, Store};
use crate::DbError;

const ERROR_BODY_MAX_CHARS: usize = 800;

/// Talks to `<base>/rest/v1/<table>` with the service-role key.
pub struct RestStore {
    client: Client,
    base_url: String,
    service_key: String,
}

impl RestStore {
    /// # Errors
    ///
    /// Returns [`DbError::Http`] if the HTTP client cannot be constructed.
    pub fn new(base_url: &str, service_key: &str, timeout_secs: u64) -> Result<Self, DbError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key: service_key.to_string(),
        })
    }

    fn request(&self, method: Method, table: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}/rest/v1/{table}", self.base_url))
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
            .header("Accept", "application/json")
    }

    async fn rows(response: Response, table: &str) -> Result<Vec<Row>, DbError> {
        let response = ensure_success(response, table).await?;
        let body: Value = response.json().await?;
        match body {
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::Object(row) => Ok(row),
                    other => Err(DbError::Malformed {
                        context: table.to_string(),
                        reason: format!("expected row objects, got {other}"),
                    }),
                })
                .collect(),
            other => Err(DbError::Malformed {
                context: table.to_string(),
                reason: format!("expected a JSON array, got {other}"),
            }),
        }
    }
}

/// PostgREST query parameters for `query`.
pub(crate) fn query_params(query: &Query) -> Vec<(String, String)> {
    let mut params = Vec::new();
    if !query.columns.is_empty() {
        params.push(("select".to_string(), query.columns.join(",")));
    }
    params.extend(filter_params(query));
    if let Some(column) = &query.order_desc {
        params.push(("order".to_string(), format!("{column}.desc")));
    }
    if let Some(limit) = query.limit {
        params.push(("limit".to_string(), limit.to_string()));
    }
    params
}

fn filter_params(query: &Query) -> Vec<(String, String)> {
    query
        .filters
        .iter()
        .map(|filter| match filter {
            Filter::Eq(column, value) => (column.clone(), format!("eq.{value}")),
            Filter::Contains(column, value) => (column.clone(), format!("ilike.*{value}*")),
        })
        .collect()
}

async fn ensure_success(response: Response, table: &str) -> Result<Response, DbError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(DbError::Api {
        table: table.to_string(),
        status: status.as_u16(),
        body: body.chars().take(ERROR_BODY_MAX_CHARS).collect(),
    })
}

impl Store for RestStore {
    async fn get(&self, table: &str, query: &Query) -> Result<Vec<Row>, DbError> {
        let response = self
            .request(Method::GET, table)
            .query(&query_params(query))
            .send()
            .await?;
        Self::rows(response, table).await
    }

    async fn upsert(
        &self,
        table: &str,
        rows: &[Row],
        conflict: Option<&[&str]>,
    ) -> Result<Vec<Row>, DbError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let mut request = self.request(Method::POST, table).json(rows);
        request = match conflict {
            Some(columns) => request
                .query(&[("on_conflict", columns.join(","))])
                .header("Prefer", "resolution=merge-duplicates,return=representation"),
            None => request.header("Prefer", "return=representation"),
        };
        let response = request.send().await?;
        Self::rows(response, table).await
    }

    async fn patch(&self, table: &str, query: &Query, fields: &Row) -> Result<(), DbError> {
        let response = self
            .request(Method::PATCH, table)
            .query(&filter_params(query))
            .header("Prefer", "return=minimal")
            .json(fields)
            .send()
            .await?;
        ensure_success(response, table).await?;
        Ok(())
    }

    /// Sampled from one row: PostgREST exposes no catalog to the service role.
    async fn columns(&self, table: &str) -> Result<Option<BTreeSet<String>>, DbError> {
        let query = Query::new().select(&["*"]).limit(1);
        let rows = self.get(table, &query).await?;
        Ok(rows.first().map(|row| row.keys().cloned().collect()))
    }
}
