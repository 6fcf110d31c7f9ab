//! PostgREST client for the Supabase store
//!
//! Tables live under `{base}/rest/v1/{table}`. Every request carries the
//! service key both as `apikey` and as a bearer token.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Response};
use std::time::Duration;
use tracing::debug;

use super::{KeyFilter, RecordStore, Row, StoreError};
use crate::config::StoreConfig;
use crate::error::{self, SyncError};
use crate::record::{Record, KEY_FIELD};

const REST_PATH: &str = "rest/v1";
const PREFER_UPSERT: &str = "resolution=merge-duplicates,return=minimal";
const PREFER_INSERT: &str = "return=minimal";

/// Store client speaking the PostgREST dialect
pub struct PostgrestStore {
    client: Client,
    rest_url: String,
}

impl PostgrestStore {
    pub fn new(config: &StoreConfig) -> error::Result<Self> {
        config.validate()?;

        let key = config.service_key.expose();
        let mut apikey = HeaderValue::from_str(key)
            .map_err(|_| SyncError::config("service key contains invalid header characters"))?;
        apikey.set_sensitive(true);
        let mut bearer = HeaderValue::from_str(&format!("Bearer {key}"))
            .map_err(|_| SyncError::config("service key contains invalid header characters"))?;
        bearer.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert("apikey", apikey);
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SyncError::config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            rest_url: format!("{}/{}", config.url.trim_end_matches('/'), REST_PATH),
        })
    }

    /// Base URL of the REST endpoint
    pub fn rest_url(&self) -> &str {
        &self.rest_url
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/{}", self.rest_url, table)
    }

    async fn write(
        &self,
        table: &str,
        rows: &[Record],
        prefer: &str,
        upsert: bool,
    ) -> Result<(), StoreError> {
        let mut request = self
            .client
            .post(self.table_url(table))
            .header("Prefer", prefer)
            .json(rows);

        if upsert {
            request = request.query(&[("on_conflict", KEY_FIELD)]);
        }

        let response = request.send().await?;
        check_status(response).await?;

        debug!(table, rows = rows.len(), upsert, "Write accepted");
        Ok(())
    }
}

#[async_trait]
impl RecordStore for PostgrestStore {
    async fn select(
        &self,
        table: &str,
        columns: &[&str],
        filter: &KeyFilter,
    ) -> Result<Vec<Row>, StoreError> {
        let response = self
            .client
            .get(self.table_url(table))
            .query(&[("select", columns.join(",")), (KEY_FIELD, filter_expression(filter))])
            .send()
            .await?;

        let body = check_status(response).await?.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn upsert(&self, table: &str, rows: &[Record]) -> Result<(), StoreError> {
        self.write(table, rows, PREFER_UPSERT, true).await
    }

    async fn insert(&self, table: &str, rows: &[Record]) -> Result<(), StoreError> {
        self.write(table, rows, PREFER_INSERT, false).await
    }
}

async fn check_status(response: Response) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response.text().await.unwrap_or_default();
    Err(StoreError::Status {
        status: status.as_u16(),
        message,
    })
}

/// PostgREST operator expression for a key filter
fn filter_expression(filter: &KeyFilter) -> String {
    match filter {
        KeyFilter::Eq(key) => format!("eq.{key}"),
        KeyFilter::In(keys) => {
            let quoted: Vec<String> = keys.iter().map(|key| quote(key)).collect();
            format!("in.({})", quoted.join(","))
        },
    }
}

/// Double-quote a value so commas and parentheses inside keys survive
fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}
