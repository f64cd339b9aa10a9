//! Record store over the REST gateway's table API.

use super::{AccessToken, RestBackend};
use async_trait::async_trait;
use nutri_core::store::{Record, RecordKey, RecordStore, StoreFailure};
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;

const TABLE_PATH: &str = "/rest/v1";
const NO_ROWS_CODE: &str = "PGRST116";

/// Error body the gateway returns for rejected requests.
#[derive(Debug, Deserialize)]
struct GatewayError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    details: Option<String>,
    #[serde(default)]
    hint: Option<String>,
}

/// [`RecordStore`] backed by the hosted REST gateway.
#[derive(Debug, Clone)]
pub struct RestRecordStore {
    backend: RestBackend,
    token: AccessToken,
}

impl RestRecordStore {
    /// Requests are sent with `token` when it holds a user token, with the
    /// API key otherwise.
    pub fn new(backend: RestBackend, token: AccessToken) -> Self {
        Self { backend, token }
    }

    fn table_url(&self, table: &str) -> String {
        self.backend.url(&format!("{}/{}", TABLE_PATH, table))
    }

    fn request(&self, method: reqwest::Method, table: &str) -> reqwest::RequestBuilder {
        let token = self.token.get();
        self.backend
            .authorize(self.backend.client.request(method, self.table_url(table)), token.as_deref())
    }

    async fn rows(response: Result<Response, reqwest::Error>) -> Result<Vec<Record>, StoreFailure> {
        let response = response.map_err(|e| StoreFailure::transport(e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| StoreFailure::transport(e.to_string()))?;

        if !status.is_success() {
            return Err(parse_failure(status, &body));
        }
        parse_rows(&body)
    }
}

/// Query pairs selecting the records matching `key`.
fn filter_query(key: &RecordKey) -> [(String, String); 2] {
    [
        (key.column.clone(), format!("eq.{}", key.value)),
        ("select".to_string(), "*".to_string()),
    ]
}

fn parse_rows(body: &str) -> Result<Vec<Record>, StoreFailure> {
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Array(items)) => Ok(items
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(record) => Some(record),
                _ => None,
            })
            .collect()),
        Ok(Value::Object(record)) => Ok(vec![record]),
        Ok(other) => Err(StoreFailure::new(
            "invalid_response",
            format!("Unexpected response body: {}", other),
        )),
        Err(e) => Err(StoreFailure::new("invalid_response", e.to_string())),
    }
}

/// Turns a non-success response into a [`StoreFailure`], keeping the
/// gateway's code when the body carries one.
fn parse_failure(status: StatusCode, body: &str) -> StoreFailure {
    let fallback_code = format!("http_{}", status.as_u16());
    match serde_json::from_str::<GatewayError>(body) {
        Ok(error) => StoreFailure {
            code: error.code.unwrap_or(fallback_code),
            message: error.message.unwrap_or_else(|| status.to_string()),
            details: error.details,
            hint: error.hint,
        },
        Err(_) => StoreFailure::new(
            fallback_code,
            if body.trim().is_empty() {
                status.to_string()
            } else {
                body.trim().to_string()
            },
        ),
    }
}

fn first_row(rows: Vec<Record>, table: &str, action: &str) -> Result<Record, StoreFailure> {
    rows.into_iter().next().ok_or_else(|| {
        StoreFailure::new(
            NO_ROWS_CODE,
            format!("{} on '{}' returned no rows", action, table),
        )
    })
}

#[async_trait]
impl RecordStore for RestRecordStore {
    async fn fetch_one(&self, table: &str, key: &RecordKey) -> Result<Option<Record>, StoreFailure> {
        tracing::debug!(table, key = %key, "GET record");
        let response = self
            .request(reqwest::Method::GET, table)
            .query(&filter_query(key))
            .send()
            .await;
        Ok(Self::rows(response).await?.into_iter().next())
    }

    async fn update_one(
        &self,
        table: &str,
        key: &RecordKey,
        fields: Record,
    ) -> Result<Record, StoreFailure> {
        tracing::debug!(table, key = %key, columns = fields.len(), "PATCH record");
        let response = self
            .request(reqwest::Method::PATCH, table)
            .query(&filter_query(key))
            .header("Prefer", "return=representation")
            .json(&fields)
            .send()
            .await;
        first_row(Self::rows(response).await?, table, "Update")
    }

    async fn insert_one(&self, table: &str, fields: Record) -> Result<Record, StoreFailure> {
        tracing::debug!(table, columns = fields.len(), "POST record");
        let response = self
            .request(reqwest::Method::POST, table)
            .header("Prefer", "return=representation")
            .json(&fields)
            .send()
            .await;
        first_row(Self::rows(response).await?, table, "Insert")
    }
}
