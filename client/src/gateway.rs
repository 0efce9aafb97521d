//! Remote data gateway.
//!
//! Thin async wrapper over the REST resources. Every call appends the session
//! `token` as a query parameter. There is no retry and no cache: errors go
//! straight back to the caller.

use reqwest::{Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use stockroom_engine::{
    query::remaining_chunk_offsets, EntityKind, Fields, FilterState, ListQuery, PartialUpdate,
    Record, RecordId, FETCH_ALL_CHUNK,
};

use crate::config::Config;
use crate::error::{ClientError, Result};

/// One page of a list call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListPage {
    #[serde(default)]
    pub result: Vec<Record>,
    /// Server-side total across all pages
    #[serde(default)]
    pub count: u64,
}

/// HTTP access to every resource of the API.
#[derive(Debug, Clone)]
pub struct Gateway {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl Gateway {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.api_url.clone(), config.token.clone())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}/", self.base_url, path)
    }

    fn item_url(&self, path: &str, id: &RecordId) -> String {
        format!("{}/{}/{}/", self.base_url, path, id)
    }

    fn auth(&self) -> [(&'static str, &str); 1] {
        [("token", self.token.as_str())]
    }

    /// One page of `kind` matching `query`. A 404 means nothing matched.
    pub async fn list(&self, kind: EntityKind, query: &ListQuery) -> Result<ListPage> {
        let response = self
            .http
            .get(self.url(kind.path()))
            .query(&self.auth())
            .query(&query.to_params())
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            tracing::debug!(entity = %kind, "List returned 404, treating as empty");
            return Ok(ListPage::default());
        }

        let page: ListPage = check(response).await?.json().await?;
        tracing::debug!(
            entity = %kind,
            offset = query.offset,
            rows = page.result.len(),
            count = page.count,
            "Fetched page"
        );
        Ok(page)
    }

    pub async fn get(&self, kind: EntityKind, id: &RecordId) -> Result<Record> {
        let response = self
            .http
            .get(self.item_url(kind.path(), id))
            .query(&self.auth())
            .send()
            .await?;

        Ok(check(response).await?.json().await?)
    }

    /// Create records. The server answers with the stored rows.
    pub async fn create(&self, kind: EntityKind, payload: &[Fields]) -> Result<Vec<Record>> {
        let response = self
            .http
            .post(self.url(kind.write_path()))
            .query(&self.auth())
            .json(payload)
            .send()
            .await?;

        let body: Value = check(response).await?.json().await?;
        records_from_body(body)
    }

    /// Send partial updates, each carrying its `id`.
    pub async fn update(&self, kind: EntityKind, updates: &[PartialUpdate]) -> Result<()> {
        let response = self
            .http
            .patch(self.url(kind.write_path()))
            .query(&self.auth())
            .json(updates)
            .send()
            .await?;

        check(response).await?;
        tracing::debug!(entity = %kind, updates = updates.len(), "Update acknowledged");
        Ok(())
    }

    /// Delete records by id. The ids travel in the request body.
    pub async fn remove(&self, kind: EntityKind, ids: &[RecordId]) -> Result<()> {
        let response = self
            .http
            .delete(self.url(kind.path()))
            .query(&self.auth())
            .json(ids)
            .send()
            .await?;

        check(response).await?;
        tracing::debug!(entity = %kind, removed = ids.len(), "Delete acknowledged");
        Ok(())
    }

    /// Free-text search over `kind`.
    pub async fn search(&self, kind: EntityKind, text: &str) -> Result<Vec<Record>> {
        let query = ListQuery::new(
            0,
            FETCH_ALL_CHUNK,
            FilterState::new().with_search(text),
        );
        Ok(self.list(kind, &query).await?.result)
    }

    /// Every record of `kind` matching `filters`, fetched in chunks.
    pub async fn fetch_all(&self, kind: EntityKind, filters: &FilterState) -> Result<Vec<Record>> {
        let first = self
            .list(kind, &ListQuery::new(0, FETCH_ALL_CHUNK, filters.clone()))
            .await?;
        let mut records = first.result;

        for offset in remaining_chunk_offsets(first.count, FETCH_ALL_CHUNK) {
            let page = self
                .list(kind, &ListQuery::new(offset, FETCH_ALL_CHUNK, filters.clone()))
                .await?;
            if page.result.is_empty() {
                break;
            }
            records.extend(page.result);
        }

        tracing::info!(entity = %kind, total = records.len(), "Fetched all records");
        Ok(records)
    }
}

/// Classify a response by status.
async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        tracing::warn!(status = status.as_u16(), "Credential rejected");
        return Err(ClientError::Unauthorized);
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ClientError::Status {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response)
}

/// Write endpoints answer with an array of rows, a single row, or a
/// `{result: [...]}` envelope depending on the resource.
fn records_from_body(body: Value) -> Result<Vec<Record>> {
    let items = match body {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("result") {
            Some(Value::Array(items)) => items,
            Some(_) | None if map.contains_key("id") => vec![Value::Object(map)],
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };
    items
        .into_iter()
        .map(|item| Record::from_value(item).map_err(ClientError::from))
        .collect()
}
