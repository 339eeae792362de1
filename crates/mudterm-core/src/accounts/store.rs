//! Minimal client for a PostgREST-style relational store (`/rest/v1/<table>`).
//!
//! Filters are equality only (`column=eq.value`), which is all the account and
//! character services need.

use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::config::ResolvedStore;
use crate::error::ClientError;

const REST_PATH: &str = "/rest/v1";

/// Equality filter: `(column, value)`.
pub type Filter<'a> = (&'a str, &'a str);

#[derive(Debug, Clone)]
pub struct StoreClient {
    base_url: String,
    api_key: String,
    access_token: Option<String>,
    http: reqwest::Client,
}

impl StoreClient {
    pub fn new(store: &ResolvedStore) -> Self {
        Self {
            base_url: store.url.trim_end_matches('/').to_string(),
            api_key: store.api_key.clone(),
            access_token: None,
            http: crate::api::http_client(crate::api::DEFAULT_REQUEST_TIMEOUT),
        }
    }

    /// Sends requests on behalf of a signed-in user instead of the anon key.
    #[must_use]
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}{}/{}", self.base_url, REST_PATH, table)
    }

    fn headers(&self) -> HeaderMap {
        let bearer = self.access_token.as_deref().unwrap_or(&self.api_key);
        let mut headers = HeaderMap::new();
        headers.insert(
            "apikey",
            HeaderValue::from_str(&self.api_key).unwrap_or_else(|_| HeaderValue::from_static("")),
        );
        headers.insert(
            "Authorization",
            HeaderValue::from_str(&format!("Bearer {bearer}"))
                .unwrap_or_else(|_| HeaderValue::from_static("")),
        );
        headers.insert("content-type", HeaderValue::from_static("application/json"));
        headers.insert(
            "user-agent",
            HeaderValue::from_static(crate::api::USER_AGENT),
        );
        headers
    }

    fn eq_query(filters: &[Filter<'_>]) -> Vec<(String, String)> {
        filters
            .iter()
            .map(|(column, value)| ((*column).to_string(), format!("eq.{value}")))
            .collect()
    }

    /// `GET /rest/v1/<table>?select=<columns>&<filters>`.
    pub async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        columns: &str,
        filters: &[Filter<'_>],
    ) -> Result<Vec<T>> {
        let mut query = vec![("select".to_string(), columns.to_string())];
        query.extend(Self::eq_query(filters));
        let request = self
            .http
            .get(self.table_url(table))
            .headers(self.headers())
            .query(&query);
        execute(request, table).await
    }

    /// Inserts one row and returns the stored representation.
    pub async fn insert<B: Serialize, T: DeserializeOwned>(
        &self,
        table: &str,
        row: &B,
    ) -> Result<Vec<T>> {
        let request = self
            .http
            .post(self.table_url(table))
            .headers(self.headers())
            .header("Prefer", "return=representation")
            .json(row);
        execute(request, table).await
    }

    /// Applies `changes` to matching rows and returns the updated rows.
    pub async fn update<B: Serialize, T: DeserializeOwned>(
        &self,
        table: &str,
        filters: &[Filter<'_>],
        changes: &B,
    ) -> Result<Vec<T>> {
        if filters.is_empty() {
            anyhow::bail!("Refusing to update {table} without a filter");
        }
        let request = self
            .http
            .patch(self.table_url(table))
            .headers(self.headers())
            .header("Prefer", "return=representation")
            .query(&Self::eq_query(filters))
            .json(changes);
        execute(request, table).await
    }

    /// Deletes matching rows and returns them.
    pub async fn delete<T: DeserializeOwned>(
        &self,
        table: &str,
        filters: &[Filter<'_>],
    ) -> Result<Vec<T>> {
        if filters.is_empty() {
            anyhow::bail!("Refusing to delete from {table} without a filter");
        }
        let request = self
            .http
            .delete(self.table_url(table))
            .headers(self.headers())
            .header("Prefer", "return=representation")
            .query(&Self::eq_query(filters));
        execute(request, table).await
    }
}

async fn execute<T: DeserializeOwned>(request: reqwest::RequestBuilder, table: &str) -> Result<T> {
    let response = request
        .send()
        .await
        .with_context(|| format!("Failed to reach store ({table})"))?;
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    if !status.is_success() {
        let err = ClientError::http_status(status.as_u16(), &body);
        anyhow::bail!("Store request on {table} failed (HTTP {status}): {err}");
    }
    serde_json::from_str(&body)
        .with_context(|| format!("Failed to parse store response for {table}: {body}"))
}
