//! HTTP client for an external similarity-search service.
//!
//! ## Wire Protocol
//!
//! - `POST /upsert` with an [`IndexEntry`] body
//! - `POST /search` with `{"query": .., "limit": ..}`, answered by
//!   `{"results": [ScoredMemory, ..]}`
//! - `GET /health`, any 2xx is healthy
//!
//! Every failure (connection, timeout, non-2xx, bad body) maps to
//! `StoreUnavailable`.

use super::{IndexEntry, ScoredMemory, VectorIndex};
use egregore_core::EgregoreError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct HttpIndex {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    limit: usize,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<ScoredMemory>,
}

fn unavailable(context: &str, e: impl std::fmt::Display) -> EgregoreError {
    EgregoreError::StoreUnavailable(format!("vector index {context}: {e}"))
}

impl HttpIndex {
    /// Create a client for `base_url`; every request is bounded by `timeout`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, EgregoreError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| unavailable("client", e))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn check(
        resp: Result<reqwest::Response, reqwest::Error>,
        context: &str,
    ) -> Result<reqwest::Response, EgregoreError> {
        let resp = resp.map_err(|e| unavailable(context, e))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(unavailable(context, format!("HTTP {status}: {body}")));
        }
        Ok(resp)
    }
}

impl VectorIndex for HttpIndex {
    async fn upsert(&self, entry: IndexEntry) -> Result<(), EgregoreError> {
        let resp = self.http.post(self.url("/upsert")).json(&entry).send().await;
        Self::check(resp, "upsert").await?;
        Ok(())
    }

    async fn query(&self, text: &str, limit: usize) -> Result<Vec<ScoredMemory>, EgregoreError> {
        let body = SearchRequest { query: text, limit };
        let resp = self.http.post(self.url("/search")).json(&body).send().await;
        let resp = Self::check(resp, "search").await?;
        let parsed: SearchResponse = resp.json().await.map_err(|e| unavailable("search", e))?;
        let mut results = parsed.results;
        results.truncate(limit);
        Ok(results)
    }

    async fn ping(&self) -> Result<(), EgregoreError> {
        let resp = self.http.get(self.url("/health")).send().await;
        Self::check(resp, "health").await?;
        Ok(())
    }
}
