//! # Similarity Index
//!
//! The similarity index is an external collaborator: Egregore only upserts
//! entries into it and asks it for ranked matches. How it embeds or ranks
//! text is opaque.
//!
//! Two clients are provided:
//! - [`MemoryIndex`]: in-process term-overlap ranking (local use and tests)
//! - [`HttpIndex`]: an external search service over HTTP

mod http;
mod memory;

pub use http::HttpIndex;
pub use memory::MemoryIndex;

use crate::config::{IndexKind, IndexSettings};
use egregore_core::{EgregoreError, MemoryId, Metadata};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

/// An entry handed to the index. Keyed by the memory id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: MemoryId,
    pub content: String,
    #[serde(default)]
    pub metadata: Metadata,
}

/// A ranked match returned by the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredMemory {
    pub id: MemoryId,
    pub content: String,
    pub score: f64,
    #[serde(default)]
    pub metadata: Metadata,
}

/// Operations Egregore needs from a similarity index.
pub trait VectorIndex: Send + Sync {
    /// Insert or replace the entry for `entry.id`.
    fn upsert(&self, entry: IndexEntry) -> impl Future<Output = Result<(), EgregoreError>> + Send;

    /// Up to `limit` entries ranked by similarity to `text`, best first.
    fn query(
        &self,
        text: &str,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<ScoredMemory>, EgregoreError>> + Send;

    /// Liveness probe.
    fn ping(&self) -> impl Future<Output = Result<(), EgregoreError>> + Send;
}

/// The index selected by configuration.
#[derive(Debug)]
pub enum VectorClient {
    Memory(MemoryIndex),
    Http(HttpIndex),
}

impl VectorClient {
    /// Build the configured client.
    pub fn from_settings(
        settings: &IndexSettings,
        timeout: Duration,
    ) -> Result<Self, EgregoreError> {
        match settings.kind {
            IndexKind::Memory => Ok(Self::Memory(MemoryIndex::new())),
            IndexKind::Http => {
                let url = settings.url.as_deref().ok_or_else(|| {
                    EgregoreError::InvalidInput("HTTP index requires a URL".to_string())
                })?;
                Ok(Self::Http(HttpIndex::new(url, timeout)?))
            }
        }
    }

    /// Short name for logs and status output.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Memory(_) => "memory".to_string(),
            Self::Http(index) => format!("http ({})", index.base_url()),
        }
    }
}

impl VectorIndex for VectorClient {
    async fn upsert(&self, entry: IndexEntry) -> Result<(), EgregoreError> {
        match self {
            Self::Memory(index) => index.upsert(entry).await,
            Self::Http(index) => index.upsert(entry).await,
        }
    }

    async fn query(&self, text: &str, limit: usize) -> Result<Vec<ScoredMemory>, EgregoreError> {
        match self {
            Self::Memory(index) => index.query(text, limit).await,
            Self::Http(index) => index.query(text, limit).await,
        }
    }

    async fn ping(&self) -> Result<(), EgregoreError> {
        match self {
            Self::Memory(index) => index.ping().await,
            Self::Http(index) => index.ping().await,
        }
    }
}
