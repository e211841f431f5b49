//! # Recall
//!
//! The read path for semantic memories. Recall only ever asks the
//! similarity index; it never consults the graph, so memories written on
//! the direct path do not show up here.

use crate::vector::{ScoredMemory, VectorIndex};
use egregore_core::EgregoreError;
use egregore_core::primitives::{DEFAULT_RECALL_LIMIT, MAX_RECALL_LIMIT};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Ranked recall results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecallResult {
    pub query: String,
    pub memories_found: usize,
    pub memories: Vec<ScoredMemory>,
}

/// Runs recall queries against the similarity index.
#[derive(Debug)]
pub struct SearchAggregator<V> {
    index: Arc<V>,
    timeout: Duration,
}

impl<V> Clone for SearchAggregator<V> {
    fn clone(&self) -> Self {
        Self {
            index: Arc::clone(&self.index),
            timeout: self.timeout,
        }
    }
}

/// Normalize a caller-supplied limit: missing or zero means the default,
/// anything above the cap is clamped.
#[must_use]
pub fn recall_limit(limit: Option<usize>) -> usize {
    match limit {
        None | Some(0) => DEFAULT_RECALL_LIMIT,
        Some(n) => n.min(MAX_RECALL_LIMIT),
    }
}

impl<V: VectorIndex> SearchAggregator<V> {
    #[must_use]
    pub fn new(index: Arc<V>, timeout: Duration) -> Self {
        Self { index, timeout }
    }

    /// Up to `limit` memories ranked by similarity to `query`.
    pub async fn recall(
        &self,
        query: &str,
        limit: Option<usize>,
    ) -> Result<RecallResult, EgregoreError> {
        if query.trim().is_empty() {
            return Err(EgregoreError::InvalidInput(
                "query must not be empty".to_string(),
            ));
        }
        let limit = recall_limit(limit);

        let memories = match tokio::time::timeout(self.timeout, self.index.query(query, limit)).await
        {
            Ok(result) => result?,
            Err(_) => {
                return Err(EgregoreError::StoreUnavailable(format!(
                    "vector index search timed out after {}ms",
                    self.timeout.as_millis()
                )));
            }
        };

        Ok(RecallResult {
            query: query.to_string(),
            memories_found: memories.len(),
            memories,
        })
    }

    /// Liveness of the index, bounded by the timeout.
    pub async fn ping(&self) -> Result<(), EgregoreError> {
        match tokio::time::timeout(self.timeout, self.index.ping()).await {
            Ok(result) => result,
            Err(_) => Err(EgregoreError::StoreUnavailable(
                "vector index health probe timed out".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::{IndexEntry, MemoryIndex};
    use egregore_core::{MemoryId, Metadata};

    async fn seeded() -> (SearchAggregator<MemoryIndex>, Arc<MemoryIndex>) {
        let index = Arc::new(MemoryIndex::new());
        for content in ["fix CORS bug", "use explicit origins", "rotate keys"] {
            index
                .upsert(IndexEntry {
                    id: MemoryId::generate(),
                    content: content.to_string(),
                    metadata: Metadata::new(),
                })
                .await
                .expect("upsert");
        }
        (
            SearchAggregator::new(Arc::clone(&index), Duration::from_secs(1)),
            index,
        )
    }

    #[test]
    fn limit_defaults_and_caps() {
        assert_eq!(recall_limit(None), 5);
        assert_eq!(recall_limit(Some(0)), 5);
        assert_eq!(recall_limit(Some(3)), 3);
        assert_eq!(recall_limit(Some(10_000)), MAX_RECALL_LIMIT);
    }

    #[tokio::test]
    async fn recall_returns_ranked_matches() {
        let (recall, _) = seeded().await;
        let result = recall.recall("CORS bug", None).await.expect("recall");
        assert_eq!(result.query, "CORS bug");
        assert_eq!(result.memories_found, 1);
        assert_eq!(result.memories[0].content, "fix CORS bug");
    }

    #[tokio::test]
    async fn no_match_is_empty_not_error() {
        let (recall, _) = seeded().await;
        let result = recall.recall("kubernetes", Some(5)).await.expect("recall");
        assert_eq!(result.memories_found, 0);
        assert!(result.memories.is_empty());
    }

    #[tokio::test]
    async fn blank_query_is_rejected() {
        let (recall, _) = seeded().await;
        let err = recall.recall("   ", None).await.expect_err("blank");
        assert_eq!(err.kind(), "InvalidInput");
    }
}
