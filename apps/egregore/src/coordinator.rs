//! # Dual-Path Write Coordinator
//!
//! Decides, per write, which stores are touched.
//!
//! - **Semantic**: graph first, then the similarity index. The two writes
//!   are not transactional. A graph failure skips the index write, so every
//!   index entry has a graph record behind it. An index failure after a
//!   graph success is reported as a partial write and the graph record is
//!   kept.
//! - **Direct**: graph only. Such records are invisible to recall until
//!   they are indexed separately.
//!
//! There is no reconciliation. Partial writes are logged with the record
//! id so an operator can re-index them.

use crate::store::GraphHandle;
use crate::vector::{IndexEntry, VectorIndex};
use egregore_core::{EgregoreError, MemoryId, Metadata};
use serde::Serialize;
use std::sync::Arc;

/// Which stores a write goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WritePath {
    /// Graph and similarity index.
    Semantic,
    /// Graph only.
    Direct,
}

/// Per-store result of a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StoreStatus {
    pub graph: bool,
    pub vector_index: bool,
}

/// Result of a write whose graph step succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOutcome {
    pub id: MemoryId,
    pub path: WritePath,
    pub stores: StoreStatus,
    /// Why the index write failed, if it did.
    pub index_error: Option<String>,
}

impl WriteOutcome {
    /// Graph stored but the index did not.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        self.path == WritePath::Semantic && !self.stores.vector_index
    }

    /// The partial-write condition as an error value, if any.
    #[must_use]
    pub fn partial_failure(&self) -> Option<EgregoreError> {
        self.index_error
            .as_ref()
            .map(|reason| EgregoreError::PartialWriteFailure {
                id: self.id,
                reason: reason.clone(),
            })
    }
}

/// Routes writes to the graph and, for semantic writes, the index.
#[derive(Debug)]
pub struct WriteCoordinator<V> {
    graph: GraphHandle,
    index: Arc<V>,
}

impl<V> Clone for WriteCoordinator<V> {
    fn clone(&self) -> Self {
        Self {
            graph: self.graph.clone(),
            index: Arc::clone(&self.index),
        }
    }
}

impl<V: VectorIndex> WriteCoordinator<V> {
    #[must_use]
    pub fn new(graph: GraphHandle, index: Arc<V>) -> Self {
        Self { graph, index }
    }

    /// Write along the given path.
    ///
    /// `Err` means the graph write failed or did not finish in time, and the
    /// index was not touched. After a `StoreUnavailable` timeout the graph
    /// write may still complete in the background, so the record can appear
    /// later. `Ok` with [`WriteOutcome::is_partial`] means the graph has the
    /// record and the index does not.
    pub async fn write(
        &self,
        path: WritePath,
        content: String,
        metadata: Metadata,
    ) -> Result<WriteOutcome, EgregoreError> {
        let id = self
            .graph
            .create_node(content.clone(), metadata.clone())
            .await?;

        if path == WritePath::Direct {
            tracing::debug!(%id, "stored memory (direct path)");
            return Ok(WriteOutcome {
                id,
                path,
                stores: StoreStatus {
                    graph: true,
                    vector_index: false,
                },
                index_error: None,
            });
        }

        let entry = IndexEntry {
            id,
            content,
            metadata,
        };
        let indexed = match tokio::time::timeout(self.graph.timeout(), self.index.upsert(entry)).await
        {
            Ok(result) => result,
            Err(_) => Err(EgregoreError::StoreUnavailable(format!(
                "vector index upsert timed out after {}ms",
                self.graph.timeout().as_millis()
            ))),
        };

        let outcome = WriteOutcome {
            id,
            path,
            stores: StoreStatus {
                graph: true,
                vector_index: indexed.is_ok(),
            },
            index_error: indexed.err().map(|e| e.to_string()),
        };

        match outcome.partial_failure() {
            Some(err) => tracing::warn!(%id, error = %err, "partial write: re-index this memory"),
            None => tracing::debug!(%id, "stored memory (semantic path)"),
        }
        Ok(outcome)
    }

    /// Semantic-path write.
    pub async fn store_semantic(
        &self,
        content: String,
        metadata: Metadata,
    ) -> Result<WriteOutcome, EgregoreError> {
        self.write(WritePath::Semantic, content, metadata).await
    }

    /// Direct-path write.
    pub async fn store_direct(
        &self,
        content: String,
        metadata: Metadata,
    ) -> Result<WriteOutcome, EgregoreError> {
        self.write(WritePath::Direct, content, metadata).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::{MemoryIndex, ScoredMemory};
    use egregore_core::StorageBackend;
    use std::time::Duration;

    /// An index that rejects every call.
    struct BrokenIndex;

    impl VectorIndex for BrokenIndex {
        async fn upsert(&self, _entry: IndexEntry) -> Result<(), EgregoreError> {
            Err(EgregoreError::StoreUnavailable("index down".to_string()))
        }

        async fn query(&self, _text: &str, _limit: usize) -> Result<Vec<ScoredMemory>, EgregoreError> {
            Err(EgregoreError::StoreUnavailable("index down".to_string()))
        }

        async fn ping(&self) -> Result<(), EgregoreError> {
            Err(EgregoreError::StoreUnavailable("index down".to_string()))
        }
    }

    fn graph() -> GraphHandle {
        GraphHandle::new(StorageBackend::default(), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn semantic_write_reaches_both_stores() {
        let graph = graph();
        let index = Arc::new(MemoryIndex::new());
        let coordinator = WriteCoordinator::new(graph.clone(), Arc::clone(&index));

        let outcome = coordinator
            .store_semantic("fix CORS bug".to_string(), Metadata::new())
            .await
            .expect("write");

        assert!(!outcome.is_partial());
        assert!(graph.get_node(outcome.id).await.expect("get").is_some());
        let hits = index.query("cors", 5).await.expect("query");
        assert_eq!(hits[0].id, outcome.id);
    }

    #[tokio::test]
    async fn index_failure_is_partial_and_keeps_graph_record() {
        let graph = graph();
        let coordinator = WriteCoordinator::new(graph.clone(), Arc::new(BrokenIndex));

        let outcome = coordinator
            .store_semantic("fix CORS bug".to_string(), Metadata::new())
            .await
            .expect("graph write succeeded");

        assert!(outcome.is_partial());
        assert!(outcome.stores.graph);
        assert!(!outcome.stores.vector_index);
        let err = outcome.partial_failure().expect("partial");
        assert_eq!(err.kind(), "PartialWriteFailure");
        assert!(graph.get_node(outcome.id).await.expect("get").is_some());
    }

    #[tokio::test]
    async fn direct_write_never_touches_index() {
        let graph = graph();
        let index = Arc::new(MemoryIndex::new());
        let coordinator = WriteCoordinator::new(graph.clone(), Arc::clone(&index));

        let outcome = coordinator
            .store_direct("fix CORS bug".to_string(), Metadata::new())
            .await
            .expect("write");

        assert!(!outcome.is_partial());
        assert!(index.is_empty().await);
        assert!(index.query("cors", 5).await.expect("query").is_empty());
        assert!(graph.get_node(outcome.id).await.expect("get").is_some());
    }

    #[tokio::test]
    async fn direct_write_ignores_broken_index() {
        let coordinator = WriteCoordinator::new(graph(), Arc::new(BrokenIndex));
        let outcome = coordinator
            .store_direct("note".to_string(), Metadata::new())
            .await
            .expect("write");
        assert!(outcome.partial_failure().is_none());
    }

    #[tokio::test]
    async fn graph_failure_skips_index() {
        let index = Arc::new(MemoryIndex::new());
        let coordinator = WriteCoordinator::new(graph(), Arc::clone(&index));

        let oversized = "x".repeat(egregore_core::primitives::MAX_CONTENT_LENGTH + 1);
        let err = coordinator
            .store_semantic(oversized, Metadata::new())
            .await
            .expect_err("graph rejects");
        assert_eq!(err.kind(), "InvalidInput");
        assert!(index.is_empty().await);
    }

    #[tokio::test]
    async fn timed_out_graph_write_lands_later_without_index() {
        let graph = GraphHandle::new(StorageBackend::default(), Duration::from_millis(50));
        let index = Arc::new(MemoryIndex::new());
        let coordinator = WriteCoordinator::new(graph.clone(), Arc::clone(&index));

        let stalled = graph.stall().await;
        let err = coordinator
            .store_semantic("fix CORS bug".to_string(), Metadata::new())
            .await
            .expect_err("graph timed out");
        assert_eq!(err.kind(), "StoreUnavailable");
        drop(stalled);

        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while graph.snapshot().await.expect("snapshot").nodes == 0 {
            assert!(tokio::time::Instant::now() < deadline, "write never landed");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(index.is_empty().await);
    }
}
