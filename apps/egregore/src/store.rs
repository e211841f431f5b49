//! # Graph Handle
//!
//! Shared, timeout-bounded access to the graph backend.
//!
//! The core graph is synchronous. Each call runs on the blocking pool under
//! the shared lock and the caller waits at most `timeout` for it. On expiry
//! the caller gets `StoreUnavailable`; the call itself is not cancelled and
//! still completes in the background.

use egregore_core::{
    EgregoreError, GraphSnapshot, GraphStore, MemoryId, MemoryRecord, Metadata, Query,
    QueryResult, Relationship, StorageBackend,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Cloneable handle to the one graph backend of this process.
#[derive(Clone)]
pub struct GraphHandle {
    backend: Arc<RwLock<StorageBackend>>,
    timeout: Duration,
}

impl std::fmt::Debug for GraphHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphHandle")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl GraphHandle {
    /// Wrap an opened backend.
    #[must_use]
    pub fn new(backend: StorageBackend, timeout: Duration) -> Self {
        Self {
            backend: Arc::new(RwLock::new(backend)),
            timeout,
        }
    }

    /// Block every graph call until the guard is dropped.
    #[cfg(test)]
    pub(crate) async fn stall(&self) -> tokio::sync::RwLockWriteGuard<'_, StorageBackend> {
        self.backend.write().await
    }

    /// The per-call timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn read<T, F>(&self, op: &'static str, f: F) -> Result<T, EgregoreError>
    where
        T: Send + 'static,
        F: FnOnce(&StorageBackend) -> Result<T, EgregoreError> + Send + 'static,
    {
        let backend = Arc::clone(&self.backend);
        let task = tokio::task::spawn_blocking(move || {
            let guard = backend.blocking_read();
            f(&guard)
        });
        self.bounded(op, task).await
    }

    async fn write<T, F>(&self, op: &'static str, f: F) -> Result<T, EgregoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut StorageBackend) -> Result<T, EgregoreError> + Send + 'static,
    {
        let backend = Arc::clone(&self.backend);
        let task = tokio::task::spawn_blocking(move || {
            let mut guard = backend.blocking_write();
            f(&mut guard)
        });
        self.bounded(op, task).await
    }

    async fn bounded<T>(
        &self,
        op: &'static str,
        task: tokio::task::JoinHandle<Result<T, EgregoreError>>,
    ) -> Result<T, EgregoreError> {
        match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(EgregoreError::StoreUnavailable(format!(
                "graph {op} aborted: {join_error}"
            ))),
            Err(_) => {
                tracing::warn!(op, timeout_ms = self.timeout.as_millis() as u64, "graph call timed out");
                Err(EgregoreError::StoreUnavailable(format!(
                    "graph {op} timed out after {}ms",
                    self.timeout.as_millis()
                )))
            }
        }
    }

    // =========================================================================
    // GRAPH OPERATIONS
    // =========================================================================

    /// Create a memory. Returns the fresh id.
    pub async fn create_node(
        &self,
        content: String,
        metadata: Metadata,
    ) -> Result<MemoryId, EgregoreError> {
        self.write("create_node", move |g| g.create_node(&content, metadata))
            .await
    }

    /// Lookup a memory.
    pub async fn get_node(&self, id: MemoryId) -> Result<Option<MemoryRecord>, EgregoreError> {
        self.read("get_node", move |g| g.get_node(id)).await
    }

    /// Create a relationship.
    pub async fn create_relationship(
        &self,
        relationship: Relationship,
    ) -> Result<(), EgregoreError> {
        self.write("create_relationship", move |g| {
            g.create_relationship(relationship)
        })
        .await
    }

    /// Delete a memory and its relationships. `false` if it did not exist.
    pub async fn delete_node(&self, id: MemoryId) -> Result<bool, EgregoreError> {
        self.write("delete_node", move |g| g.delete_node(id)).await
    }

    /// Run a read query.
    pub async fn query(&self, query: Query) -> Result<QueryResult, EgregoreError> {
        self.read("query", move |g| query.execute(g)).await
    }

    /// Current statistics.
    pub async fn snapshot(&self) -> Result<GraphSnapshot, EgregoreError> {
        self.read("stats", |g| GraphSnapshot::collect(g)).await
    }

    /// Liveness probe: a bounded node count.
    pub async fn ping(&self) -> Result<(), EgregoreError> {
        self.read("ping", |g| g.node_count().map(|_| ())).await
    }
}
