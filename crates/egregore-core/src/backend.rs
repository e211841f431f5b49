//! # Storage Backend Selection
//!
//! The graph can live in memory or in a redb file. Both sit behind
//! [`GraphStore`], and `StorageBackend` picks one at startup so callers
//! never branch on the concrete type.
//!
//! ## Storage Backends
//!
//! - `InMemory`: Uses in-memory `Graph` (fast, volatile)
//! - `Persistent`: Uses `RedbGraph` for disk-backed ACID storage

use crate::graph::{Graph, GraphStore};
use crate::storage::RedbGraph;
use crate::{EgregoreError, MemoryId, MemoryRecord, Relationship};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Which backend to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Volatile in-memory graph.
    Memory,
    /// redb database file.
    #[default]
    Redb,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => f.write_str("memory"),
            Self::Redb => f.write_str("redb"),
        }
    }
}

impl FromStr for BackendKind {
    type Err = EgregoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "redb" => Ok(Self::Redb),
            other => Err(EgregoreError::InvalidInput(format!(
                "unknown backend '{other}' (expected 'redb' or 'memory')"
            ))),
        }
    }
}

/// Storage backend for the memory graph.
#[derive(Debug)]
pub enum StorageBackend {
    /// In-memory graph (fast, volatile).
    InMemory(Graph),
    /// Disk-backed graph using redb (ACID, persistent).
    Persistent(RedbGraph),
}

// NOTE: StorageBackend does NOT implement Clone.
// RedbGraph (database handle) cannot be safely cloned.

impl Default for StorageBackend {
    fn default() -> Self {
        Self::InMemory(Graph::new())
    }
}

impl StorageBackend {
    /// Open a backend of the given kind. `path` is ignored for `Memory`.
    pub fn open(kind: BackendKind, path: impl AsRef<Path>) -> Result<Self, EgregoreError> {
        match kind {
            BackendKind::Memory => Ok(Self::InMemory(Graph::new())),
            BackendKind::Redb => Ok(Self::Persistent(RedbGraph::open(path)?)),
        }
    }

    /// Check if using persistent storage.
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        matches!(self, Self::Persistent(_))
    }

    fn store(&self) -> &dyn GraphStore {
        match self {
            Self::InMemory(graph) => graph,
            Self::Persistent(redb) => redb,
        }
    }

    fn store_mut(&mut self) -> &mut dyn GraphStore {
        match self {
            Self::InMemory(graph) => graph,
            Self::Persistent(redb) => redb,
        }
    }
}

impl GraphStore for StorageBackend {
    fn insert_record(&mut self, record: MemoryRecord) -> Result<(), EgregoreError> {
        self.store_mut().insert_record(record)
    }

    fn get_node(&self, id: MemoryId) -> Result<Option<MemoryRecord>, EgregoreError> {
        self.store().get_node(id)
    }

    fn contains_node(&self, id: MemoryId) -> Result<bool, EgregoreError> {
        self.store().contains_node(id)
    }

    fn create_relationship(&mut self, relationship: Relationship) -> Result<(), EgregoreError> {
        self.store_mut().create_relationship(relationship)
    }

    fn list_nodes(&self, limit: usize) -> Result<Vec<MemoryRecord>, EgregoreError> {
        self.store().list_nodes(limit)
    }

    fn list_relationships(&self, limit: usize) -> Result<Vec<Relationship>, EgregoreError> {
        self.store().list_relationships(limit)
    }

    fn search_by_content(&self, needle: &str) -> Result<Vec<MemoryRecord>, EgregoreError> {
        self.store().search_by_content(needle)
    }

    fn delete_node(&mut self, id: MemoryId) -> Result<bool, EgregoreError> {
        self.store_mut().delete_node(id)
    }

    fn node_count(&self) -> Result<usize, EgregoreError> {
        self.store().node_count()
    }

    fn edge_count(&self) -> Result<usize, EgregoreError> {
        self.store().edge_count()
    }

    fn distinct_relation_types(&self) -> Result<usize, EgregoreError> {
        self.store().distinct_relation_types()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Metadata, RelationType};
    use tempfile::tempdir;

    #[test]
    fn backend_kind_parses_case_insensitively() {
        assert_eq!("REDB".parse::<BackendKind>().expect("parse"), BackendKind::Redb);
        assert_eq!(
            " memory ".parse::<BackendKind>().expect("parse"),
            BackendKind::Memory
        );
        assert!("postgres".parse::<BackendKind>().is_err());
    }

    #[test]
    fn both_backends_behave_the_same() {
        let temp = tempdir().expect("temp dir");
        let backends = [
            StorageBackend::open(BackendKind::Memory, temp.path().join("unused.redb"))
                .expect("memory"),
            StorageBackend::open(BackendKind::Redb, temp.path().join("graph.redb")).expect("redb"),
        ];

        for mut backend in backends {
            let a = backend.create_node("a", Metadata::new()).expect("create");
            let b = backend.create_node("b", Metadata::new()).expect("create");
            backend
                .create_relationship(Relationship::new(a, b, RelationType::new("FIXES")))
                .expect("relate");
            assert_eq!(backend.node_count().expect("count"), 2);
            assert_eq!(backend.edge_count().expect("count"), 1);
            assert!(backend.delete_node(b).expect("delete"));
            assert_eq!(backend.edge_count().expect("count"), 0);
        }
    }

    #[test]
    fn default_is_in_memory() {
        assert!(!StorageBackend::default().is_persistent());
    }
}
