//! # Persistent Storage
//!
//! Disk-backed implementations of [`crate::GraphStore`].

mod redb_graph;

pub use redb_graph::RedbGraph;
