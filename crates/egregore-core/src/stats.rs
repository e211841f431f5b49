//! # Graph Statistics
//!
//! Aggregate metrics derived from a [`GraphStore`]. Nothing here is
//! persisted; a snapshot is recomputed on every request.

use crate::graph::GraphStore;
use crate::primitives::DENSITY_DISPLAY_PLACES;
use crate::EgregoreError;
use serde::{Serialize, Serializer};

/// Point-in-time statistics of the memory graph.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GraphSnapshot {
    /// Number of memories.
    pub nodes: usize,
    /// Number of relationships.
    pub edges: usize,
    /// Number of distinct relationship labels.
    pub relation_types: usize,
    /// Exact directed density. Serialized rounded for display.
    #[serde(serialize_with = "serialize_density")]
    pub density: f64,
}

impl GraphSnapshot {
    /// Compute a snapshot from exact counts.
    pub fn collect(store: &dyn GraphStore) -> Result<Self, EgregoreError> {
        let nodes = store.node_count()?;
        let edges = store.edge_count()?;
        let relation_types = store.distinct_relation_types()?;
        Ok(Self {
            nodes,
            edges,
            relation_types,
            density: density(nodes, edges),
        })
    }

    /// Density rounded for display.
    #[must_use]
    pub fn display_density(&self) -> f64 {
        round_places(self.density, DENSITY_DISPLAY_PLACES)
    }
}

/// Directed graph density: `E / (N * (N - 1))`, or 0 when `N <= 1`.
#[must_use]
pub fn density(nodes: usize, edges: usize) -> f64 {
    if nodes <= 1 {
        return 0.0;
    }
    let possible = (nodes as f64) * ((nodes - 1) as f64);
    edges as f64 / possible
}

fn round_places(value: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places as i32);
    (value * factor).round() / factor
}

fn serialize_density<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(round_places(*value, DENSITY_DISPLAY_PLACES))
}

// =============================================================================
// TESTS
// =============================================================================
