//! # Property-Based Tests
//!
//! Graph invariants checked with proptest against the in-memory backend.

use egregore_core::{
    EgregoreError, Graph, GraphStore, MemoryId, Metadata, RelationType, Relationship, density,
};
use proptest::collection::vec;
use proptest::prelude::*;

/// Build a graph with `n` memories and the given (source, target, label) edges
/// (indices modulo `n`; self-loops and failures are skipped).
fn build_graph(n: usize, edges: &[(usize, usize, u8)]) -> (Graph, Vec<MemoryId>) {
    let mut graph = Graph::new();
    let ids: Vec<MemoryId> = (0..n)
        .map(|i| {
            graph
                .create_node(&format!("memory {i}"), Metadata::new())
                .expect("create")
        })
        .collect();

    for &(s, t, label) in edges {
        let source = ids[s % n];
        let target = ids[t % n];
        if source == target {
            continue;
        }
        graph
            .create_relationship(Relationship::new(
                source,
                target,
                RelationType::new(format!("TYPE_{}", label % 4)),
            ))
            .expect("relate");
    }
    (graph, ids)
}

// =============================================================================
// PROPERTY TESTS
// =============================================================================

proptest! {
    /// After a delete, no relationship references the deleted memory.
    #[test]
    fn delete_leaves_no_dangling_edges(
        n in 2usize..20,
        edges in vec((0usize..100, 0usize..100, any::<u8>()), 0..60),
        victim in 0usize..100,
    ) {
        let (mut graph, ids) = build_graph(n, &edges);
        let victim = ids[victim % n];

        prop_assert!(graph.delete_node(victim).expect("delete"));
        let remaining = graph.list_relationships(usize::MAX).expect("list");
        prop_assert!(remaining.iter().all(|r| !r.touches(victim)));
        prop_assert_eq!(graph.edge_count().expect("count"), remaining.len());
        prop_assert!(graph.get_node(victim).expect("get").is_none());
    }

    /// A relationship from a memory to itself is always rejected.
    #[test]
    fn self_loop_always_rejected(label in "[A-Z_]{1,16}") {
        let mut graph = Graph::new();
        let a = graph.create_node("a", Metadata::new()).expect("create");

        let result = graph.create_relationship(Relationship::new(a, a, RelationType::new(label)));
        prop_assert!(matches!(result, Err(EgregoreError::SelfLoopRejected(id)) if id == a));
        prop_assert_eq!(graph.edge_count().expect("count"), 0);
    }

    /// Stored content and metadata come back unchanged.
    #[test]
    fn create_then_get_is_identity(content in ".{0,200}", key in "[a-z]{1,8}", value in ".{0,32}") {
        let mut graph = Graph::new();
        let mut metadata = Metadata::new();
        metadata.insert(key, serde_json::Value::String(value));

        let id = graph.create_node(&content, metadata.clone()).expect("create");
        let record = graph.get_node(id).expect("get").expect("present");
        prop_assert_eq!(record.content, content);
        prop_assert_eq!(record.metadata, metadata);
    }

    /// Density of a simple directed graph stays within [0, 1].
    #[test]
    fn density_bounded(
        n in 0usize..20,
        edges in vec((0usize..100, 0usize..100, any::<u8>()), 0..80),
    ) {
        let n = n.max(1);
        let (graph, _) = build_graph(n, &edges);
        let d = density(graph.node_count().expect("count"), graph.edge_count().expect("count"));
        prop_assert!((0.0..=1.0).contains(&d));
    }

    /// Search never returns a memory whose content lacks the needle.
    #[test]
    fn search_results_contain_needle(
        contents in vec("[a-c]{0,6}", 0..30),
        needle in "[a-c]{1,2}",
    ) {
        let mut graph = Graph::new();
        for content in &contents {
            graph.create_node(content, Metadata::new()).expect("create");
        }
        let expected = contents.iter().filter(|c| c.contains(needle.as_str())).count();

        let hits = graph.search_by_content(&needle).expect("search");
        prop_assert!(hits.iter().all(|r| r.content.contains(needle.as_str())));
        prop_assert_eq!(hits.len(), expected);
    }
}
