//! # Graph Contract Tests
//!
//! The same behavioral checks run against both storage backends.

use egregore_core::{
    BackendKind, EgregoreError, GraphSnapshot, GraphStore, MemoryId, Metadata, RelationType,
    Relationship, StorageBackend,
};
use serde_json::json;
use tempfile::TempDir;

fn backends() -> Vec<(TempDir, StorageBackend)> {
    [BackendKind::Memory, BackendKind::Redb]
        .into_iter()
        .map(|kind| {
            let temp = tempfile::tempdir().expect("temp dir");
            let backend =
                StorageBackend::open(kind, temp.path().join("graph.redb")).expect("open backend");
            (temp, backend)
        })
        .collect()
}

// =============================================================================
// NODES
// =============================================================================

mod nodes {
    use super::*;

    #[test]
    fn created_record_is_returned_unchanged() {
        for (_temp, mut graph) in backends() {
            let mut metadata = Metadata::new();
            metadata.insert("context".to_string(), json!("auth"));
            metadata.insert("tags".to_string(), json!(["jwt", "session"]));

            let id = graph
                .create_node("rotate signing keys", metadata.clone())
                .expect("create");
            let record = graph.get_node(id).expect("get").expect("present");

            assert_eq!(record.id, id);
            assert_eq!(record.content, "rotate signing keys");
            assert_eq!(record.metadata, metadata);
        }
    }

    #[test]
    fn ids_are_unique_across_creates() {
        for (_temp, mut graph) in backends() {
            let a = graph.create_node("same", Metadata::new()).expect("create");
            let b = graph.create_node("same", Metadata::new()).expect("create");
            assert_ne!(a, b);
            assert_eq!(graph.node_count().expect("count"), 2);
        }
    }

    #[test]
    fn list_respects_limit() {
        for (_temp, mut graph) in backends() {
            for i in 0..7 {
                graph
                    .create_node(&format!("memory {i}"), Metadata::new())
                    .expect("create");
            }
            assert_eq!(graph.list_nodes(3).expect("list").len(), 3);
            assert_eq!(graph.list_nodes(0).expect("list").len(), 0);
            assert_eq!(graph.list_nodes(100).expect("list").len(), 7);
        }
    }
}

// =============================================================================
// RELATIONSHIPS
// =============================================================================

mod relationships {
    use super::*;

    #[test]
    fn missing_endpoint_is_reported() {
        for (_temp, mut graph) in backends() {
            let a = graph.create_node("a", Metadata::new()).expect("create");
            let ghost = MemoryId::generate();

            let result =
                graph.create_relationship(Relationship::new(ghost, a, RelationType::default()));
            assert!(matches!(result, Err(EgregoreError::EndpointMissing(id)) if id == ghost));
        }
    }

    #[test]
    fn recreating_a_triple_overwrites_properties() {
        for (_temp, mut graph) in backends() {
            let a = graph.create_node("a", Metadata::new()).expect("create");
            let b = graph.create_node("b", Metadata::new()).expect("create");

            let mut first = Metadata::new();
            first.insert("weight".to_string(), json!(1));
            let mut second = Metadata::new();
            second.insert("weight".to_string(), json!(2));

            graph
                .create_relationship(
                    Relationship::new(a, b, RelationType::new("CITES")).with_properties(first),
                )
                .expect("first");
            graph
                .create_relationship(
                    Relationship::new(a, b, RelationType::new("CITES"))
                        .with_properties(second.clone()),
                )
                .expect("second");

            let rels = graph.list_relationships(10).expect("list");
            assert_eq!(rels.len(), 1);
            assert_eq!(rels[0].properties, second);
        }
    }

    #[test]
    fn reverse_direction_is_a_different_edge() {
        for (_temp, mut graph) in backends() {
            let a = graph.create_node("a", Metadata::new()).expect("create");
            let b = graph.create_node("b", Metadata::new()).expect("create");
            graph
                .create_relationship(Relationship::new(a, b, RelationType::default()))
                .expect("a->b");
            graph
                .create_relationship(Relationship::new(b, a, RelationType::default()))
                .expect("b->a");
            assert_eq!(graph.edge_count().expect("count"), 2);
            assert_eq!(graph.distinct_relation_types().expect("types"), 1);
        }
    }
}

// =============================================================================
// STATISTICS SCENARIO
// =============================================================================

mod scenario {
    use super::*;

    #[test]
    fn fix_then_delete() {
        for (_temp, mut graph) in backends() {
            let a = graph
                .create_node("fix CORS bug", Metadata::new())
                .expect("create A");
            let b = graph
                .create_node("use explicit origins", Metadata::new())
                .expect("create B");
            graph
                .create_relationship(Relationship::new(a, b, RelationType::new("FIXES")))
                .expect("relate");

            let stats = GraphSnapshot::collect(&graph).expect("stats");
            assert_eq!((stats.nodes, stats.edges), (2, 1));
            assert_eq!(stats.display_density(), 0.5);

            let hits = graph.search_by_content("CORS").expect("search");
            assert_eq!(hits.len(), 1);
            assert_eq!(hits[0].id, a);

            assert!(graph.delete_node(a).expect("delete"));
            let stats = GraphSnapshot::collect(&graph).expect("stats");
            assert_eq!((stats.nodes, stats.edges), (1, 0));
            assert!(graph.list_relationships(10).expect("list").is_empty());
        }
    }
}
