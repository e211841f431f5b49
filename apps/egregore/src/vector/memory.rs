//! In-process term-overlap index.
//!
//! Scores an entry by the fraction of distinct query terms it contains.
//! Terms are lowercase alphanumeric runs. Good enough to exercise recall
//! without an external service; not a semantic model.

use super::{IndexEntry, ScoredMemory, VectorIndex};
use egregore_core::{EgregoreError, MemoryId};
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::RwLock;

#[derive(Debug, Default)]
pub struct MemoryIndex {
    entries: RwLock<BTreeMap<MemoryId, Indexed>>,
}

#[derive(Debug)]
struct Indexed {
    entry: IndexEntry,
    terms: BTreeSet<String>,
}

impl MemoryIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of indexed entries.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the index holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

fn terms(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

impl VectorIndex for MemoryIndex {
    async fn upsert(&self, entry: IndexEntry) -> Result<(), EgregoreError> {
        let indexed = Indexed {
            terms: terms(&entry.content),
            entry,
        };
        self.entries.write().await.insert(indexed.entry.id, indexed);
        Ok(())
    }

    async fn query(&self, text: &str, limit: usize) -> Result<Vec<ScoredMemory>, EgregoreError> {
        let wanted = terms(text);
        if wanted.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let entries = self.entries.read().await;
        let mut hits: Vec<ScoredMemory> = entries
            .values()
            .filter_map(|indexed| {
                let shared = wanted.intersection(&indexed.terms).count();
                if shared == 0 {
                    return None;
                }
                Some(ScoredMemory {
                    id: indexed.entry.id,
                    content: indexed.entry.content.clone(),
                    score: shared as f64 / wanted.len() as f64,
                    metadata: indexed.entry.metadata.clone(),
                })
            })
            .collect();

        // Best first; ties broken by id so results are stable.
        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn ping(&self) -> Result<(), EgregoreError> {
        Ok(())
    }
}
