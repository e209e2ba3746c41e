//! In-memory graph store for dry runs and tests.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::batch::{EntityKey, GraphWrite, WriteBatch};
use crate::error::IngestError;
use crate::{GraphStats, GraphStore};
use extract::RelationLabel;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphSnapshot {
    /// Article id -> title
    pub articles: BTreeMap<String, String>,
    pub entities: BTreeSet<EntityKey>,
    pub mentioned_in: BTreeSet<(EntityKey, String)>,
    pub co_occurs: BTreeMap<(EntityKey, EntityKey), i64>,
    pub relations: BTreeMap<(EntityKey, RelationLabel, EntityKey), i64>,
}

impl GraphSnapshot {
    /// Weight of the co-occurrence edge between two entities, either order.
    pub fn co_occurrence_weight(&self, a: &EntityKey, b: &EntityKey) -> Option<i64> {
        let key = if a <= b {
            (a.clone(), b.clone())
        } else {
            (b.clone(), a.clone())
        };
        self.co_occurs.get(&key).copied()
    }

    pub fn stats(&self) -> GraphStats {
        GraphStats {
            articles: self.articles.len(),
            entities: self.entities.len(),
            co_occurrence_edges: self.co_occurs.len(),
            relation_edges: self.relations.len(),
        }
    }

    fn require_entity(&self, key: &EntityKey) -> Result<(), IngestError> {
        if self.entities.contains(key) {
            Ok(())
        } else {
            Err(IngestError::Constraint(format!("entity {} does not exist", key)))
        }
    }

    fn apply(&mut self, write: &GraphWrite) -> Result<(), IngestError> {
        match write {
            GraphWrite::UpsertArticle { id, title } => {
                self.articles.entry(id.clone()).or_insert_with(|| title.clone());
            }
            GraphWrite::UpsertEntity(key) => {
                self.entities.insert(key.clone());
            }
            GraphWrite::MentionedIn { entity, article_id } => {
                self.require_entity(entity)?;
                if !self.articles.contains_key(article_id) {
                    return Err(IngestError::Constraint(format!(
                        "article {} does not exist",
                        article_id
                    )));
                }
                self.mentioned_in.insert((entity.clone(), article_id.clone()));
            }
            GraphWrite::CoOccurs { source, target } => {
                self.require_entity(source)?;
                self.require_entity(target)?;
                *self
                    .co_occurs
                    .entry((source.clone(), target.clone()))
                    .or_insert(0) += 1;
            }
            GraphWrite::Relation {
                source,
                label,
                target,
            } => {
                self.require_entity(source)?;
                self.require_entity(target)?;
                *self
                    .relations
                    .entry((source.clone(), label.clone(), target.clone()))
                    .or_insert(0) += 1;
            }
        }
        Ok(())
    }
}

/// Applies each batch under a single lock: the batch is staged on a copy
/// and swapped in only if every write succeeds.
#[derive(Default)]
pub struct MemoryGraphStore {
    state: Mutex<GraphSnapshot>,
    fail_next: AtomicUsize,
}

impl MemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` batches fail with `Unavailable`.
    pub fn fail_next(&self, n: usize) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> GraphSnapshot {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl GraphStore for MemoryGraphStore {
    async fn apply(&self, batch: &WriteBatch) -> Result<(), IngestError> {
        let injected = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(IngestError::Unavailable(format!(
                "injected failure for article {}",
                batch.article_id
            )));
        }

        let mut state = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut staged = state.clone();
        for write in &batch.writes {
            staged.apply(write)?;
        }
        *state = staged;

        Ok(())
    }

    async fn stats(&self) -> Result<GraphStats, IngestError> {
        Ok(self.snapshot().stats())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_constraint_violation_rolls_back_whole_batch() {
        let store = MemoryGraphStore::new();
        let mut batch = WriteBatch::new("a1");
        batch.push(GraphWrite::UpsertArticle {
            id: "a1".to_string(),
            title: "t".to_string(),
        });
        batch.push(GraphWrite::UpsertEntity(EntityKey::new("ORG", "Acme")));
        batch.push(GraphWrite::CoOccurs {
            source: EntityKey::new("ORG", "Acme"),
            target: EntityKey::new("PERSON", "Ghost"),
        });

        let err = store.apply(&batch).await.unwrap_err();
        assert!(!err.is_transient());
        assert_eq!(store.snapshot(), GraphSnapshot::default());
    }

    #[tokio::test]
    async fn test_injected_failures_are_counted_down() {
        let store = MemoryGraphStore::new();
        let batch = WriteBatch::new("a1");

        store.fail_next(2);
        assert!(store.apply(&batch).await.is_err());
        assert!(store.apply(&batch).await.is_err());
        assert!(store.apply(&batch).await.is_ok());
    }

    #[tokio::test]
    async fn test_article_title_set_once() {
        let store = MemoryGraphStore::new();
        for title in ["first", "second"] {
            let mut batch = WriteBatch::new("a1");
            batch.push(GraphWrite::UpsertArticle {
                id: "a1".to_string(),
                title: title.to_string(),
            });
            store.apply(&batch).await.unwrap();
        }

        assert_eq!(store.snapshot().articles["a1"], "first");
        assert_eq!(store.stats().await.unwrap().articles, 1);
    }
}
