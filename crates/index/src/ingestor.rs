use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::GraphStore;
use crate::batch::{EntityKey, GraphWrite, WriteBatch};
use crate::error::IngestError;
use extract::{ArticleRecord, RelationLabel, RelationTriple};

/// Which entity pairs in an article get a `CO_OCCURS_WITH` edge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoOccurrencePolicy {
    /// Every pair of distinct entities, same-type pairs included.
    #[default]
    AllPairs,
    /// Only pairs whose entity types differ.
    CrossType,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IngestOptions {
    pub co_occurrence: CoOccurrencePolicy,
    pub mentioned_in: bool,
}

/// Triples dropped while planning an article's batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectedTriple {
    InvalidLabel(RelationTriple),
    UnknownEndpoint(RelationTriple),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub entities: usize,
    pub co_occurrences: usize,
    pub relations: usize,
    pub rejected_triples: usize,
}

/// Turns article records into keyed, weight-accumulating graph upserts.
pub struct GraphIngestor {
    store: Arc<dyn GraphStore>,
    options: IngestOptions,
}

impl GraphIngestor {
    pub fn new(store: Arc<dyn GraphStore>, options: IngestOptions) -> Self {
        Self { store, options }
    }

    /// Write one record as a single unit of work.
    ///
    /// Re-ingesting the same record creates no new nodes or edges; it adds 1
    /// to each co-occurrence edge and 1 per triple occurrence to relation
    /// edges.
    pub async fn ingest(&self, record: &ArticleRecord) -> Result<IngestReport, IngestError> {
        let (batch, report, rejected) = self.plan(record);

        for rejection in &rejected {
            match rejection {
                RejectedTriple::InvalidLabel(t) => warn!(
                    article_id = %record.id,
                    relation = %t.relation,
                    "Rejected relation with unusable label"
                ),
                RejectedTriple::UnknownEndpoint(t) => warn!(
                    article_id = %record.id,
                    source = %t.source,
                    target = %t.target,
                    "Rejected relation whose endpoints are not entities of the article"
                ),
            }
        }

        self.store.apply(&batch).await?;

        debug!(
            article_id = %record.id,
            writes = batch.len(),
            entities = report.entities,
            co_occurrences = report.co_occurrences,
            relations = report.relations,
            "Article ingested"
        );

        Ok(report)
    }

    /// Build the batch for a record without touching the store.
    pub fn plan(&self, record: &ArticleRecord) -> (WriteBatch, IngestReport, Vec<RejectedTriple>) {
        let mut batch = WriteBatch::new(record.id.clone());
        let mut report = IngestReport::default();
        let mut rejected = Vec::new();

        batch.push(GraphWrite::UpsertArticle {
            id: record.id.clone(),
            title: record.title.clone(),
        });

        let entities: Vec<EntityKey> = record
            .entity_pairs()
            .map(|(entity_type, name)| EntityKey::new(entity_type, name))
            .collect();

        for entity in &entities {
            batch.push(GraphWrite::UpsertEntity(entity.clone()));
        }
        report.entities = entities.len();

        if self.options.mentioned_in {
            for entity in &entities {
                batch.push(GraphWrite::MentionedIn {
                    entity: entity.clone(),
                    article_id: record.id.clone(),
                });
            }
        }

        for (source, target) in co_occurring_pairs(&entities, self.options.co_occurrence) {
            batch.push(GraphWrite::CoOccurs { source, target });
            report.co_occurrences += 1;
        }

        // Relation endpoints are bare names; resolve each to the first
        // entity of the record carrying that name, in type order.
        let mut by_name: HashMap<&str, &EntityKey> = HashMap::new();
        for entity in &entities {
            by_name.entry(entity.name.as_str()).or_insert(entity);
        }

        for triple in &record.relationships {
            let Ok(label) = RelationLabel::parse(&triple.relation) else {
                rejected.push(RejectedTriple::InvalidLabel(triple.clone()));
                continue;
            };
            let (Some(source), Some(target)) = (
                by_name.get(triple.source.as_str()),
                by_name.get(triple.target.as_str()),
            ) else {
                rejected.push(RejectedTriple::UnknownEndpoint(triple.clone()));
                continue;
            };

            batch.push(GraphWrite::Relation {
                source: (*source).clone(),
                label,
                target: (*target).clone(),
            });
            report.relations += 1;
        }
        report.rejected_triples = rejected.len();

        (batch, report, rejected)
    }
}

/// Unordered pairs of distinct entities, each oriented smaller -> larger by
/// `(type, name)` so that one edge exists per pair whatever the input order.
pub fn co_occurring_pairs(
    entities: &[EntityKey],
    policy: CoOccurrencePolicy,
) -> Vec<(EntityKey, EntityKey)> {
    let mut sorted: Vec<&EntityKey> = entities.iter().collect();
    sorted.sort();
    sorted.dedup();

    let mut pairs = Vec::new();
    for (i, a) in sorted.iter().enumerate() {
        for b in &sorted[i + 1..] {
            if policy == CoOccurrencePolicy::CrossType && a.entity_type == b.entity_type {
                continue;
            }
            pairs.push(((*a).clone(), (*b).clone()));
        }
    }
    pairs
}
