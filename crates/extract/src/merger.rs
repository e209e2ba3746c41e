use std::collections::{BTreeMap, HashSet};

use crate::schema::{ArticleRecord, ChunkExtraction, EntityMap, RelationTriple};

/// Per-chunk result tagged with the chunk's position in the article.
/// `None` marks a chunk whose extraction failed.
pub type TaggedExtraction = (usize, Option<ChunkExtraction>);

/// Folds per-chunk results into one article-level entity map and relation
/// list.
///
/// Entities are unioned per type and deduplicated by exact text, keeping
/// first-seen order. Relations are concatenated in chunk order with no
/// deduplication, so repeated triples still count toward edge weights.
#[derive(Debug, Default)]
pub struct ResultMerger {
    entities: EntityMap,
    seen: BTreeMap<String, HashSet<String>>,
    relationships: Vec<RelationTriple>,
}

impl ResultMerger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge results that may have completed out of order.
    pub fn merge(mut tagged: Vec<TaggedExtraction>) -> Self {
        tagged.sort_by_key(|(index, _)| *index);

        let mut merger = Self::new();
        for (_, extraction) in tagged {
            if let Some(extraction) = extraction {
                merger.push(extraction);
            }
        }
        merger
    }

    pub fn push(&mut self, extraction: ChunkExtraction) {
        for (entity_type, names) in extraction.entities {
            let seen = self.seen.entry(entity_type.clone()).or_default();
            let merged = self.entities.entry(entity_type).or_default();
            for name in names {
                if seen.insert(name.clone()) {
                    merged.push(name);
                }
            }
        }

        self.relationships.extend(extraction.relations);
    }

    pub fn into_record(self, id: String, title: String) -> ArticleRecord {
        ArticleRecord {
            id,
            title,
            entities: self.entities,
            relationships: self.relationships,
        }
    }
}
