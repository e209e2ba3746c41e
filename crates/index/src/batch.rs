use serde::Serialize;
use std::fmt;

use extract::RelationLabel;

/// Uniqueness key of an `Entity` node. Ordered by type, then name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct EntityKey {
    pub entity_type: String,
    pub name: String,
}

impl EntityKey {
    pub fn new(entity_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.entity_type, self.name)
    }
}

/// One keyed upsert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphWrite {
    UpsertArticle {
        id: String,
        title: String,
    },
    UpsertEntity(EntityKey),
    MentionedIn {
        entity: EntityKey,
        article_id: String,
    },
    /// `source < target`; weight starts at 1 and grows by 1 per write.
    CoOccurs {
        source: EntityKey,
        target: EntityKey,
    },
    /// Weight starts at 1 and grows by 1 per write.
    Relation {
        source: EntityKey,
        label: RelationLabel,
        target: EntityKey,
    },
}

/// Every write for one article, applied all-or-nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteBatch {
    pub article_id: String,
    pub writes: Vec<GraphWrite>,
}

impl WriteBatch {
    pub fn new(article_id: impl Into<String>) -> Self {
        Self {
            article_id: article_id.into(),
            writes: Vec::new(),
        }
    }

    pub fn push(&mut self, write: GraphWrite) {
        self.writes.push(write);
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }
}
