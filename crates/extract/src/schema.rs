use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use ingest::Validate;

/// Entity type -> entity texts, unique within a type, first-seen order.
pub type EntityMap = BTreeMap<String, Vec<String>>;

/// A single entity as returned by the extraction backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityMention {
    #[serde(rename = "type")]
    pub entity_type: String,
    pub text: String,
}

/// `(source, relation, target)`, serialized as a three element array.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "(String, String, String)", into = "(String, String, String)")]
pub struct RelationTriple {
    pub source: String,
    pub relation: String,
    pub target: String,
}

impl RelationTriple {
    pub fn new(
        source: impl Into<String>,
        relation: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            relation: relation.into(),
            target: target.into(),
        }
    }
}

impl From<(String, String, String)> for RelationTriple {
    fn from((source, relation, target): (String, String, String)) -> Self {
        Self {
            source,
            relation,
            target,
        }
    }
}

impl From<RelationTriple> for (String, String, String) {
    fn from(triple: RelationTriple) -> Self {
        (triple.source, triple.relation, triple.target)
    }
}

/// Allow-listed entities and relations found in one chunk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkExtraction {
    pub entities: EntityMap,
    pub relations: Vec<RelationTriple>,
}

impl ChunkExtraction {
    pub fn entity_count(&self) -> usize {
        self.entities.values().map(Vec::len).sum()
    }
}

/// Merged extraction output for one article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleRecord {
    pub id: String,
    pub title: String,
    pub entities: EntityMap,
    pub relationships: Vec<RelationTriple>,
}

impl ArticleRecord {
    /// Every `(type, name)` pair, ordered by type then first-seen order.
    pub fn entity_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entities.iter().flat_map(|(entity_type, names)| {
            names
                .iter()
                .map(move |name| (entity_type.as_str(), name.as_str()))
        })
    }

    pub fn entity_count(&self) -> usize {
        self.entities.values().map(Vec::len).sum()
    }
}

impl Validate for ArticleRecord {
    fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("record id is empty".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_wire_format() {
        let line = r#"{"id":"a1","title":"T","entities":{"ORG":["Acme Corp"],"PERSON":["John Smith"]},"relationships":[["John Smith","works_for","Acme Corp"]]}"#;
        let record: ArticleRecord = serde_json::from_str(line).unwrap();

        assert_eq!(record.relationships[0], RelationTriple::new("John Smith", "works_for", "Acme Corp"));
        assert_eq!(serde_json::to_string(&record).unwrap(), line);
    }

    #[test]
    fn test_entity_pairs() {
        let mut entities = EntityMap::new();
        entities.insert("PERSON".to_string(), vec!["B".to_string(), "A".to_string()]);
        entities.insert("GPE".to_string(), vec!["Paris".to_string()]);
        let record = ArticleRecord {
            id: "a".to_string(),
            title: String::new(),
            entities,
            relationships: Vec::new(),
        };

        let pairs: Vec<_> = record.entity_pairs().collect();
        assert_eq!(pairs, vec![("GPE", "Paris"), ("PERSON", "B"), ("PERSON", "A")]);
        assert_eq!(record.entity_count(), 3);
    }
}
