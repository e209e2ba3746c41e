pub mod error;
pub mod llm;
pub mod merger;
pub mod normalizer;
pub mod prompt;
pub mod schema;

pub use error::ExtractionError;
pub use llm::OllamaClient;
pub use merger::{ResultMerger, TaggedExtraction};
pub use normalizer::{InvalidLabel, RelationLabel};
pub use schema::{ArticleRecord, ChunkExtraction, EntityMap, EntityMention, RelationTriple};

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{BTreeSet, HashSet};

pub const DEFAULT_ENTITY_TYPES: [&str; 3] = ["GPE", "ORG", "PERSON"];

/// Anything that turns a chunk of text into entities and relation triples.
#[async_trait]
pub trait ExtractionBackend: Send + Sync {
    /// Extract from one chunk. Results are already filtered to the
    /// allow-listed entity types. No partial result is returned on error.
    async fn extract(&self, chunk_text: &str) -> Result<ChunkExtraction, ExtractionError>;
}

/// The entity types kept from extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityAllowList {
    types: BTreeSet<String>,
}

impl Default for EntityAllowList {
    fn default() -> Self {
        Self::new(DEFAULT_ENTITY_TYPES)
    }
}

impl EntityAllowList {
    pub fn new<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            types: types.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, entity_type: &str) -> bool {
        self.types.contains(entity_type)
    }

    pub fn types(&self) -> impl Iterator<Item = &str> {
        self.types.iter().map(String::as_str)
    }

    /// Keep allow-listed entities (deduplicated per type) and the triples
    /// whose source and target are both among them.
    pub fn filter(&self, mentions: Vec<EntityMention>, relations: Vec<RelationTriple>) -> ChunkExtraction {
        let mut extraction = ChunkExtraction::default();
        let mut kept: HashSet<String> = HashSet::new();

        for mention in mentions {
            let text = mention.text.trim();
            if text.is_empty() || !self.contains(&mention.entity_type) {
                continue;
            }

            let names = extraction.entities.entry(mention.entity_type).or_default();
            if !names.iter().any(|n| n == text) {
                names.push(text.to_string());
            }
            kept.insert(text.to_string());
        }

        extraction.relations = relations
            .into_iter()
            .map(|r| RelationTriple::new(r.source.trim(), r.relation.trim(), r.target.trim()))
            .filter(|r| kept.contains(&r.source) && kept.contains(&r.target))
            .collect();

        extraction
    }
}

#[derive(Deserialize)]
struct RawRelation {
    source: String,
    relation: String,
    target: String,
}

#[derive(Deserialize)]
struct RawExtraction {
    entities: Vec<EntityMention>,
    relations: Vec<RawRelation>,
}

/// Parse the backend's JSON reply and apply the allow-list.
pub fn parse_extraction(
    json_str: &str,
    allow_list: &EntityAllowList,
) -> Result<ChunkExtraction, ExtractionError> {
    let raw: RawExtraction = serde_json::from_str(json_str)?;

    let relations = raw
        .relations
        .into_iter()
        .map(|r| RelationTriple::new(r.source, r.relation, r.target))
        .collect();

    Ok(allow_list.filter(raw.entities, relations))
}

/// LLM-backed extraction over an Ollama-compatible endpoint.
pub struct LlmExtractor {
    llm_client: OllamaClient,
    allow_list: EntityAllowList,
}

impl LlmExtractor {
    pub fn new(llm_client: OllamaClient, allow_list: EntityAllowList) -> Self {
        Self {
            llm_client,
            allow_list,
        }
    }
}

#[async_trait]
impl ExtractionBackend for LlmExtractor {
    async fn extract(&self, chunk_text: &str) -> Result<ChunkExtraction, ExtractionError> {
        let types: Vec<&str> = self.allow_list.types().collect();
        let prompt = prompt::build_extraction_prompt(chunk_text, &types);

        let json_str = self.llm_client.generate_json(&prompt).await?;
        let extraction = parse_extraction(&json_str, &self.allow_list)?;

        tracing::debug!(
            model = self.llm_client.model(),
            entities = extraction.entity_count(),
            relations = extraction.relations.len(),
            "Chunk extracted"
        );

        Ok(extraction)
    }
}
