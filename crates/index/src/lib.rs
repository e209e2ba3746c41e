pub mod batch;
pub mod error;
pub mod ingestor;
pub mod memory;
pub mod neo4j_store;

pub use batch::{EntityKey, GraphWrite, WriteBatch};
pub use error::IngestError;
pub use ingestor::{CoOccurrencePolicy, GraphIngestor, IngestOptions, IngestReport, RejectedTriple};
pub use memory::{GraphSnapshot, MemoryGraphStore};
pub use neo4j_store::Neo4jStore;

use async_trait::async_trait;

/// A graph backend that can apply one article's writes atomically.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Apply every write in `batch` or none of them. Weight increments are
    /// performed inside the store, never as read-then-write by the caller.
    async fn apply(&self, batch: &WriteBatch) -> Result<(), IngestError>;

    async fn stats(&self) -> Result<GraphStats, IngestError>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct GraphStats {
    pub articles: usize,
    pub entities: usize,
    pub co_occurrence_edges: usize,
    pub relation_edges: usize,
}
