use thiserror::Error;

/// An article's unit of work did not commit. Nothing from it was written.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to connect to graph store: {0}")]
    Connection(#[source] neo4rs::Error),

    #[error("graph write failed for article {article_id}: {source}")]
    Write {
        article_id: String,
        #[source]
        source: neo4rs::Error,
    },

    #[error("graph store unavailable: {0}")]
    Unavailable(String),

    #[error("constraint violation: {0}")]
    Constraint(String),
}

impl IngestError {
    pub fn is_transient(&self) -> bool {
        !matches!(self, IngestError::Constraint(_))
    }
}
