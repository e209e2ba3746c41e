use thiserror::Error;

/// Why a single chunk produced no extraction.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("extraction backend unreachable: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("extraction backend returned HTTP {status}")]
    Status { status: u16, transient: bool },

    #[error("malformed extraction response: {0}")]
    MalformedResponse(String),
}

impl ExtractionError {
    /// Whether another attempt may succeed.
    ///
    /// Malformed output counts as transient: generation is sampled, so the
    /// same chunk often parses on the next attempt. The retry count bounds
    /// the cost for a chunk that never does.
    pub fn is_transient(&self) -> bool {
        match self {
            ExtractionError::Transport(_) => true,
            ExtractionError::Status { transient, .. } => *transient,
            ExtractionError::MalformedResponse(_) => true,
        }
    }
}

impl From<serde_json::Error> for ExtractionError {
    fn from(err: serde_json::Error) -> Self {
        ExtractionError::MalformedResponse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(ExtractionError::Status { status: 503, transient: true }.is_transient());
        assert!(!ExtractionError::Status { status: 400, transient: false }.is_transient());
        assert!(ExtractionError::MalformedResponse("eof".to_string()).is_transient());
    }
}
