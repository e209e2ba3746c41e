use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use extract::{DEFAULT_ENTITY_TYPES, EntityAllowList};
use index::{CoOccurrencePolicy, IngestOptions};
use ingest::{ChunkSplitter, DEFAULT_MAX_CHUNK_CHARS};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid value {value:?} for {var}")]
    InvalidEnv { var: &'static str, value: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("missing required setting: {0}")]
    Missing(&'static str),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub extraction: ExtractionConfig,
    pub concurrency: ConcurrencyConfig,
    /// Per-chunk extraction retries
    pub retry: RetryConfig,
    /// Per-article graph ingestion retries
    pub ingest_retry: RetryConfig,
    pub graph: GraphConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    pub base_url: String,
    pub model: String,
    pub request_timeout_secs: u64,
    /// Maximum characters per chunk sent to the backend
    pub chunk_size: usize,
    pub entity_types: Vec<String>,
    /// Chunks of one article extracted concurrently
    pub chunk_fanout: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcurrencyConfig {
    /// Articles processed concurrently
    pub workers: usize,
    /// Backend calls in flight across all articles
    pub max_concurrent_llm_calls: usize,
    /// Articles ingested concurrently
    pub ingest_workers: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackoffStrategy {
    Fixed,
    Exponential,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: usize,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub strategy: BackoffStrategy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    pub uri: String,
    pub user: String,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub co_occurrence: CoOccurrencePolicy,
    /// Create `MENTIONED_IN` edges from entities to articles
    pub mentioned_in: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            extraction: ExtractionConfig::default(),
            concurrency: ConcurrencyConfig::default(),
            retry: RetryConfig::default(),
            ingest_retry: RetryConfig::ingest_default(),
            graph: GraphConfig::default(),
        }
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "llama3".to_string(),
            request_timeout_secs: 120,
            chunk_size: DEFAULT_MAX_CHUNK_CHARS,
            entity_types: DEFAULT_ENTITY_TYPES.iter().map(|t| t.to_string()).collect(),
            chunk_fanout: 4,
        }
    }
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            max_concurrent_llm_calls: 8,
            ingest_workers: 1,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 5000,
            max_backoff_ms: 5000,
            strategy: BackoffStrategy::Fixed,
        }
    }
}

impl RetryConfig {
    fn ingest_default() -> Self {
        Self {
            max_retries: 2,
            initial_backoff_ms: 500,
            max_backoff_ms: 5000,
            strategy: BackoffStrategy::Exponential,
        }
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            uri: "bolt://localhost:7687".to_string(),
            user: "neo4j".to_string(),
            password: None,
            co_occurrence: CoOccurrencePolicy::AllPairs,
            mentioned_in: false,
        }
    }
}

impl PipelineConfig {
    /// Defaults, then the optional JSON file, then the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|var| std::env::var(var).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("OLLAMA_URL") {
            self.extraction.base_url = url;
        }
        if let Some(model) = lookup("EXTRACT_MODEL") {
            self.extraction.model = model;
        }
        if let Some(uri) = lookup("NEO4J_URI") {
            self.graph.uri = uri;
        }
        if let Some(user) = lookup("NEO4J_USER") {
            self.graph.user = user;
        }
        if let Some(password) = lookup("NEO4J_PASSWORD") {
            self.graph.password = Some(password);
        }
        if let Some(value) = lookup("CHUNK_SIZE") {
            self.extraction.chunk_size = parse_env("CHUNK_SIZE", value)?;
        }
        if let Some(value) = lookup("WORKERS") {
            self.concurrency.workers = parse_env("WORKERS", value)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("extraction.chunk_size", self.extraction.chunk_size),
            ("extraction.chunk_fanout", self.extraction.chunk_fanout),
            ("concurrency.workers", self.concurrency.workers),
            ("concurrency.max_concurrent_llm_calls", self.concurrency.max_concurrent_llm_calls),
            ("concurrency.ingest_workers", self.concurrency.ingest_workers),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{} must be positive", name)));
            }
        }

        if self.extraction.entity_types.iter().all(|t| t.trim().is_empty()) {
            return Err(ConfigError::Invalid(
                "extraction.entity_types must not be empty".to_string(),
            ));
        }
        if self.extraction.base_url.trim().is_empty() {
            return Err(ConfigError::Missing("extraction.base_url"));
        }

        Ok(())
    }

    /// `(uri, user, password)` for commands that write to Neo4j.
    pub fn graph_credentials(&self) -> Result<(&str, &str, &str), ConfigError> {
        let password = self
            .graph
            .password
            .as_deref()
            .filter(|p| !p.is_empty())
            .ok_or(ConfigError::Missing("NEO4J_PASSWORD"))?;
        Ok((&self.graph.uri, &self.graph.user, password))
    }

    pub fn splitter(&self) -> Result<ChunkSplitter, ConfigError> {
        ChunkSplitter::new(self.extraction.chunk_size)
            .ok_or_else(|| ConfigError::Invalid("extraction.chunk_size must be positive".to_string()))
    }

    pub fn allow_list(&self) -> EntityAllowList {
        EntityAllowList::new(
            self.extraction
                .entity_types
                .iter()
                .map(|t| t.trim())
                .filter(|t| !t.is_empty()),
        )
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.extraction.request_timeout_secs)
    }

    pub fn ingest_options(&self) -> IngestOptions {
        IngestOptions {
            co_occurrence: self.graph.co_occurrence,
            mentioned_in: self.graph.mentioned_in,
        }
    }
}

fn parse_env(var: &'static str, value: String) -> Result<usize, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidEnv { var, value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_are_valid() {
        let config = PipelineConfig::default();
        config.validate().unwrap();

        assert_eq!(config.extraction.chunk_size, 3000);
        assert_eq!(config.allow_list(), EntityAllowList::default());
        assert_eq!(config.retry.strategy, BackoffStrategy::Fixed);
        assert_eq!(config.ingest_retry.strategy, BackoffStrategy::Exponential);
        assert!(!config.graph.mentioned_in);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = PipelineConfig::from_json(
            r#"{"extraction": {"chunk_size": 500}, "graph": {"co_occurrence": "cross_type", "mentioned_in": true}}"#,
        )
        .unwrap();

        assert_eq!(config.extraction.chunk_size, 500);
        assert_eq!(config.extraction.model, "llama3");
        assert_eq!(config.graph.co_occurrence, CoOccurrencePolicy::CrossType);
        assert!(config.graph.mentioned_in);
        assert_eq!(config.ingest_retry.max_retries, 2);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("NEO4J_PASSWORD", "secret"),
            ("CHUNK_SIZE", "1200"),
            ("OLLAMA_URL", "http://llm:11434"),
        ]
        .into_iter()
        .collect();

        let mut config = PipelineConfig::default();
        config
            .apply_env(|var| env.get(var).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.extraction.chunk_size, 1200);
        assert_eq!(config.extraction.base_url, "http://llm:11434");
        assert_eq!(config.graph_credentials().unwrap().2, "secret");
    }

    #[test]
    fn test_bad_env_value() {
        let mut config = PipelineConfig::default();
        let err = config
            .apply_env(|var| (var == "WORKERS").then(|| "many".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { var: "WORKERS", .. }));
    }

    #[test]
    fn test_validation_failures() {
        let mut config = PipelineConfig::default();
        config.extraction.chunk_size = 0;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.extraction.entity_types.clear();
        assert!(config.validate().is_err());

        let config = PipelineConfig::default();
        assert!(matches!(
            config.graph_credentials(),
            Err(ConfigError::Missing("NEO4J_PASSWORD"))
        ));
    }
}
