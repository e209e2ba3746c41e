//! News-to-graph pipeline: corpus -> per-article extraction -> merged
//! records -> weighted property graph.

pub mod config;
pub mod loader;
pub mod metrics;
pub mod processor;
pub mod retry;
pub mod runner;
pub mod sink;

pub use config::{BackoffStrategy, ConfigError, PipelineConfig, RetryConfig};
pub use loader::RecordLoader;
pub use metrics::{Metrics, MetricsSnapshot};
pub use processor::{ArticleProcessor, ChunkTally, ProcessedArticle};
pub use retry::RetryPolicy;
pub use runner::PipelineRunner;
pub use sink::{JsonlSink, RecordSink};
