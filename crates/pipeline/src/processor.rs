use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{info, instrument, warn};

use crate::metrics::{Metrics, TimedOperation};
use crate::retry::RetryPolicy;
use extract::{ArticleRecord, ChunkExtraction, ExtractionBackend, ExtractionError, ResultMerger, TaggedExtraction};
use ingest::{Article, Chunk, ChunkSplitter};

/// How many of an article's chunks were extracted.
///
/// An all-failed tally with an empty record means extraction never ran,
/// as opposed to a succeeded tally with an empty record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChunkTally {
    pub succeeded: usize,
    pub failed: usize,
}

impl ChunkTally {
    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }
}

#[derive(Debug, Clone)]
pub struct ProcessedArticle {
    pub record: ArticleRecord,
    pub tally: ChunkTally,
}

/// Chunks, extracts, and merges one article at a time.
pub struct ArticleProcessor {
    backend: Arc<dyn ExtractionBackend>,
    splitter: ChunkSplitter,
    retry: RetryPolicy,
    chunk_fanout: usize,
    llm_permits: Arc<Semaphore>,
    metrics: Arc<Metrics>,
}

impl ArticleProcessor {
    pub fn new(
        backend: Arc<dyn ExtractionBackend>,
        splitter: ChunkSplitter,
        retry: RetryPolicy,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            backend,
            splitter,
            retry,
            chunk_fanout: 1,
            llm_permits: Arc::new(Semaphore::new(Semaphore::MAX_PERMITS)),
            metrics,
        }
    }

    /// Extract up to `fanout` chunks of one article at once.
    pub fn with_chunk_fanout(mut self, fanout: usize) -> Self {
        self.chunk_fanout = fanout.max(1);
        self
    }

    /// Cap backend calls in flight across every article sharing this processor.
    pub fn with_max_concurrent_calls(mut self, max_calls: usize) -> Self {
        self.llm_permits = Arc::new(Semaphore::new(max_calls.max(1)));
        self
    }

    /// `None` when the article is not admitted (non-news media).
    #[instrument(name = "article", skip_all, fields(article_id = %article.id))]
    pub async fn process(&self, article: &Article) -> Option<ProcessedArticle> {
        self.metrics.record_article_read();

        if !article.is_news() {
            self.metrics.record_article_skipped();
            return None;
        }

        info!(article_id = %article.id, title = %article.title, "Processing article");
        let timer = TimedOperation::start();

        let results: Vec<TaggedExtraction> = stream::iter(self.splitter.chunk_text(&article.id, &article.content))
            .map(|chunk| async move {
                let extraction = self.extract_chunk(&chunk).await;
                (chunk.index, extraction)
            })
            .buffer_unordered(self.chunk_fanout)
            .collect()
            .await;

        let mut tally = ChunkTally::default();
        for (_, extraction) in &results {
            match extraction {
                Some(_) => tally.succeeded += 1,
                None => tally.failed += 1,
            }
        }

        let record = ResultMerger::merge(results).into_record(article.id.clone(), article.title.clone());

        self.metrics.record_extract(
            timer.elapsed(),
            record.entity_count(),
            record.relationships.len(),
        );

        if tally.failed > 0 {
            warn!(
                article_id = %article.id,
                chunks_succeeded = tally.succeeded,
                chunks_failed = tally.failed,
                "Article extracted with failed chunks"
            );
        } else {
            info!(
                article_id = %article.id,
                chunks_succeeded = tally.succeeded,
                entities = record.entity_count(),
                relations = record.relationships.len(),
                "Article extracted"
            );
        }

        Some(ProcessedArticle { record, tally })
    }

    /// `None` once retries are exhausted; the failure is logged and counted.
    async fn extract_chunk(&self, chunk: &Chunk) -> Option<ChunkExtraction> {
        let result = self
            .retry
            .retry_if(
                "extract_chunk",
                || async {
                    let _permit = self.llm_permits.acquire().await.ok();
                    self.backend.extract(&chunk.text).await
                },
                ExtractionError::is_transient,
            )
            .await;

        self.metrics.record_chunk(result.is_ok());

        match result {
            Ok(extraction) => Some(extraction),
            Err(e) => {
                warn!(
                    article_id = %chunk.article_id,
                    chunk_index = chunk.index,
                    chunk_id = %chunk.chunk_id,
                    chars = chunk.char_len(),
                    error = %e,
                    "Chunk extraction failed"
                );
                None
            }
        }
    }
}
