use anyhow::{Context, Result};
use futures::future;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tokio::io::AsyncBufRead;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, info_span, warn};
use uuid::Uuid;

use crate::metrics::{Metrics, TimedOperation};
use crate::retry::RetryPolicy;
use extract::ArticleRecord;
use index::{GraphIngestor, IngestError, IngestReport};
use ingest::{InputError, JsonlReader};

/// Feeds article records into the graph, one transaction per article.
pub struct RecordLoader {
    ingestor: GraphIngestor,
    retry: RetryPolicy,
    workers: usize,
    metrics: Arc<Metrics>,
    cancel: CancellationToken,
}

impl RecordLoader {
    pub fn new(ingestor: GraphIngestor, retry: RetryPolicy, metrics: Arc<Metrics>) -> Self {
        Self {
            ingestor,
            retry,
            workers: 1,
            metrics,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Ingest one record, retrying transient failures. A record that still
    /// fails has written nothing and is reported to the caller.
    pub async fn load_record(&self, record: &ArticleRecord) -> Result<IngestReport, IngestError> {
        let timer = TimedOperation::start();
        let result = self
            .retry
            .retry_if(
                "ingest_article",
                || self.ingestor.ingest(record),
                IngestError::is_transient,
            )
            .await;

        let rejected = result.as_ref().map(|r| r.rejected_triples).unwrap_or(0);
        self.metrics
            .record_ingest(timer.elapsed(), result.is_ok(), rejected);
        result
    }

    /// Ingest every record in `reader`. Failed articles are logged and
    /// skipped; malformed lines are skipped with a warning.
    pub async fn run<R>(&self, reader: &mut JsonlReader<R>) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let run_id = Uuid::new_v4();
        let span = info_span!("load_run", %run_id, workers = self.workers);

        async {
            let metrics = &self.metrics;
            let records = stream::unfold(Some(reader), move |state| async move {
                let reader = state?;
                loop {
                    match reader.next_record::<ArticleRecord>().await {
                        Ok(Some(record)) => return Some((Ok(record), Some(reader))),
                        Ok(None) => return None,
                        Err(e) if e.is_malformed() => {
                            warn!(error = %e, "Skipping malformed article record");
                            metrics.record_malformed();
                        }
                        Err(e) => return Some((Err::<ArticleRecord, InputError>(e), None)),
                    }
                }
            })
            .take_while(|_| future::ready(!self.cancel.is_cancelled()))
            .map(|item| async move {
                let record = item?;
                if let Err(e) = self.load_record(&record).await {
                    error!(
                        article_id = %record.id,
                        error = %e,
                        "Article ingestion failed, skipping"
                    );
                }
                Ok::<_, InputError>(())
            })
            .buffer_unordered(self.workers);
            let mut records = std::pin::pin!(records);

            while let Some(result) = records.next().await {
                result.context("Failed to read article records")?;
            }

            if self.cancel.is_cancelled() {
                warn!("Load cancelled; stopped between articles");
            }
            info!("Load finished");
            Ok(())
        }
        .instrument(span)
        .await
    }
}
