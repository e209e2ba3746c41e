use anyhow::{Context, Result};
use futures::future;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tokio::io::AsyncBufRead;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

use crate::metrics::Metrics;
use crate::processor::ArticleProcessor;
use crate::sink::RecordSink;
use ingest::{Article, InputError, JsonlReader};

/// Drives the corpus through the article processor into a record sink.
pub struct PipelineRunner {
    processor: ArticleProcessor,
    workers: usize,
    metrics: Arc<Metrics>,
    cancel: CancellationToken,
}

impl PipelineRunner {
    pub fn new(processor: ArticleProcessor, metrics: Arc<Metrics>) -> Self {
        Self {
            processor,
            workers: 1,
            metrics,
            cancel: CancellationToken::new(),
        }
    }

    /// Articles processed concurrently.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Stop taking new articles once `cancel` fires. Articles already in
    /// flight finish and are written.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Read every article from `reader` and write one record per admitted
    /// article to `sink`, in corpus order.
    pub async fn run<R, S>(&self, reader: &mut JsonlReader<R>, sink: &mut S) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        S: RecordSink + ?Sized,
    {
        let run_id = Uuid::new_v4();
        let span = info_span!("extract_run", %run_id, workers = self.workers);

        async {
            let articles = article_stream(reader, &self.metrics)
                .take_while(|_| future::ready(!self.cancel.is_cancelled()))
                .map(|item| async move {
                    match item {
                        Ok(article) => Ok(self.processor.process(&article).await),
                        Err(e) => Err(e),
                    }
                })
                .buffered(self.workers);
            let mut articles = std::pin::pin!(articles);

            while let Some(result) = articles.next().await {
                let Some(processed) = result.context("Failed to read corpus")? else {
                    continue;
                };
                sink.write(&processed.record).await?;
                self.metrics.record_written();
            }
            sink.flush().await?;

            if self.cancel.is_cancelled() {
                warn!("Extraction cancelled; stopped between articles");
            }
            info!("Extraction finished");
            Ok(())
        }
        .instrument(span)
        .await
    }
}

/// Articles from `reader`, skipping malformed lines with a warning.
/// I/O errors are passed through and end the run.
fn article_stream<'a, R>(
    reader: &'a mut JsonlReader<R>,
    metrics: &'a Metrics,
) -> impl futures::Stream<Item = Result<Article, InputError>> + 'a
where
    R: AsyncBufRead + Unpin,
{
    stream::unfold(Some(reader), move |state| async move {
        let reader = state?;
        loop {
            match reader.next_record::<Article>().await {
                Ok(Some(article)) => return Some((Ok(article), Some(reader))),
                Ok(None) => return None,
                Err(e) if e.is_malformed() => {
                    warn!(error = %e, "Skipping malformed corpus record");
                    metrics.record_malformed();
                }
                Err(e) => return Some((Err(e), None)),
            }
        }
    })
}
