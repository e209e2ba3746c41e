use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Run-wide counters. Only ever incremented.
#[derive(Default)]
pub struct Metrics {
    // Input
    articles_read: AtomicUsize,
    articles_skipped: AtomicUsize,
    malformed_records: AtomicUsize,

    // Extraction
    chunks_succeeded: AtomicUsize,
    chunks_failed: AtomicUsize,
    entities_extracted: AtomicUsize,
    relations_extracted: AtomicUsize,
    records_written: AtomicUsize,

    // Ingestion
    articles_ingested: AtomicUsize,
    ingestion_failures: AtomicUsize,
    rejected_triples: AtomicUsize,

    // Timing (in microseconds)
    total_extract_time_us: AtomicU64,
    total_ingest_time_us: AtomicU64,
}

impl Metrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record_article_read(&self) {
        self.articles_read.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_article_skipped(&self) {
        self.articles_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_malformed(&self) {
        self.malformed_records.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_chunk(&self, success: bool) {
        if success {
            self.chunks_succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.chunks_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_extract(&self, duration: Duration, entities: usize, relations: usize) {
        self.total_extract_time_us
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
        self.entities_extracted.fetch_add(entities, Ordering::Relaxed);
        self.relations_extracted.fetch_add(relations, Ordering::Relaxed);
    }

    pub fn record_written(&self) {
        self.records_written.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_ingest(&self, duration: Duration, success: bool, rejected_triples: usize) {
        self.total_ingest_time_us
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
        self.rejected_triples.fetch_add(rejected_triples, Ordering::Relaxed);
        if success {
            self.articles_ingested.fetch_add(1, Ordering::Relaxed);
        } else {
            self.ingestion_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let records_written = self.records_written.load(Ordering::Relaxed);
        let ingested = self.articles_ingested.load(Ordering::Relaxed)
            + self.ingestion_failures.load(Ordering::Relaxed);

        MetricsSnapshot {
            articles_read: self.articles_read.load(Ordering::Relaxed),
            articles_skipped: self.articles_skipped.load(Ordering::Relaxed),
            malformed_records: self.malformed_records.load(Ordering::Relaxed),
            chunks_succeeded: self.chunks_succeeded.load(Ordering::Relaxed),
            chunks_failed: self.chunks_failed.load(Ordering::Relaxed),
            entities_extracted: self.entities_extracted.load(Ordering::Relaxed),
            relations_extracted: self.relations_extracted.load(Ordering::Relaxed),
            records_written,
            articles_ingested: self.articles_ingested.load(Ordering::Relaxed),
            ingestion_failures: self.ingestion_failures.load(Ordering::Relaxed),
            rejected_triples: self.rejected_triples.load(Ordering::Relaxed),
            avg_extract_time_ms: avg_time_ms(&self.total_extract_time_us, records_written),
            avg_ingest_time_ms: avg_time_ms(&self.total_ingest_time_us, ingested),
        }
    }
}

fn avg_time_ms(total_us: &AtomicU64, count: usize) -> f64 {
    let total = total_us.load(Ordering::Relaxed) as f64;
    if count > 0 {
        total / count as f64 / 1000.0 // Convert to ms
    } else {
        0.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub articles_read: usize,
    pub articles_skipped: usize,
    pub malformed_records: usize,
    pub chunks_succeeded: usize,
    pub chunks_failed: usize,
    pub entities_extracted: usize,
    pub relations_extracted: usize,
    pub records_written: usize,
    pub articles_ingested: usize,
    pub ingestion_failures: usize,
    pub rejected_triples: usize,
    pub avg_extract_time_ms: f64,
    pub avg_ingest_time_ms: f64,
}

pub struct TimedOperation {
    start: Instant,
}

impl TimedOperation {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}
