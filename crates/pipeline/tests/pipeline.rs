use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use extract::{ArticleRecord, ChunkExtraction, ExtractionBackend, ExtractionError, RelationTriple};
use index::{EntityKey, GraphIngestor, IngestOptions, MemoryGraphStore};
use ingest::{ChunkSplitter, JsonlReader};
use pipeline::{
    ArticleProcessor, BackoffStrategy, JsonlSink, Metrics, PipelineRunner, RecordLoader,
    RecordSink, RetryPolicy,
};

/// Finds dictionary names in the chunk text. Chunks containing `#` fail.
struct DictionaryBackend {
    names: Vec<(&'static str, &'static str)>,
    relations: Vec<(&'static str, &'static str, &'static str)>,
}

impl DictionaryBackend {
    fn new() -> Self {
        Self {
            names: vec![
                ("ORG", "Acme Corp"),
                ("PERSON", "John Smith"),
                ("GPE", "Paris"),
                ("ORG", "Globex"),
            ],
            relations: vec![("John Smith", "works for", "Acme Corp")],
        }
    }
}

#[async_trait]
impl ExtractionBackend for DictionaryBackend {
    async fn extract(&self, chunk_text: &str) -> Result<ChunkExtraction, ExtractionError> {
        if chunk_text.contains('#') {
            return Err(ExtractionError::Status {
                status: 503,
                transient: true,
            });
        }

        let mut extraction = ChunkExtraction::default();
        for (entity_type, name) in &self.names {
            if chunk_text.contains(name) {
                extraction
                    .entities
                    .entry(entity_type.to_string())
                    .or_default()
                    .push(name.to_string());
            }
        }
        for (source, relation, target) in &self.relations {
            if chunk_text.contains(source) && chunk_text.contains(target) {
                extraction
                    .relations
                    .push(RelationTriple::new(*source, *relation, *target));
            }
        }
        Ok(extraction)
    }
}

fn corpus_line(id: &str, media: &str, content: &str) -> String {
    serde_json::json!({
        "id": id,
        "title": format!("Title {}", id),
        "media-type": media,
        "content": content,
    })
    .to_string()
}

fn runner(chunk_size: usize, metrics: &Arc<Metrics>) -> PipelineRunner {
    let processor = ArticleProcessor::new(
        Arc::new(DictionaryBackend::new()),
        ChunkSplitter::new(chunk_size).unwrap(),
        RetryPolicy::new(2, 0, 0, BackoffStrategy::Fixed),
        metrics.clone(),
    )
    .with_chunk_fanout(2);

    PipelineRunner::new(processor, metrics.clone()).with_workers(3)
}

async fn extract_all(corpus: &str, chunk_size: usize, metrics: &Arc<Metrics>) -> Vec<ArticleRecord> {
    let mut reader = JsonlReader::new(corpus.as_bytes());
    let mut records: Vec<ArticleRecord> = Vec::new();
    runner(chunk_size, metrics)
        .run(&mut reader, &mut records)
        .await
        .unwrap();
    records
}

fn loader(store: &Arc<MemoryGraphStore>, metrics: &Arc<Metrics>, retries: usize) -> RecordLoader {
    let ingestor = GraphIngestor::new(store.clone(), IngestOptions::default());
    RecordLoader::new(
        ingestor,
        RetryPolicy::new(retries, 0, 0, BackoffStrategy::Exponential),
        metrics.clone(),
    )
}

#[tokio::test]
async fn short_article_end_to_end() {
    let metrics = Metrics::new();
    let corpus = corpus_line("a1", "News", "Short text mentioning Acme Corp and John Smith.");

    let records = extract_all(&corpus, 3000, &metrics).await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].entities["ORG"], vec!["Acme Corp"]);
    assert_eq!(records[0].entities["PERSON"], vec!["John Smith"]);
    assert_eq!(records[0].entities.len(), 2);

    let store = Arc::new(MemoryGraphStore::new());
    let loader = loader(&store, &metrics, 0);
    loader.load_record(&records[0]).await.unwrap();

    let acme = EntityKey::new("ORG", "Acme Corp");
    let john = EntityKey::new("PERSON", "John Smith");
    let snapshot = store.snapshot();
    assert_eq!(snapshot.co_occurs.len(), 1);
    assert_eq!(snapshot.co_occurrence_weight(&acme, &john), Some(1));

    // Second ingestion of the same record
    loader.load_record(&records[0]).await.unwrap();
    let again = store.snapshot();
    assert_eq!(again.co_occurrence_weight(&john, &acme), Some(2));
    assert_eq!(again.entities, snapshot.entities);
    assert_eq!(again.articles, snapshot.articles);
    assert_eq!(again.relations.values().copied().collect::<Vec<_>>(), vec![2]);
}

#[tokio::test]
async fn non_news_article_produces_nothing() {
    let metrics = Metrics::new();
    let corpus = corpus_line("b1", "Blog", "Acme Corp and John Smith.");

    let records = extract_all(&corpus, 3000, &metrics).await;
    assert!(records.is_empty());

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.articles_read, 1);
    assert_eq!(snapshot.articles_skipped, 1);
    assert_eq!(snapshot.chunks_succeeded + snapshot.chunks_failed, 0);
}

#[tokio::test]
async fn failed_middle_chunk_is_isolated() {
    let metrics = Metrics::new();
    // Three 10-character chunks; the middle one fails on every attempt
    let content = "Paris ....####......Globex ...";
    assert_eq!(ChunkSplitter::new(10).unwrap().chunk_count(content), 3);
    let corpus = corpus_line("c1", "News", content);

    let records = extract_all(&corpus, 10, &metrics).await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].entities["GPE"], vec!["Paris"]);
    assert_eq!(records[0].entities["ORG"], vec!["Globex"]);

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.chunks_failed, 1);
    assert_eq!(snapshot.chunks_succeeded, 2);
}

#[tokio::test]
async fn malformed_lines_are_skipped_and_order_is_kept() {
    let metrics = Metrics::new();
    let corpus = [
        corpus_line("a1", "News", "Acme Corp"),
        "{broken".to_string(),
        r#"{"id":"a2","title":"no content","media-type":"News"}"#.to_string(),
        corpus_line("a3", "News", "Paris"),
        corpus_line("a4", "News", "John Smith"),
    ]
    .join("\n");

    let records = extract_all(&corpus, 3000, &metrics).await;
    let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["a1", "a3", "a4"]);
    assert_eq!(metrics.snapshot().malformed_records, 2);
}

#[tokio::test]
async fn records_round_trip_through_jsonl_into_graph() {
    let metrics = Metrics::new();
    let corpus = [
        corpus_line("a1", "News", "John Smith joined Acme Corp in Paris."),
        corpus_line("a2", "News", "Acme Corp bought Globex."),
        corpus_line("a3", "Blog", "Paris Paris Paris"),
    ]
    .join("\n");

    let mut reader = JsonlReader::new(corpus.as_bytes());
    let mut sink = JsonlSink::new(Vec::new());
    runner(3000, &metrics).run(&mut reader, &mut sink).await.unwrap();
    sink.flush().await.unwrap();
    let written = sink.into_inner();

    let store = Arc::new(MemoryGraphStore::new());
    let mut records = JsonlReader::new(written.as_slice());
    loader(&store, &metrics, 0).run(&mut records).await.unwrap();

    let snapshot = store.snapshot();
    assert_eq!(snapshot.articles.len(), 2);
    assert_eq!(snapshot.entities.len(), 4);
    // a1: three entities -> 3 pairs; a2: one new pair
    assert_eq!(snapshot.co_occurs.len(), 4);
    assert_eq!(
        snapshot.co_occurrence_weight(
            &EntityKey::new("ORG", "Acme Corp"),
            &EntityKey::new("ORG", "Globex")
        ),
        Some(1)
    );
    assert_eq!(metrics.snapshot().articles_ingested, 2);
}

#[tokio::test]
async fn transient_ingestion_failure_is_retried() {
    let metrics = Metrics::new();
    let records = extract_all(&corpus_line("a1", "News", "Acme Corp, Paris"), 3000, &metrics).await;

    let store = Arc::new(MemoryGraphStore::new());
    store.fail_next(1);
    loader(&store, &metrics, 1).load_record(&records[0]).await.unwrap();

    assert_eq!(store.snapshot().co_occurs.values().sum::<i64>(), 1);
}

#[tokio::test]
async fn exhausted_ingestion_leaves_no_partial_writes() {
    let metrics = Metrics::new();
    let corpus = [
        corpus_line("a1", "News", "Acme Corp, Paris"),
        corpus_line("a2", "News", "Globex, John Smith"),
    ]
    .join("\n");
    let records = extract_all(&corpus, 3000, &metrics).await;

    let store = Arc::new(MemoryGraphStore::new());
    let loader = loader(&store, &metrics, 1);

    store.fail_next(2);
    assert!(loader.load_record(&records[0]).await.is_err());
    assert!(store.snapshot().articles.is_empty());

    loader.load_record(&records[1]).await.unwrap();
    let snapshot = store.snapshot();
    assert_eq!(snapshot.articles.keys().collect::<Vec<_>>(), vec!["a2"]);

    let counts = metrics.snapshot();
    assert_eq!(counts.ingestion_failures, 1);
    assert_eq!(counts.articles_ingested, 1);
}

#[tokio::test]
async fn cancelled_run_takes_no_new_articles() {
    let metrics = Metrics::new();
    let corpus = [
        corpus_line("a1", "News", "Acme Corp"),
        corpus_line("a2", "News", "Paris"),
    ]
    .join("\n");

    let cancel = CancellationToken::new();
    cancel.cancel();

    let mut reader = JsonlReader::new(corpus.as_bytes());
    let mut records: Vec<ArticleRecord> = Vec::new();
    runner(3000, &metrics)
        .with_cancellation(cancel)
        .run(&mut reader, &mut records)
        .await
        .unwrap();

    assert!(records.is_empty());
}

#[tokio::test]
async fn invalid_utf8_line_does_not_end_the_run() {
    let metrics = Metrics::new();
    let mut corpus = corpus_line("a1", "News", "Acme Corp").into_bytes();
    corpus.extend_from_slice(b"\n{\"id\":\"a2\",\"content\":\"\xff\xfe\"}\n");
    corpus.extend_from_slice(corpus_line("a3", "News", "Paris").as_bytes());

    let mut reader = JsonlReader::new(corpus.as_slice());
    let mut records: Vec<ArticleRecord> = Vec::new();
    runner(3000, &metrics)
        .run(&mut reader, &mut records)
        .await
        .unwrap();

    let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["a1", "a3"]);
    assert_eq!(metrics.snapshot().malformed_records, 1);
}

#[tokio::test]
async fn concurrent_loading_loses_no_weight_increments() {
    const ARTICLES: usize = 24;

    let metrics = Metrics::new();
    let lines: String = (0..ARTICLES)
        .map(|i| {
            let record = serde_json::json!({
                "id": format!("a{}", i),
                "title": "t",
                "entities": {"ORG": ["Acme Corp"], "PERSON": ["John Smith"]},
                "relationships": [["John Smith", "works for", "Acme Corp"]],
            });
            format!("{}\n", record)
        })
        .collect();

    let store = Arc::new(MemoryGraphStore::new());
    let mut reader = JsonlReader::new(lines.as_bytes());
    loader(&store, &metrics, 0)
        .with_workers(4)
        .run(&mut reader)
        .await
        .unwrap();

    let snapshot = store.snapshot();
    assert_eq!(snapshot.articles.len(), ARTICLES);
    assert_eq!(snapshot.entities.len(), 2);
    assert_eq!(
        snapshot.co_occurrence_weight(
            &EntityKey::new("ORG", "Acme Corp"),
            &EntityKey::new("PERSON", "John Smith")
        ),
        Some(ARTICLES as i64)
    );
    assert_eq!(snapshot.relations.len(), 1);
    assert_eq!(snapshot.relations.values().copied().sum::<i64>(), ARTICLES as i64);
    assert_eq!(metrics.snapshot().articles_ingested, ARTICLES);
}
