use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use rag_core::{IngestEvent, IngestOptions, Ingestor, TextExtractor};
use store::{MemoryStore, VectorStore};

/// Plain reads, except files named `corrupt*` which cannot be parsed.
struct PickyExtractor;

impl TextExtractor for PickyExtractor {
    fn extract_text(&self, path: &Path) -> Result<String> {
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        if name.starts_with("corrupt") {
            bail!("unreadable document");
        }
        Ok(fs::read_to_string(path)?)
    }
}

/// Rejects any batch containing the word "poison".
struct PoisonEmbedder;

#[async_trait]
impl embed::Embedder for PoisonEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(vec![text.len() as f32, 0.0])
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.iter().any(|t| t.contains("poison")) {
            bail!("rate limited");
        }
        Ok(texts.iter().map(|t| vec![t.len() as f32, 0.0]).collect())
    }

    fn dimension(&self) -> usize {
        2
    }
}

fn dataset(files: &[(&str, &str)]) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let collection = dir.path().join("annual_reports");
    fs::create_dir_all(&collection).unwrap();
    for (name, content) in files {
        fs::write(collection.join(name), content).unwrap();
    }
    dir
}

fn ingestor(root: &Path, store: Arc<MemoryStore>, batch_size: usize) -> Ingestor<PickyExtractor> {
    let options = IngestOptions {
        dataset_path: root.to_path_buf(),
        batch_size,
        ..IngestOptions::default()
    };
    Ingestor::new(options, PickyExtractor, Arc::new(PoisonEmbedder), store)
}

#[tokio::test]
async fn ingest_reports_every_file() {
    let dir = dataset(&[
        ("a.txt", "Revenue 2021"),
        ("b.txt", "poison pill"),
        ("c.md", "Revenue 2022"),
        ("corrupt.txt", "???"),
        ("notes.pdf", "skipped by extension"),
    ]);
    let store = Arc::new(MemoryStore::new());
    let report = ingestor(dir.path(), store.clone(), 2)
        .ingest_collection("annual_reports")
        .await
        .unwrap();

    assert_eq!(report.succeeded, vec!["c.md"]);
    let failed: Vec<&str> = report.failed.iter().map(|f| f.item.as_str()).collect();
    assert_eq!(failed, vec!["corrupt.txt", "a.txt", "b.txt"]);
    assert!(report.failed[0].reason.contains("unreadable document"));
    assert!(report.failed[1].reason.contains("rate limited"));
    assert!(report.error.is_none());
    assert!(!report.is_clean());

    let collection = store.open("annual_reports").await.unwrap().unwrap();
    assert_eq!(collection.count().await.unwrap(), 1);
}

#[tokio::test]
async fn ingest_replaces_previous_contents() {
    let dir = dataset(&[("a.txt", "one"), ("b.txt", "two"), ("c.txt", "three")]);
    let store = Arc::new(MemoryStore::new());
    let ingestor = ingestor(dir.path(), store.clone(), 10);

    let report = ingestor.ingest_collection("annual_reports").await.unwrap();
    assert!(report.is_clean());
    assert_eq!(report.succeeded, vec!["a.txt", "b.txt", "c.txt"]);

    fs::remove_file(dir.path().join("annual_reports/c.txt")).unwrap();
    ingestor.ingest_collection("annual_reports").await.unwrap();
    let collection = store.open("annual_reports").await.unwrap().unwrap();
    assert_eq!(collection.count().await.unwrap(), 2);
}

#[tokio::test]
async fn ingest_without_successes_leaves_store_untouched() {
    let dir = dataset(&[("poison.txt", "poison"), ("corrupt.md", "x")]);
    let store = Arc::new(MemoryStore::new());
    let report = ingestor(dir.path(), store.clone(), 10)
        .ingest_collection("annual_reports")
        .await
        .unwrap();

    assert!(report.succeeded.is_empty());
    assert_eq!(report.failed.len(), 2);
    assert!(store.open("annual_reports").await.unwrap().is_none());
}

#[tokio::test]
async fn ingest_respects_max_files() {
    let dir = dataset(&[("a.txt", "one"), ("b.txt", "two"), ("c.txt", "three")]);
    let store = Arc::new(MemoryStore::new());
    let options = IngestOptions {
        dataset_path: dir.path().to_path_buf(),
        max_files: Some(2),
        ..IngestOptions::default()
    };
    let report = Ingestor::new(options, PickyExtractor, Arc::new(PoisonEmbedder), store)
        .ingest_collection("annual_reports")
        .await
        .unwrap();
    assert_eq!(report.succeeded, vec!["a.txt", "b.txt"]);
}

#[tokio::test]
async fn ingest_all_continues_past_missing_directory() {
    let dir = dataset(&[("a.txt", "Revenue")]);
    let store = Arc::new(MemoryStore::new());
    let mut events = Vec::new();

    let reports = ingestor(dir.path(), store.clone(), 10)
        .ingest_all(
            &["missing_reports".to_string(), "annual_reports".to_string()],
            |e| events.push(e),
        )
        .await;

    assert_eq!(reports.len(), 2);
    assert!(reports[0].error.as_deref().unwrap().contains("does not exist"));
    assert!(reports[1].is_clean());
    assert_eq!(store.collection_names().await.unwrap(), vec!["annual_reports"]);

    assert!(matches!(events.first(), Some(IngestEvent::CollectionStarted(name, 1)) if name == "annual_reports"));
    assert!(events.iter().any(|e| matches!(e, IngestEvent::CollectionWritten(_, 1))));
    assert!(matches!(events.last(), Some(IngestEvent::Done)));
}
