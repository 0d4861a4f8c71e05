//! Loading documents into collections.
//
// One directory per collection under the dataset root. Text extraction runs in
// parallel with Rayon, embedding runs in batches, and every file ends up in the
// report as either succeeded or failed.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Result};
use log::{debug, info, warn};
use rayon::prelude::*;

use embed::Embedder;
use store::{Document, VectorStore};

use crate::config::IngestConfig;

/// Trait for extracting text from files. Sync so it can run on the Rayon pool.
pub trait TextExtractor: Send + Sync {
	fn extract_text(&self, path: &Path) -> Result<String>;
}

/// Reads `.txt` and `.md` files as-is.
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
	fn extract_text(&self, path: &Path) -> Result<String> {
		let ext = path.extension().and_then(OsStr::to_str).unwrap_or("").to_lowercase();
		match ext.as_str() {
			"txt" | "md" => Ok(std::fs::read_to_string(path)?),
			other => bail!("unsupported file type '{}'", other),
		}
	}
}

/// Options for configuring the ingestor.
#[derive(Debug, Clone)]
pub struct IngestOptions {
	pub dataset_path: PathBuf,
	pub batch_size: usize,
	pub max_files: Option<usize>,
	pub extensions: Vec<String>,
}

impl Default for IngestOptions {
	fn default() -> Self {
		Self::from(&IngestConfig::default())
	}
}

impl From<&IngestConfig> for IngestOptions {
	fn from(config: &IngestConfig) -> Self {
		Self {
			dataset_path: config.dataset_path.clone(),
			batch_size: config.batch_size,
			max_files: config.max_files,
			extensions: config.extensions.clone(),
		}
	}
}

/// Events emitted during ingestion for progress reporting.
#[derive(Debug)]
pub enum IngestEvent {
	CollectionStarted(String, usize),
	FileExtracted(PathBuf),
	FileFailed(PathBuf, String),
	BatchEmbedded(usize),
	CollectionWritten(String, usize),
	Done,
}

/// A file that could not be ingested.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemFailure {
	pub item: String,
	pub reason: String,
}

/// Outcome of ingesting one collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestReport {
	pub collection: String,
	/// Filenames stored in the collection.
	pub succeeded: Vec<String>,
	pub failed: Vec<ItemFailure>,
	/// Collection-level failure (missing directory, store write error).
	pub error: Option<String>,
}

impl IngestReport {
	fn new(collection: &str) -> Self {
		Self { collection: collection.to_string(), ..Default::default() }
	}

	pub fn is_clean(&self) -> bool {
		self.failed.is_empty() && self.error.is_none()
	}
}

/// Extracts, embeds and stores the files of each collection directory.
pub struct Ingestor<E: TextExtractor> {
	options: IngestOptions,
	extractor: Arc<E>,
	embedder: Arc<dyn Embedder>,
	store: Arc<dyn VectorStore>,
}

impl<E: TextExtractor> Ingestor<E> {
	pub fn new(
		options: IngestOptions,
		extractor: E,
		embedder: Arc<dyn Embedder>,
		store: Arc<dyn VectorStore>,
	) -> Self {
		Self { options, extractor: Arc::new(extractor), embedder, store }
	}

	/// Ingest one collection (no progress reporting).
	pub async fn ingest_collection(&self, collection: &str) -> Result<IngestReport> {
		self.ingest_collection_with_progress(collection, &mut |_| ()).await
	}

	/// Ingest every listed collection. A failing collection is recorded in its
	/// report and does not stop the others.
	pub async fn ingest_all<F>(&self, collections: &[String], mut cb: F) -> Vec<IngestReport>
	where
		F: FnMut(IngestEvent) + Send,
	{
		let mut reports = Vec::with_capacity(collections.len());
		for collection in collections {
			match self.ingest_collection_with_progress(collection, &mut cb).await {
				Ok(report) => reports.push(report),
				Err(e) => {
					warn!("failed to ingest {}: {:#}", collection, e);
					let mut report = IngestReport::new(collection);
					report.error = Some(format!("{:#}", e));
					reports.push(report);
				}
			}
		}
		cb(IngestEvent::Done);
		reports
	}

	/// Ingest `<dataset>/<collection>/`, replacing the collection's contents.
	/// The collection is left untouched when no file succeeds.
	pub async fn ingest_collection_with_progress<F>(&self, collection: &str, cb: &mut F) -> Result<IngestReport>
	where
		F: FnMut(IngestEvent) + Send,
	{
		let dir = self.options.dataset_path.join(collection);
		if !dir.is_dir() {
			bail!("directory {} does not exist", dir.display());
		}

		let mut files = discover_files(&dir, &self.options.extensions)?;
		if let Some(max) = self.options.max_files {
			files.truncate(max);
		}
		cb(IngestEvent::CollectionStarted(collection.to_string(), files.len()));
		info!("ingesting {} files into {}", files.len(), collection);

		let mut report = IngestReport::new(collection);

		// Phase 1: parallel text extraction
		let extractor = self.extractor.clone();
		let extracted: Vec<(PathBuf, Result<String>)> = files
			.into_par_iter()
			.map(|path| {
				let text = extractor.extract_text(&path);
				(path, text)
			})
			.collect();

		let mut pending: Vec<Document> = Vec::new();
		for (path, text) in extracted {
			let filename = file_name(&path);
			match text {
				Ok(content) => {
					cb(IngestEvent::FileExtracted(path.clone()));
					pending.push(Document {
						filename,
						filepath: path.to_string_lossy().into_owned(),
						content,
						vector: vec![],
						collection: collection.to_string(),
					});
				}
				Err(e) => {
					let reason = format!("extraction failed: {:#}", e);
					warn!("{}: {}", path.display(), reason);
					cb(IngestEvent::FileFailed(path, reason.clone()));
					report.failed.push(ItemFailure { item: filename, reason });
				}
			}
		}

		// Phase 2: batched embedding
		let batch_size = self.options.batch_size.max(1);
		let mut documents: Vec<Document> = Vec::with_capacity(pending.len());
		for batch in pending.chunks(batch_size) {
			let texts: Vec<&str> = batch.iter().map(|d| d.content.as_str()).collect();
			match self.embedder.embed_batch(&texts).await {
				Ok(vectors) if vectors.len() == batch.len() => {
					for (doc, vector) in batch.iter().zip(vectors) {
						documents.push(Document { vector, ..doc.clone() });
					}
					cb(IngestEvent::BatchEmbedded(batch.len()));
				}
				Ok(vectors) => {
					let reason = format!("embedding returned {} vectors for {} documents", vectors.len(), batch.len());
					fail_batch(batch, &reason, &mut report, cb);
				}
				Err(e) => {
					let reason = format!("embedding failed: {:#}", e);
					fail_batch(batch, &reason, &mut report, cb);
				}
			}
		}

		if documents.is_empty() {
			warn!("no documents ingested for {}, leaving collection unchanged", collection);
			return Ok(report);
		}

		let names: Vec<String> = documents.iter().map(|d| d.filename.clone()).collect();
		match self.store.replace_collection(collection, documents).await {
			Ok(written) => {
				debug!("stored {} documents in {}", written, collection);
				cb(IngestEvent::CollectionWritten(collection.to_string(), written));
				report.succeeded = names;
			}
			Err(e) => {
				let reason = format!("store write failed: {:#}", e);
				warn!("{}: {}", collection, reason);
				report.failed.extend(names.into_iter().map(|item| ItemFailure { item, reason: reason.clone() }));
				report.error = Some(reason);
			}
		}
		Ok(report)
	}
}

fn fail_batch<F>(batch: &[Document], reason: &str, report: &mut IngestReport, cb: &mut F)
where
	F: FnMut(IngestEvent) + Send,
{
	warn!("{} documents failed: {}", batch.len(), reason);
	for doc in batch {
		cb(IngestEvent::FileFailed(PathBuf::from(&doc.filepath), reason.to_string()));
		report.failed.push(ItemFailure { item: doc.filename.clone(), reason: reason.to_string() });
	}
}

fn file_name(path: &Path) -> String {
	path.file_name()
		.map(|n| n.to_string_lossy().into_owned())
		.unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// Recursively discover files with one of `extensions`, sorted by path.
fn discover_files(root: &Path, extensions: &[String]) -> Result<Vec<PathBuf>> {
	let mut files = Vec::new();
	for entry in walkdir::WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
		let path = entry.path();
		if path.is_file() {
			if let Some(ext) = path.extension().and_then(OsStr::to_str) {
				let ext = ext.to_lowercase();
				if extensions.iter().any(|e| e.eq_ignore_ascii_case(&ext)) {
					files.push(path.to_path_buf());
				}
			}
		}
	}
	files.sort();
	Ok(files)
}
