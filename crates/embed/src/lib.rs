//! Embedding providers for the retrieval engine.
//
// Provides a trait for turning text into fixed-length vectors, plus a local
// fastembed implementation and a zero-vector stub.

use std::sync::Mutex;

use async_trait::async_trait;
use anyhow::{anyhow, bail, Result};
use fastembed::{TextEmbedding, InitOptions, EmbeddingModel};
use log::debug;

/// Trait for generating embeddings from text.
#[async_trait]
pub trait Embedder: Send + Sync {
	async fn embed(&self, text: &str) -> Result<Vec<f32>>;
	/// Embed multiple texts in a batch. Output order matches input order.
	async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;
	/// Return the embedding dimension.
	fn dimension(&self) -> usize;
}

/// Local embedder using fastembed (runs entirely offline once the model is cached).
pub struct LocalEmbedder {
	model: Mutex<TextEmbedding>,
	dim: usize,
}

/// Model names accepted by [`LocalEmbedder::from_name`], with their dimensions.
pub const SUPPORTED_MODELS: &[(&str, usize)] = &[
	("all-minilm-l6-v2", 384),
	("bge-small-en-v1.5", 384),
	("bge-base-en-v1.5", 768),
	("nomic-embed-text-v1.5", 768),
];

impl LocalEmbedder {
	/// Create a new LocalEmbedder with the default model (all-MiniLM-L6-v2, 384 dimensions).
	pub fn new() -> Result<Self> {
		Self::with_model(EmbeddingModel::AllMiniLML6V2, 384)
	}

	/// Create a LocalEmbedder with a specific model.
	pub fn with_model(model_name: EmbeddingModel, dim: usize) -> Result<Self> {
		let mut options = InitOptions::default();
		options.model_name = model_name;
		options.show_download_progress = true;
		let model = TextEmbedding::try_new(options)?;
		Ok(Self { model: Mutex::new(model), dim })
	}

	/// Create a LocalEmbedder from a configuration name such as `bge-small-en-v1.5`.
	pub fn from_name(name: &str) -> Result<Self> {
		let (model, dim) = match name.to_lowercase().as_str() {
			"all-minilm-l6-v2" => (EmbeddingModel::AllMiniLML6V2, 384),
			"bge-small-en-v1.5" => (EmbeddingModel::BGESmallENV15, 384),
			"bge-base-en-v1.5" => (EmbeddingModel::BGEBaseENV15, 768),
			"nomic-embed-text-v1.5" => (EmbeddingModel::NomicEmbedTextV15, 768),
			other => {
				let known: Vec<&str> = SUPPORTED_MODELS.iter().map(|(n, _)| *n).collect();
				bail!("unknown embedding model '{}', expected one of: {}", other, known.join(", "))
			}
		};
		debug!("loading embedding model {} ({} dims)", name, dim);
		Self::with_model(model, dim)
	}

	fn run(&self, texts: Vec<&str>) -> Result<Vec<Vec<f32>>> {
		let mut model = self.model.lock()
			.map_err(|e| anyhow!("Embedding model lock poisoned: {}", e))?;
		let embeddings = model.embed(texts, None)?;
		Ok(embeddings)
	}
}

#[async_trait]
impl Embedder for LocalEmbedder {
	async fn embed(&self, text: &str) -> Result<Vec<f32>> {
		let embeddings = self.run(vec![text])?;
		embeddings.into_iter().next()
			.ok_or_else(|| anyhow!("embedding model returned no vector"))
	}

	async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
		if texts.is_empty() {
			return Ok(vec![]);
		}
		let embeddings = self.run(texts.to_vec())?;
		if embeddings.len() != texts.len() {
			bail!("embedding model returned {} vectors for {} texts", embeddings.len(), texts.len());
		}
		Ok(embeddings)
	}

	fn dimension(&self) -> usize {
		self.dim
	}
}

// Stub implementation (for testing without model download)
pub struct DummyEmbedder;

#[async_trait]
impl Embedder for DummyEmbedder {
	async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
		Ok(vec![0.0; 384])
	}

	async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
		Ok(texts.iter().map(|_| vec![0.0; 384]).collect())
	}

	fn dimension(&self) -> usize {
		384
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_unknown_model_name_is_rejected() {
		let err = LocalEmbedder::from_name("word2vec").err().unwrap();
		assert!(err.to_string().contains("unknown embedding model"));
		assert!(err.to_string().contains("bge-small-en-v1.5"));
	}
}
