//! Search over one collection.

use std::sync::Arc;

use embed::Embedder;
use log::debug;
use store::{Document, VectorStore};

use crate::error::{Result, SearchError};

/// A document matched by a search, with its distance to the query.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
	pub document: Document,
	/// Lower is closer. May go negative after hybrid boosting.
	pub distance: f32,
	/// Source collection, set when results from several collections are merged.
	pub source: Option<String>,
}

impl Candidate {
	pub fn new(document: Document, distance: f32) -> Self {
		Self { document, distance, source: None }
	}

	/// Tag the candidate with the collection it came from.
	pub fn tagged(mut self, source: &str) -> Self {
		self.source = Some(source.to_string());
		self
	}

	pub fn content(&self) -> &str {
		&self.document.content
	}

	pub fn filename(&self) -> &str {
		&self.document.filename
	}
}

/// Query text plus the per-collection retrieval options.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
	pub query: String,
	/// Maximum number of candidates per collection (at least 1).
	pub k: usize,
	/// Predicate evaluated by the store before ranking, e.g. `filename LIKE '%2022%'`.
	pub prefilter: Option<String>,
	/// Drop candidates whose distance is strictly greater than this.
	pub distance_threshold: Option<f32>,
}

impl SearchRequest {
	pub fn new(query: impl Into<String>, k: usize) -> Self {
		Self {
			query: query.into(),
			k,
			prefilter: None,
			distance_threshold: None,
		}
	}

	pub fn with_prefilter(mut self, prefilter: impl Into<String>) -> Self {
		self.prefilter = Some(prefilter.into());
		self
	}

	pub fn with_threshold(mut self, threshold: f32) -> Self {
		self.distance_threshold = Some(threshold);
		self
	}

	pub fn validate(&self) -> Result<()> {
		if self.k == 0 {
			return Err(SearchError::invalid("k must be at least 1"));
		}
		if self.distance_threshold.is_some_and(f32::is_nan) {
			return Err(SearchError::invalid("distance threshold must be a number"));
		}
		Ok(())
	}
}

/// Keep candidates with `distance <= threshold`, preserving order.
pub fn apply_threshold(candidates: Vec<Candidate>, threshold: Option<f32>) -> Vec<Candidate> {
	match threshold {
		Some(t) => candidates.into_iter().filter(|c| c.distance <= t).collect(),
		None => candidates,
	}
}

/// Embeds a query and retrieves its nearest neighbours from one collection.
#[derive(Clone)]
pub struct SingleCollectionSearcher {
	store: Arc<dyn VectorStore>,
	embedder: Arc<dyn Embedder>,
}

impl SingleCollectionSearcher {
	pub fn new(store: Arc<dyn VectorStore>, embedder: Arc<dyn Embedder>) -> Self {
		Self { store, embedder }
	}

	/// Embed `query` once and return up to `k` candidates, ascending by distance.
	pub async fn search(&self, collection: &str, request: &SearchRequest) -> Result<Vec<Candidate>> {
		request.validate()?;

		let handle = self
			.store
			.open(collection)
			.await
			.map_err(|e| SearchError::Store(format!("{:#}", e)))?
			.ok_or_else(|| SearchError::NotFound(collection.to_string()))?;

		let vector = self
			.embedder
			.embed(&request.query)
			.await
			.map_err(|e| SearchError::Embedding(format!("{:#}", e)))?;

		let hits = handle
			.search(&vector, request.k, request.prefilter.as_deref())
			.await
			.map_err(|e| SearchError::Store(format!("{:#}", e)))?;

		let mut candidates: Vec<Candidate> = hits
			.into_iter()
			.map(|hit| Candidate::new(hit.document, hit.distance))
			.collect();
		// the store contract is at most k, but don't trust it
		candidates.truncate(request.k);

		let found = candidates.len();
		let candidates = apply_threshold(candidates, request.distance_threshold);
		debug!(
			"search {}: {} hits, {} within threshold {:?}",
			collection, found, candidates.len(), request.distance_threshold
		);
		Ok(candidates)
	}
}
