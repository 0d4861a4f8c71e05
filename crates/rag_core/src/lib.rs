//! Retrieval orchestration.
//
// High-level API over the search engine: the `search`, `search_many` and
// `hybrid_search` operations with configured defaults, question routing,
// collection introspection and ingestion.

use std::sync::Arc;
use std::time::Duration;

use log::debug;

pub use embed::Embedder;
pub use search::{
	extract_boost_terms, Candidate, CollectionFailure, DocumentRecord, FormattedResult,
	MergeOptions, MergeStrategy, PartialFailure, ResultFormatter, ReturnShape, ScoreLabel,
	SearchError, SearchRequest,
};
pub use store::{Document, VectorStore};

use search::{HybridReranker, MultiCollectionSearcher, Result, SingleCollectionSearcher};

pub mod config;
pub mod ingest;
pub mod router;

pub use config::RagConfig;
pub use ingest::{IngestEvent, IngestOptions, IngestReport, Ingestor, ItemFailure, PlainTextExtractor, TextExtractor};
pub use router::CollectionRouter;

/// Query used to list documents by filename, where ranking is irrelevant.
const NEUTRAL_QUERY: &str = "document";
/// Upper bound on documents returned by a filename lookup.
const FILENAME_LOOKUP_LIMIT: usize = 1000;

/// Per-call options for the retrieval operations.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOptions {
	/// Results to return (per collection for `search_many`).
	pub k: usize,
	pub shape: ReturnShape,
	pub include_distance: bool,
	pub prefilter: Option<String>,
	pub distance_threshold: Option<f32>,
	/// Per-collection timeout for multi-collection calls.
	pub timeout: Option<Duration>,
	pub total_k: Option<usize>,
	pub merge_strategy: MergeStrategy,
	pub semantic_weight: f32,
}

impl Default for QueryOptions {
	fn default() -> Self {
		Self::from(&config::SearchConfig::default())
	}
}

impl From<&config::SearchConfig> for QueryOptions {
	fn from(config: &config::SearchConfig) -> Self {
		Self {
			k: config.k,
			shape: config.shape,
			include_distance: config.include_distance,
			prefilter: None,
			distance_threshold: config.distance_threshold,
			timeout: config.timeout_secs.map(Duration::from_secs),
			total_k: config.total_k,
			merge_strategy: config.merge_strategy,
			semantic_weight: config.semantic_weight,
		}
	}
}

impl QueryOptions {
	fn request(&self, query: &str, k: usize) -> SearchRequest {
		SearchRequest {
			query: query.to_string(),
			k,
			prefilter: self.prefilter.clone(),
			distance_threshold: self.distance_threshold,
		}
	}

	fn formatter(&self) -> ResultFormatter {
		ResultFormatter::new(self.shape, self.include_distance)
	}
}

/// A formatted result plus diagnostics for skipped collections.
#[derive(Debug, Clone)]
pub struct SearchOutput {
	pub result: FormattedResult,
	pub partial_failure: Option<PartialFailure>,
}

/// Basic facts about a collection.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionInfo {
	pub name: String,
	pub row_count: usize,
}

/// Entry point for the orchestration layer.
pub struct Retriever {
	store: Arc<dyn VectorStore>,
	embedder: Arc<dyn Embedder>,
	single: SingleCollectionSearcher,
	multi: MultiCollectionSearcher,
	router: CollectionRouter,
	/// Base options for `retrieve_context`, taken from `[search]`.
	defaults: QueryOptions,
}

impl Retriever {
	pub fn new(store: Arc<dyn VectorStore>, embedder: Arc<dyn Embedder>, router: CollectionRouter) -> Self {
		let single = SingleCollectionSearcher::new(store.clone(), embedder.clone());
		let multi = MultiCollectionSearcher::new(single.clone());
		Self { store, embedder, single, multi, router, defaults: QueryOptions::default() }
	}

	/// Routing rules come from `[routing]`; `retrieve_context` uses `[search]`
	/// for weight, threshold and timeout.
	pub fn from_config(store: Arc<dyn VectorStore>, embedder: Arc<dyn Embedder>, config: &RagConfig) -> Self {
		let mut retriever = Self::new(store, embedder, CollectionRouter::from_config(&config.routing));
		retriever.defaults = QueryOptions::from(&config.search);
		retriever
	}

	/// Search one collection.
	pub async fn search(&self, collection: &str, query: &str, options: &QueryOptions) -> Result<FormattedResult> {
		let candidates = self.single.search(collection, &options.request(query, options.k)).await?;
		Ok(options.formatter().format(&candidates))
	}

	/// Search several collections with `options.k` results each and merge them.
	pub async fn search_many(&self, collections: &[String], query: &str, options: &QueryOptions) -> Result<SearchOutput> {
		let merge = MergeOptions {
			strategy: options.merge_strategy,
			total_k: options.total_k,
			timeout: options.timeout,
		};
		let outcome = self.multi.search(collections, &options.request(query, options.k), &merge).await?;
		Ok(SearchOutput {
			result: options.formatter().format(&outcome.candidates),
			partial_failure: outcome.partial_failure,
		})
	}

	/// Semantic search followed by keyword-boosted reranking down to `options.k`.
	///
	/// A single collection is searched for `2k` candidates; several
	/// collections are searched for `k` each and concatenated before reranking.
	pub async fn hybrid_search(
		&self,
		collections: &[String],
		query: &str,
		boost_terms: &[String],
		options: &QueryOptions,
	) -> Result<SearchOutput> {
		let reranker = HybridReranker::new(boost_terms, options.semantic_weight)?;

		let (candidates, partial_failure) = match collections {
			[collection] => {
				let request = options.request(query, options.k.saturating_mul(2));
				(self.single.search(collection, &request).await?, None)
			}
			_ => {
				let merge = MergeOptions {
					strategy: MergeStrategy::Concatenate,
					total_k: None,
					timeout: options.timeout,
				};
				let outcome = self.multi.search(collections, &options.request(query, options.k), &merge).await?;
				(outcome.candidates, outcome.partial_failure)
			}
		};

		let reranked = reranker.rerank(candidates, options.k)?;
		debug!("hybrid search kept {} candidates for {:?}", reranked.len(), reranker.terms());
		Ok(SearchOutput {
			result: options.formatter().with_score_label(ScoreLabel::Score).format(&reranked),
			partial_failure,
		})
	}

	/// Document context for a question: route it to collections, then run a
	/// hybrid search (one collection) or a best-merged multi search.
	pub async fn retrieve_context(&self, question: &str, k: usize) -> Result<SearchOutput> {
		if k == 0 {
			return Err(SearchError::InvalidArgument("k must be at least 1".into()));
		}
		let collections = self.router.route(question);
		let boost_terms = extract_boost_terms(question);
		debug!("routed to {:?} with boost terms {:?}", collections, boost_terms);

		let options = QueryOptions {
			k,
			shape: ReturnShape::Content,
			include_distance: false,
			..self.defaults.clone()
		};
		match collections.len() {
			0 => Err(SearchError::NotFound(format!("no configured collection for question '{}'", question))),
			1 => self.hybrid_search(&collections, question, &boost_terms, &options).await,
			n => {
				let options = QueryOptions {
					k: (k / n).max(2),
					total_k: Some(k),
					merge_strategy: MergeStrategy::Best,
					..options
				};
				self.search_many(&collections, question, &options).await
			}
		}
	}

	/// Collection ids known to the store.
	pub async fn list_collections(&self) -> Result<Vec<String>> {
		self.store
			.collection_names()
			.await
			.map_err(|e| SearchError::Store(format!("{:#}", e)))
	}

	pub async fn collection_info(&self, collection: &str) -> Result<CollectionInfo> {
		let handle = self.open(collection).await?;
		let row_count = handle.count().await.map_err(|e| SearchError::Store(format!("{:#}", e)))?;
		Ok(CollectionInfo { name: collection.to_string(), row_count })
	}

	/// Documents whose filename matches the SQL `LIKE` pattern, e.g. `'%2022%'`.
	/// Distances are never included.
	pub async fn documents_by_filename(&self, collection: &str, pattern: &str, shape: ReturnShape) -> Result<FormattedResult> {
		let handle = self.open(collection).await?;
		let vector = self
			.embedder
			.embed(NEUTRAL_QUERY)
			.await
			.map_err(|e| SearchError::Embedding(format!("{:#}", e)))?;
		let filter = format!("filename LIKE '{}'", pattern.replace('\'', "''"));
		let hits = handle
			.search(&vector, FILENAME_LOOKUP_LIMIT, Some(&filter))
			.await
			.map_err(|e| SearchError::Store(format!("{:#}", e)))?;

		let candidates: Vec<Candidate> = hits.into_iter().map(|h| Candidate::new(h.document, h.distance)).collect();
		Ok(ResultFormatter::new(shape, false).format(&candidates))
	}

	async fn open(&self, collection: &str) -> Result<Arc<dyn store::Collection>> {
		self.store
			.open(collection)
			.await
			.map_err(|e| SearchError::Store(format!("{:#}", e)))?
			.ok_or_else(|| SearchError::NotFound(collection.to_string()))
	}
}
