//! Retrieval, merge and rerank engine.
//
// Single-collection vector search, fan-out across collections with a choice of
// merge strategy, keyword-boosted reranking, and output formatting. Store and
// embedder handles are injected; nothing here keeps state between requests.

pub mod error;
pub mod format;
pub mod keywords;
pub mod multi;
pub mod rerank;
pub mod single;

pub use error::{CollectionFailure, PartialFailure, Result, SearchError};
pub use format::{DocumentRecord, FormattedResult, ResultFormatter, ReturnShape, ScoreLabel};
pub use keywords::extract_boost_terms;
pub use multi::{MergeOptions, MergeStrategy, MultiCollectionSearcher, MultiSearchOutcome};
pub use rerank::HybridReranker;
pub use single::{Candidate, SearchRequest, SingleCollectionSearcher};
