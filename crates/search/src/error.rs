//! Error kinds for the retrieval engine.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Result type alias using the engine's error type.
pub type Result<T> = std::result::Result<T, SearchError>;

/// Errors returned by search, merge, rerank and format operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SearchError {
	/// Collection id unknown to the store
	#[error("collection not found: {0}")]
	NotFound(String),

	/// Embedding provider call failed
	#[error("embedding error: {0}")]
	Embedding(String),

	/// Invalid shape, merge strategy, `k`, `total_k` or weight
	#[error("invalid argument: {0}")]
	InvalidArgument(String),

	/// Vector store failed while opening or querying a collection
	#[error("store error: {0}")]
	Store(String),

	/// Per-collection call exceeded the caller's timeout
	#[error("search on '{collection}' timed out after {after:?}")]
	Timeout { collection: String, after: Duration },
}

impl SearchError {
	pub(crate) fn invalid(msg: impl Into<String>) -> Self {
		SearchError::InvalidArgument(msg.into())
	}
}

/// One collection that was skipped during a multi-collection search.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionFailure {
	pub collection: String,
	pub error: SearchError,
}

impl fmt::Display for CollectionFailure {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}: {}", self.collection, self.error)
	}
}

/// Some, but not all, collections of a multi-collection search failed.
///
/// Returned next to the successful results as a diagnostic; it never aborts
/// the call on its own.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{} of the requested collections failed: {}", .failures.len(), display_failures(.failures))]
pub struct PartialFailure {
	pub failures: Vec<CollectionFailure>,
}

impl PartialFailure {
	/// Ids of the failed collections, in request order.
	pub fn collections(&self) -> Vec<&str> {
		self.failures.iter().map(|f| f.collection.as_str()).collect()
	}

	pub fn contains(&self, collection: &str) -> bool {
		self.failures.iter().any(|f| f.collection == collection)
	}
}

fn display_failures(failures: &[CollectionFailure]) -> String {
	failures
		.iter()
		.map(|f| f.to_string())
		.collect::<Vec<_>>()
		.join("; ")
}
