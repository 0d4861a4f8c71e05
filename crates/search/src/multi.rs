//! Fan-out search across several collections and merging of their results.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use futures::future::join_all;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::{CollectionFailure, PartialFailure, Result, SearchError};
use crate::single::{Candidate, SearchRequest, SingleCollectionSearcher};

/// How per-collection result lists are combined into one sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeStrategy {
	/// Collections in request order, each in its own rank order.
	#[default]
	Concatenate,
	/// Round-robin by rank across collections in request order.
	Interleave,
	/// Everything sorted by ascending distance, ties in arrival order.
	Best,
}

impl MergeStrategy {
	/// Merge per-collection lists given in request order.
	pub fn merge(self, lists: Vec<Vec<Candidate>>) -> Vec<Candidate> {
		match self {
			MergeStrategy::Concatenate => concatenate(lists),
			MergeStrategy::Interleave => interleave(lists),
			MergeStrategy::Best => best(lists),
		}
	}
}

impl FromStr for MergeStrategy {
	type Err = SearchError;

	fn from_str(s: &str) -> Result<Self> {
		match s.trim().to_lowercase().as_str() {
			"concatenate" => Ok(MergeStrategy::Concatenate),
			"interleave" => Ok(MergeStrategy::Interleave),
			"best" => Ok(MergeStrategy::Best),
			other => Err(SearchError::invalid(format!(
				"merge strategy '{}', expected concatenate, interleave or best",
				other
			))),
		}
	}
}

impl fmt::Display for MergeStrategy {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			MergeStrategy::Concatenate => "concatenate",
			MergeStrategy::Interleave => "interleave",
			MergeStrategy::Best => "best",
		};
		f.write_str(name)
	}
}

pub fn concatenate<T>(lists: Vec<Vec<T>>) -> Vec<T> {
	lists.into_iter().flatten().collect()
}

/// Index 0 of every list, then index 1, and so on; exhausted lists are skipped.
pub fn interleave<T>(lists: Vec<Vec<T>>) -> Vec<T> {
	let total = lists.iter().map(Vec::len).sum();
	let mut iters: Vec<_> = lists.into_iter().map(Vec::into_iter).collect();
	let mut merged = Vec::with_capacity(total);
	while merged.len() < total {
		for iter in iters.iter_mut() {
			if let Some(item) = iter.next() {
				merged.push(item);
			}
		}
	}
	merged
}

/// Flatten and stable-sort by ascending distance.
pub fn best(lists: Vec<Vec<Candidate>>) -> Vec<Candidate> {
	let mut merged = concatenate(lists);
	merged.sort_by(|a, b| a.distance.total_cmp(&b.distance));
	merged
}

/// Options that apply to the merged result of a multi-collection search.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeOptions {
	pub strategy: MergeStrategy,
	/// Keep only this many merged candidates (at least 1 when set).
	pub total_k: Option<usize>,
	/// Per-collection time limit; a timed-out collection counts as failed.
	pub timeout: Option<Duration>,
}

/// Merged candidates plus diagnostics for collections that were skipped.
#[derive(Debug, Clone)]
pub struct MultiSearchOutcome {
	pub candidates: Vec<Candidate>,
	pub partial_failure: Option<PartialFailure>,
}

/// Runs one single-collection search per collection, concurrently, and merges the results.
#[derive(Clone)]
pub struct MultiCollectionSearcher {
	single: SingleCollectionSearcher,
}

impl MultiCollectionSearcher {
	pub fn new(single: SingleCollectionSearcher) -> Self {
		Self { single }
	}

	/// Search `collections` (in request order) with `request.k` results each.
	///
	/// Failing collections are skipped and reported in
	/// [`MultiSearchOutcome::partial_failure`]. If every collection fails, the
	/// first collection's error (in request order) is returned.
	pub async fn search(
		&self,
		collections: &[String],
		request: &SearchRequest,
		options: &MergeOptions,
	) -> Result<MultiSearchOutcome> {
		request.validate()?;
		if options.total_k == Some(0) {
			return Err(SearchError::invalid("total_k must be at least 1"));
		}

		let mut unique: Vec<&str> = Vec::with_capacity(collections.len());
		for name in collections {
			if unique.contains(&name.as_str()) {
				debug!("ignoring repeated collection {}", name);
				continue;
			}
			unique.push(name);
		}
		if unique.is_empty() {
			return Err(SearchError::invalid("at least one collection is required"));
		}

		let calls = unique.iter().map(|&name| self.search_one(name, request, options.timeout));
		let results = join_all(calls).await;

		let mut lists = Vec::with_capacity(unique.len());
		let mut failures = Vec::new();
		for (name, result) in unique.iter().zip(results) {
			match result {
				Ok(candidates) => {
					lists.push(candidates.into_iter().map(|c| c.tagged(name)).collect());
				}
				Err(error) => {
					warn!("skipping collection {}: {}", name, error);
					failures.push(CollectionFailure { collection: name.to_string(), error });
				}
			}
		}

		if lists.is_empty() {
			// every collection failed; escalate the first failure
			let first = failures.swap_remove(0);
			return Err(first.error);
		}

		let mut candidates = options.strategy.merge(lists);
		if let Some(total_k) = options.total_k {
			candidates.truncate(total_k);
		}
		debug!(
			"merged {} candidates from {} collections ({}), {} failed",
			candidates.len(),
			unique.len() - failures.len(),
			options.strategy,
			failures.len()
		);

		let partial_failure = (!failures.is_empty()).then_some(PartialFailure { failures });
		Ok(MultiSearchOutcome { candidates, partial_failure })
	}

	async fn search_one(
		&self,
		collection: &str,
		request: &SearchRequest,
		timeout: Option<Duration>,
	) -> Result<Vec<Candidate>> {
		let call = self.single.search(collection, request);
		match timeout {
			Some(after) => tokio::time::timeout(after, call)
				.await
				.map_err(|_| SearchError::Timeout { collection: collection.to_string(), after })?,
			None => call.await,
		}
	}
}
