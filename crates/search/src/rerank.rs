//! Keyword-boosted reranking of semantic search candidates.

use log::debug;

use crate::error::{Result, SearchError};
use crate::single::Candidate;

/// Boost per matched term at `semantic_weight = 0`.
pub const BOOST_PER_MATCH: f32 = 0.1;

/// Blends semantic distance with keyword presence.
///
/// Each boost term found in a candidate's content (case-insensitive literal
/// substring) lowers its distance by `(1 - semantic_weight) * 0.1`. Distances
/// are not clamped, so a heavily boosted candidate can go below zero.
#[derive(Debug, Clone)]
pub struct HybridReranker {
	terms: Vec<String>,
	semantic_weight: f32,
}

impl HybridReranker {
	/// `semantic_weight` must lie in `[0, 1]`; 1 means pure semantic ranking.
	/// Empty terms are ignored.
	pub fn new<I, S>(boost_terms: I, semantic_weight: f32) -> Result<Self>
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		if !(0.0..=1.0).contains(&semantic_weight) {
			return Err(SearchError::invalid(format!(
				"semantic_weight must be within [0, 1], got {}",
				semantic_weight
			)));
		}
		let terms = boost_terms
			.into_iter()
			.map(|t| t.as_ref().to_lowercase())
			.filter(|t| !t.is_empty())
			.collect();
		Ok(Self { terms, semantic_weight })
	}

	pub fn terms(&self) -> &[String] {
		&self.terms
	}

	/// Number of boost terms present in `content`.
	pub fn matches(&self, content: &str) -> usize {
		let content = content.to_lowercase();
		self.terms.iter().filter(|t| content.contains(t.as_str())).count()
	}

	/// Amount subtracted from a candidate's distance.
	pub fn boost(&self, content: &str) -> f32 {
		self.matches(content) as f32 * (1.0 - self.semantic_weight) * BOOST_PER_MATCH
	}

	/// Apply boosts, stable-sort by adjusted distance and keep the first `k`.
	/// Without boost terms the input order is kept and only truncated.
	pub fn rerank(&self, mut candidates: Vec<Candidate>, k: usize) -> Result<Vec<Candidate>> {
		if k == 0 {
			return Err(SearchError::invalid("k must be at least 1"));
		}

		if !self.terms.is_empty() {
			for candidate in candidates.iter_mut() {
				let boost = self.boost(candidate.content());
				candidate.distance -= boost;
			}
			candidates.sort_by(|a, b| a.distance.total_cmp(&b.distance));
			debug!("reranked {} candidates with {} boost terms", candidates.len(), self.terms.len());
		}

		candidates.truncate(k);
		Ok(candidates)
	}
}
