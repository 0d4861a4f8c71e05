//! Rendering of ranked candidates into the caller's output shape.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SearchError};
use crate::single::Candidate;

/// Output shape of a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReturnShape {
	/// One string of headed blocks, suitable as LLM context.
	#[default]
	Content,
	/// Content strings only.
	List,
	/// One record per candidate, without the embedding.
	Dict,
}

impl FromStr for ReturnShape {
	type Err = SearchError;

	fn from_str(s: &str) -> Result<Self> {
		match s.trim().to_lowercase().as_str() {
			"content" => Ok(ReturnShape::Content),
			"list" => Ok(ReturnShape::List),
			"dict" => Ok(ReturnShape::Dict),
			other => Err(SearchError::invalid(format!(
				"return shape '{}', expected content, list or dict",
				other
			))),
		}
	}
}

/// Word used for the score annotation in content headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScoreLabel {
	#[default]
	Distance,
	/// Used for hybrid results, whose values are boosted distances.
	Score,
}

impl ScoreLabel {
	fn as_str(self) -> &'static str {
		match self {
			ScoreLabel::Distance => "distance",
			ScoreLabel::Score => "score",
		}
	}
}

/// A document as returned in dict-shaped output. Never carries the vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
	pub filename: String,
	pub filepath: String,
	pub content: String,
	pub collection: String,
	#[serde(skip_serializing_if = "Option::is_none", default)]
	pub source: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none", default)]
	pub distance: Option<f32>,
}

/// A formatted search result.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FormattedResult {
	Content(String),
	List(Vec<String>),
	Dict(Vec<DocumentRecord>),
}

impl FormattedResult {
	pub fn as_content(&self) -> Option<&str> {
		match self {
			FormattedResult::Content(s) => Some(s),
			_ => None,
		}
	}

	pub fn as_list(&self) -> Option<&[String]> {
		match self {
			FormattedResult::List(items) => Some(items),
			_ => None,
		}
	}

	pub fn as_records(&self) -> Option<&[DocumentRecord]> {
		match self {
			FormattedResult::Dict(records) => Some(records),
			_ => None,
		}
	}
}

/// Renders a final ranked candidate sequence.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultFormatter {
	pub shape: ReturnShape,
	pub include_distance: bool,
	pub score_label: ScoreLabel,
}

impl ResultFormatter {
	pub fn new(shape: ReturnShape, include_distance: bool) -> Self {
		Self { shape, include_distance, score_label: ScoreLabel::Distance }
	}

	pub fn with_score_label(mut self, label: ScoreLabel) -> Self {
		self.score_label = label;
		self
	}

	pub fn format(&self, candidates: &[Candidate]) -> FormattedResult {
		match self.shape {
			ReturnShape::Content => FormattedResult::Content(self.content(candidates)),
			ReturnShape::List => {
				FormattedResult::List(candidates.iter().map(|c| c.content().to_string()).collect())
			}
			ReturnShape::Dict => FormattedResult::Dict(candidates.iter().map(|c| self.record(c)).collect()),
		}
	}

	/// `--- Document <n>[ [<source>]]: <filename> ---[ (<label>: <d>)]` then the content.
	fn content(&self, candidates: &[Candidate]) -> String {
		candidates
			.iter()
			.enumerate()
			.map(|(i, c)| {
				let source = c.source.as_ref().map(|s| format!(" [{}]", s)).unwrap_or_default();
				let mut header = format!("--- Document {}{}: {} ---", i + 1, source, c.filename());
				if self.include_distance {
					header.push_str(&format!(" ({}: {:.4})", self.score_label.as_str(), c.distance));
				}
				format!("{}\n{}", header, c.content())
			})
			.collect::<Vec<_>>()
			.join("\n\n")
	}

	fn record(&self, candidate: &Candidate) -> DocumentRecord {
		let doc = &candidate.document;
		DocumentRecord {
			filename: doc.filename.clone(),
			filepath: doc.filepath.clone(),
			content: doc.content.clone(),
			collection: doc.collection.clone(),
			source: candidate.source.clone(),
			distance: self.include_distance.then_some(candidate.distance),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use store::Document;

	fn candidate(name: &str, content: &str, distance: f32, source: Option<&str>) -> Candidate {
		let c = Candidate::new(
			Document {
				filename: name.into(),
				filepath: format!("dataset/{}", name),
				content: content.into(),
				vector: vec![0.25; 8],
				collection: source.unwrap_or("annual_reports").into(),
			},
			distance,
		);
		match source {
			Some(s) => c.tagged(s),
			None => c,
		}
	}

	#[test]
	fn test_content_shape() {
		let candidates = vec![
			candidate("a.pdf", "alpha", 0.12345, None),
			candidate("b.pdf", "beta", 0.5, None),
		];
		let out = ResultFormatter::new(ReturnShape::Content, false).format(&candidates);
		assert_eq!(
			out.as_content().unwrap(),
			"--- Document 1: a.pdf ---\nalpha\n\n--- Document 2: b.pdf ---\nbeta"
		);
	}

	#[test]
	fn test_content_shape_with_source_and_distance() {
		let candidates = vec![candidate("s.pdf", "store text", 0.12345, Some("store_reports"))];
		let out = ResultFormatter::new(ReturnShape::Content, true).format(&candidates);
		assert_eq!(
			out.as_content().unwrap(),
			"--- Document 1 [store_reports]: s.pdf --- (distance: 0.1235)\nstore text"
		);

		let hybrid = ResultFormatter::new(ReturnShape::Content, true)
			.with_score_label(ScoreLabel::Score)
			.format(&[candidate("s.pdf", "x", -0.05, None)]);
		assert_eq!(hybrid.as_content().unwrap(), "--- Document 1: s.pdf --- (score: -0.0500)\nx");
	}

	#[test]
	fn test_empty_content() {
		let out = ResultFormatter::new(ReturnShape::Content, true).format(&[]);
		assert_eq!(out, FormattedResult::Content(String::new()));
	}

	#[test]
	fn test_list_shape() {
		let candidates = vec![candidate("a", "one", 0.1, None), candidate("b", "two", 0.2, None)];
		let out = ResultFormatter::new(ReturnShape::List, true).format(&candidates);
		assert_eq!(out.as_list().unwrap(), &["one".to_string(), "two".to_string()]);
	}

	#[test]
	fn test_dict_shape_never_has_vector() {
		let candidates = vec![candidate("a.pdf", "one", 0.1, Some("annual_reports"))];
		for include_distance in [false, true] {
			let out = ResultFormatter::new(ReturnShape::Dict, include_distance).format(&candidates);
			let json = serde_json::to_value(&out).unwrap();
			let record = &json[0];
			assert!(record.get("vector").is_none());
			assert_eq!(record.get("distance").is_some(), include_distance);
			assert_eq!(record["source"], "annual_reports");
			assert_eq!(record["filename"], "a.pdf");
		}
	}

	#[test]
	fn test_shape_parsing() {
		assert_eq!("DICT".parse::<ReturnShape>().unwrap(), ReturnShape::Dict);
		assert_eq!("list".parse::<ReturnShape>().unwrap(), ReturnShape::List);
		assert!(matches!("table".parse::<ReturnShape>(), Err(SearchError::InvalidArgument(_))));
	}
}
