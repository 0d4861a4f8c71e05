//! Boost-term extraction from free-text questions.
//!
//! Pulls out the literal tokens that tend to identify a specific report:
//! years, month names, quarters and store/warehouse numbers.

use std::sync::OnceLock;

use regex::Regex;

const MONTHS: [&str; 12] = [
	"january", "february", "march", "april", "may", "june",
	"july", "august", "september", "october", "november", "december",
];

struct Patterns {
	year: Regex,
	quarter: Regex,
	store: Regex,
	warehouse: Regex,
}

fn patterns() -> &'static Patterns {
	static PATTERNS: OnceLock<Patterns> = OnceLock::new();
	// literal patterns, checked by the tests; compiling them cannot fail at runtime
	PATTERNS.get_or_init(|| Patterns {
		year: Regex::new(r"\b20[12][0-9]\b").expect("valid year pattern"),
		quarter: Regex::new(r"(?i)\bQ[1-4]\b").expect("valid quarter pattern"),
		store: Regex::new(r"[Ss]tore\s*#?(\d+)").expect("valid store pattern"),
		warehouse: Regex::new(r"[Ww]arehouse\s*#?(\d+)").expect("valid warehouse pattern"),
	})
}

/// Extract boost terms from `question`, de-duplicated, in this order:
/// years (2010-2029), month names (lowercase), quarters as written,
/// `Store <n>` and `Warehouse <n>`.
///
/// A term mentioned twice is returned once, so repeating a year in the
/// question does not double its boost.
pub fn extract_boost_terms(question: &str) -> Vec<String> {
	let p = patterns();
	let lower = question.to_lowercase();
	let mut terms: Vec<String> = Vec::new();
	let mut push = |term: String| {
		if !terms.contains(&term) {
			terms.push(term);
		}
	};

	for m in p.year.find_iter(question) {
		push(m.as_str().to_string());
	}
	for month in MONTHS {
		if lower.contains(month) {
			push(month.to_string());
		}
	}
	for m in p.quarter.find_iter(question) {
		push(m.as_str().to_string());
	}
	for cap in p.store.captures_iter(question) {
		push(format!("Store {}", &cap[1]));
	}
	for cap in p.warehouse.captures_iter(question) {
		push(format!("Warehouse {}", &cap[1]));
	}

	terms
}
