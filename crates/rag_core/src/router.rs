//! Keyword routing of questions to collections.

use crate::config::{RoutingConfig, RoutingRule};

/// Picks the collections most likely to answer a question.
#[derive(Debug, Clone)]
pub struct CollectionRouter {
	rules: Vec<RoutingRule>,
	available: Vec<String>,
	defaults: Vec<String>,
	max_collections: usize,
}

impl CollectionRouter {
	pub fn from_config(config: &RoutingConfig) -> Self {
		Self {
			rules: config.rules.clone(),
			available: config.collections.clone(),
			defaults: config.default_collections.clone(),
			max_collections: config.max_collections.max(1),
		}
	}

	/// Collections whose rule keywords appear in `question`, in rule order.
	/// Falls back to the defaults when nothing matches; the result holds
	/// only available collections, without repeats, capped at `max_collections`.
	pub fn route(&self, question: &str) -> Vec<String> {
		let question = question.to_lowercase();

		let mut matched: Vec<&str> = Vec::new();
		for rule in &self.rules {
			let hit = rule
				.keywords
				.split('|')
				.map(str::trim)
				.filter(|k| !k.is_empty())
				.any(|k| question.contains(&k.to_lowercase()));
			if hit {
				matched.extend(rule.collections.iter().map(String::as_str));
			}
		}
		if matched.is_empty() {
			matched = self.defaults.iter().map(String::as_str).collect();
		}

		let mut routed: Vec<String> = Vec::new();
		for name in matched {
			if routed.len() == self.max_collections {
				break;
			}
			if self.available.iter().any(|a| a == name) && !routed.iter().any(|r| r == name) {
				routed.push(name.to_string());
			}
		}
		routed
	}
}
