//! Configuration file handling.
//!
//! Loads settings from `rag.config.toml` with the following search order:
//! 1. Current directory
//! 2. ~/.config/rag/rag.config.toml (Linux/macOS)
//! 3. ~/.rag/rag.config.toml

use std::path::{Path, PathBuf};
use std::fs;
use serde::{Deserialize, Serialize};
use anyhow::{Context, Result};
use search::{MergeStrategy, ReturnShape};

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RagConfig {
    pub store: StoreConfig,
    pub embedding: EmbeddingConfig,
    pub search: SearchConfig,
    pub routing: RoutingConfig,
    pub ingest: IngestConfig,
}

/// Vector store configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StoreConfig {
    /// LanceDB URI or directory (default: ~/.local/share/rag/lancedb).
    pub uri: Option<String>,
}

/// Embedding model configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// fastembed model name, e.g. "all-minilm-l6-v2" or "bge-small-en-v1.5".
    pub model: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self { model: "all-minilm-l6-v2".into() }
    }
}

/// Default search options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Number of results (per collection for multi-collection searches).
    pub k: usize,
    /// Cap on merged results; unset keeps everything.
    pub total_k: Option<usize>,
    pub merge_strategy: MergeStrategy,
    pub shape: ReturnShape,
    /// Weight of semantic distance in hybrid search (1.0 = keywords ignored).
    pub semantic_weight: f32,
    pub include_distance: bool,
    pub distance_threshold: Option<f32>,
    /// Per-collection timeout in seconds.
    pub timeout_secs: Option<u64>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            k: 5,
            total_k: None,
            merge_strategy: MergeStrategy::Best,
            shape: ReturnShape::Content,
            semantic_weight: 0.7,
            include_distance: false,
            distance_threshold: None,
            timeout_secs: None,
        }
    }
}

/// A keyword rule for picking collections from a question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoutingRule {
    /// Alternatives separated by `|`, matched as lowercase substrings.
    pub keywords: String,
    pub collections: Vec<String>,
}

impl RoutingRule {
    fn new(keywords: &str, collections: &[&str]) -> Self {
        Self {
            keywords: keywords.into(),
            collections: collections.iter().map(|c| c.to_string()).collect(),
        }
    }
}

/// Question routing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Collections routing may pick from.
    pub collections: Vec<String>,
    /// Used when no rule matches.
    pub default_collections: Vec<String>,
    pub max_collections: usize,
    pub rules: Vec<RoutingRule>,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            collections: vec![
                "annual_reports".into(),
                "quarterly_reports".into(),
                "store_reports".into(),
                "inventory_receiving".into(),
                "purchase_orders".into(),
            ],
            default_collections: vec![
                "annual_reports".into(),
                "quarterly_reports".into(),
                "store_reports".into(),
            ],
            max_collections: 3,
            rules: vec![
                RoutingRule::new("annual", &["annual_reports"]),
                RoutingRule::new("yearly", &["annual_reports"]),
                RoutingRule::new("quarter", &["quarterly_reports"]),
                RoutingRule::new("q1|q2|q3|q4", &["quarterly_reports"]),
                RoutingRule::new("store", &["store_reports", "sales_receipts"]),
                RoutingRule::new("warehouse", &["warehouse_picking_slips", "inventory_receiving"]),
                RoutingRule::new("inventory", &["inventory_receiving", "warehouse_picking_slips"]),
                RoutingRule::new("purchase order", &["purchase_orders"]),
                RoutingRule::new("promotion|flyer", &["promotional_flyers"]),
                RoutingRule::new("product|catalog", &["product_catalogs"]),
                RoutingRule::new("shipping|manifest", &["shipping_manifests"]),
            ],
        }
    }
}

/// Ingestion configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Root holding one directory per collection.
    pub dataset_path: PathBuf,
    /// Documents per embedding call.
    pub batch_size: usize,
    /// Maximum files per collection; unset ingests everything.
    pub max_files: Option<usize>,
    /// File extensions to ingest.
    pub extensions: Vec<String>,
    /// Collections ingested by `ingest` without arguments.
    pub collections: Vec<String>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            dataset_path: PathBuf::from("dataset"),
            batch_size: 10,
            max_files: None,
            extensions: vec!["txt".into(), "md".into()],
            collections: vec![
                "annual_reports".into(),
                "inventory_receiving".into(),
                "product_catalogs".into(),
                "promotional_flyers".into(),
                "purchase_orders".into(),
                "quarterly_reports".into(),
                "sales_receipts".into(),
                "shipping_manifests".into(),
                "store_reports".into(),
                "warehouse_picking_slips".into(),
            ],
        }
    }
}

impl RagConfig {
    /// Config file name.
    pub const FILENAME: &'static str = "rag.config.toml";

    /// Load configuration from file, searching standard locations.
    /// Returns default config if no file found.
    pub fn load() -> Result<Self> {
        if let Some(path) = Self::find_config_file() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: RagConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// Save configuration to a file.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }

    /// Find config file in standard locations.
    pub fn find_config_file() -> Option<PathBuf> {
        let current = PathBuf::from(Self::FILENAME);
        if current.exists() {
            return Some(current);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let path = config_dir.join("rag").join(Self::FILENAME);
            if path.exists() {
                return Some(path);
            }
        }

        if let Some(home) = dirs::home_dir() {
            let path = home.join(".rag").join(Self::FILENAME);
            if path.exists() {
                return Some(path);
            }
        }

        None
    }

    /// Get the default config file path for the current platform.
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("rag").join(Self::FILENAME))
    }

    /// LanceDB URI (uses store.uri or the platform data directory).
    pub fn store_uri(&self) -> String {
        self.store.uri.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("rag")
                .join("lancedb")
                .to_string_lossy()
                .into_owned()
        })
    }

    /// Generate a default config file with comments.
    pub fn generate_default_config() -> String {
        r#"# Retrieval configuration
# Place this file at:
#   - ./rag.config.toml (current directory)
#   - ~/.config/rag/rag.config.toml (Linux/macOS)
#   - ~/.rag/rag.config.toml

[store]
# LanceDB directory or URI (default: ~/.local/share/rag/lancedb)
# uri = "/data/lancedb"

[embedding]
# all-minilm-l6-v2, bge-small-en-v1.5, bge-base-en-v1.5, nomic-embed-text-v1.5
model = "all-minilm-l6-v2"

[search]
# Results per search (per collection when searching several)
k = 5

# Cap on merged results across collections
# total_k = 10

# How to merge collections: "concatenate", "interleave" or "best"
merge_strategy = "best"

# Output shape: "content", "list" or "dict"
shape = "content"

# Hybrid search: 1.0 is pure semantic, lower values boost keyword matches
semantic_weight = 0.7

include_distance = false

# Drop results farther than this
# distance_threshold = 1.2

# Per-collection timeout in seconds
# timeout_secs = 10

[routing]
collections = ["annual_reports", "quarterly_reports", "store_reports", "inventory_receiving", "purchase_orders"]
default_collections = ["annual_reports", "quarterly_reports", "store_reports"]
max_collections = 3

[[routing.rules]]
keywords = "annual|yearly"
collections = ["annual_reports"]

[[routing.rules]]
keywords = "quarter|q1|q2|q3|q4"
collections = ["quarterly_reports"]

[[routing.rules]]
keywords = "store"
collections = ["store_reports", "sales_receipts"]

[[routing.rules]]
keywords = "warehouse|inventory"
collections = ["inventory_receiving", "warehouse_picking_slips"]

[[routing.rules]]
keywords = "purchase order"
collections = ["purchase_orders"]

[ingest]
# One directory per collection under this path
dataset_path = "dataset"

# Documents per embedding call
batch_size = 10

# max_files = 100
extensions = ["txt", "md"]
"#.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RagConfig::default();
        assert_eq!(config.search.k, 5);
        assert_eq!(config.search.merge_strategy, MergeStrategy::Best);
        assert_eq!(config.routing.max_collections, 3);
        assert_eq!(config.ingest.batch_size, 10);
        assert_eq!(config.ingest.collections.len(), 10);
    }

    #[test]
    fn test_parse_config() {
        let toml_str = r#"
            [store]
            uri = "/tmp/lance"

            [search]
            k = 8
            merge_strategy = "interleave"
            shape = "dict"
            timeout_secs = 3
        "#;

        let config: RagConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.store_uri(), "/tmp/lance");
        assert_eq!(config.search.k, 8);
        assert_eq!(config.search.merge_strategy, MergeStrategy::Interleave);
        assert_eq!(config.search.shape, ReturnShape::Dict);
        assert_eq!(config.search.timeout_secs, Some(3));
        assert_eq!(config.search.semantic_weight, 0.7);
    }

    #[test]
    fn test_generated_config_parses() {
        let config: RagConfig = toml::from_str(&RagConfig::generate_default_config()).unwrap();
        assert_eq!(config.routing.rules.len(), 5);
        assert_eq!(config.search.shape, ReturnShape::Content);
        assert!(config.store.uri.is_none());
    }

    #[test]
    fn test_unknown_strategy_rejected() {
        let result: std::result::Result<RagConfig, _> = toml::from_str("[search]\nmerge_strategy = \"random\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(RagConfig::FILENAME);
        let mut config = RagConfig::default();
        config.search.k = 3;
        config.save_to(&path).unwrap();
        let loaded = RagConfig::load_from(&path).unwrap();
        assert_eq!(loaded.search.k, 3);
        assert_eq!(loaded.routing.rules, config.routing.rules);
    }
}
