//! In-memory vector store.
//!
//! Brute-force squared-L2 search over each collection, matching the default
//! metric LanceDB reports in `_distance`. Used for tests and small fixtures.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{Collection, Document, Filter, ScoredDocument, VectorStore};

/// Store keeping every collection in memory.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<BTreeMap<String, Arc<MemoryCollection>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from `(collection, documents)` pairs. Each document's
    /// `collection` field is overwritten with its owning collection id.
    pub fn with_collections<I>(collections: I) -> Self
    where
        I: IntoIterator<Item = (String, Vec<Document>)>,
    {
        let map = collections
            .into_iter()
            .map(|(name, docs)| {
                let collection = MemoryCollection::new(&name, docs);
                (name, Arc::new(collection))
            })
            .collect();
        Self { collections: RwLock::new(map) }
    }
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn collection_names(&self) -> Result<Vec<String>> {
        Ok(self.collections.read().await.keys().cloned().collect())
    }

    async fn open(&self, name: &str) -> Result<Option<Arc<dyn Collection>>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(name)
            .map(|c| c.clone() as Arc<dyn Collection>))
    }

    async fn replace_collection(&self, name: &str, documents: Vec<Document>) -> Result<usize> {
        if documents.is_empty() {
            bail!("refusing to create collection '{}' without documents", name);
        }
        let count = documents.len();
        let collection = MemoryCollection::new(name, documents);
        self.collections.write().await.insert(name.to_string(), Arc::new(collection));
        Ok(count)
    }
}

/// One in-memory collection.
pub struct MemoryCollection {
    name: String,
    documents: Vec<Document>,
}

impl MemoryCollection {
    fn new(name: &str, documents: Vec<Document>) -> Self {
        let documents = documents
            .into_iter()
            .map(|mut d| {
                d.collection = name.to_string();
                d
            })
            .collect();
        Self { name: name.to_string(), documents }
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

#[async_trait]
impl Collection for MemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search(&self, query: &[f32], k: usize, filter: Option<&str>) -> Result<Vec<ScoredDocument>> {
        let filter = filter.map(Filter::parse).transpose()?;

        let mut scored: Vec<ScoredDocument> = Vec::new();
        for doc in &self.documents {
            if doc.vector.len() != query.len() {
                bail!(
                    "query has {} dimensions but '{}' in '{}' has {}",
                    query.len(), doc.filename, self.name, doc.vector.len()
                );
            }
            if filter.as_ref().is_some_and(|f| !f.matches(doc)) {
                continue;
            }
            scored.push(ScoredDocument {
                distance: squared_l2(query, &doc.vector),
                document: doc.clone(),
            });
        }

        // stable: equal distances keep insertion order
        scored.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        scored.truncate(k);
        Ok(scored)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.documents.len())
    }
}
