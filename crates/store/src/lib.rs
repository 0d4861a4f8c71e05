//! Vector storage for the retrieval engine.
//!
//! Documents live in named collections (one LanceDB table per collection).
//! The engine only reads through the [`VectorStore`] and [`Collection`]
//! traits; writes happen at ingest time through [`VectorStore::replace_collection`].

use async_trait::async_trait;
use anyhow::{anyhow, bail, Context, Result};
use std::sync::Arc;
use serde::{Serialize, Deserialize};

use lancedb::connect;
use lancedb::database::CreateTableMode;
use lancedb::query::{QueryBase, ExecutableQuery};
use arrow_array::{
    RecordBatch, RecordBatchIterator, StringArray, Float32Array, FixedSizeListArray,
    ArrayRef, Array,
};
use arrow_array::builder::{FixedSizeListBuilder, Float32Builder};
use arrow_schema::{Schema, Field, DataType};
use futures::TryStreamExt;
use log::debug;

pub mod filter;
pub mod memory;

pub use filter::Filter;
pub use memory::MemoryStore;

/// A document stored in a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub filename: String,
    pub filepath: String,
    pub content: String,
    pub vector: Vec<f32>,
    /// Id of the collection that owns this document.
    pub collection: String,
}

/// A document together with its distance to a query vector.
#[derive(Debug, Clone)]
pub struct ScoredDocument {
    pub document: Document,
    /// Lower is closer.
    pub distance: f32,
}

/// A handle to one collection.
#[async_trait]
pub trait Collection: Send + Sync {
    fn name(&self) -> &str;
    /// Nearest neighbours of `query`, at most `k`, ascending by distance.
    /// `filter` is a SQL-like predicate evaluated before ranking.
    async fn search(&self, query: &[f32], k: usize, filter: Option<&str>) -> Result<Vec<ScoredDocument>>;
    async fn count(&self) -> Result<usize>;
}

/// Trait for a store of named collections.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn collection_names(&self) -> Result<Vec<String>>;
    /// Open a collection. Returns `Ok(None)` when the collection does not exist.
    async fn open(&self, name: &str) -> Result<Option<Arc<dyn Collection>>>;
    /// Create `name` from `documents`, dropping any previous contents.
    async fn replace_collection(&self, name: &str, documents: Vec<Document>) -> Result<usize>;
}

/// LanceDB-backed vector store.
pub struct LanceStore {
    db: lancedb::Connection,
}

impl LanceStore {
    /// Connect to a LanceDB database. Local paths are created if missing.
    pub async fn connect(uri: &str) -> Result<Self> {
        if !uri.contains("://") {
            std::fs::create_dir_all(uri)
                .with_context(|| format!("Failed to create LanceDB directory {}", uri))?;
        }
        let db = connect(uri).execute().await
            .context("Failed to connect to LanceDB")?;
        Ok(Self { db })
    }

    /// Get the Arrow schema for a collection table.
    fn schema(dim: i32) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("filename", DataType::Utf8, false),
            Field::new("filepath", DataType::Utf8, false),
            Field::new("content", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    dim,
                ),
                false,
            ),
        ]))
    }

    /// Create a RecordBatch from a set of documents sharing one dimension.
    fn create_batch(documents: &[Document], dim: i32) -> Result<RecordBatch> {
        let schema = Self::schema(dim);

        let filenames = StringArray::from_iter_values(documents.iter().map(|d| d.filename.as_str()));
        let filepaths = StringArray::from_iter_values(documents.iter().map(|d| d.filepath.as_str()));
        let contents = StringArray::from_iter_values(documents.iter().map(|d| d.content.as_str()));

        let mut list_builder = FixedSizeListBuilder::new(Float32Builder::new(), dim);
        for doc in documents {
            if doc.vector.len() != dim as usize {
                bail!(
                    "document '{}' has a {}-dimensional vector, expected {}",
                    doc.filename, doc.vector.len(), dim
                );
            }
            list_builder.values().append_slice(&doc.vector);
            list_builder.append(true);
        }
        let vectors = list_builder.finish();

        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(filenames) as ArrayRef,
                Arc::new(filepaths) as ArrayRef,
                Arc::new(contents) as ArrayRef,
                Arc::new(vectors) as ArrayRef,
            ],
        )?;

        Ok(batch)
    }
}

#[async_trait]
impl VectorStore for LanceStore {
    async fn collection_names(&self) -> Result<Vec<String>> {
        let names = self.db.table_names().execute().await?;
        Ok(names)
    }

    async fn open(&self, name: &str) -> Result<Option<Arc<dyn Collection>>> {
        match self.db.open_table(name).execute().await {
            Ok(table) => Ok(Some(Arc::new(LanceCollection { name: name.to_string(), table }))),
            Err(lancedb::Error::TableNotFound { .. }) => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to open collection '{}'", name)),
        }
    }

    async fn replace_collection(&self, name: &str, documents: Vec<Document>) -> Result<usize> {
        let first = documents.first()
            .ok_or_else(|| anyhow!("refusing to create collection '{}' without documents", name))?;
        let dim = first.vector.len() as i32;
        let batch = Self::create_batch(&documents, dim)?;

        self.db
            .create_table(name, RecordBatchIterator::new(vec![Ok(batch)], Self::schema(dim)))
            .mode(CreateTableMode::Overwrite)
            .execute()
            .await
            .with_context(|| format!("Failed to write collection '{}'", name))?;

        debug!("wrote {} documents to collection {}", documents.len(), name);
        Ok(documents.len())
    }
}

/// One LanceDB table.
pub struct LanceCollection {
    name: String,
    table: lancedb::Table,
}

impl LanceCollection {
    fn read_batch(&self, batch: &RecordBatch, out: &mut Vec<ScoredDocument>) -> Result<()> {
        let strings = |column: &str| {
            batch
                .column_by_name(column)
                .and_then(|c| c.as_any().downcast_ref::<StringArray>())
                .ok_or_else(|| anyhow!("collection '{}' has no string column '{}'", self.name, column))
        };
        let filenames = strings("filename")?;
        let filepaths = strings("filepath")?;
        let contents = strings("content")?;
        let vectors = batch
            .column_by_name("vector")
            .and_then(|c| c.as_any().downcast_ref::<FixedSizeListArray>())
            .ok_or_else(|| anyhow!("collection '{}' has no vector column", self.name))?;
        let distances = batch
            .column_by_name("_distance")
            .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
            .ok_or_else(|| anyhow!("search on '{}' returned no distances", self.name))?;

        for i in 0..batch.num_rows() {
            let values = vectors.value(i);
            let vector = values
                .as_any()
                .downcast_ref::<Float32Array>()
                .map(|v| v.values().to_vec())
                .unwrap_or_default();

            out.push(ScoredDocument {
                document: Document {
                    filename: filenames.value(i).to_string(),
                    filepath: filepaths.value(i).to_string(),
                    content: contents.value(i).to_string(),
                    vector,
                    collection: self.name.clone(),
                },
                distance: distances.value(i),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Collection for LanceCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search(&self, query: &[f32], k: usize, filter: Option<&str>) -> Result<Vec<ScoredDocument>> {
        let mut search = self.table.vector_search(query.to_vec())?.limit(k);
        if let Some(filter) = filter {
            search = search.only_if(filter);
        }

        let batches = search
            .execute()
            .await?
            .try_collect::<Vec<_>>()
            .await?;

        let mut results = Vec::with_capacity(k);
        for batch in &batches {
            self.read_batch(batch, &mut results)?;
        }
        Ok(results)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.table.count_rows(None).await? as usize)
    }
}
