//! LanceDB storage for embedding rows — the semantic half of the index.
//!
//! One row per embedded chunk: the exact embedded text, its vector, and
//! the filter columns mirrored from the resource row so search constraints
//! push down into the scan. The vector index serves cosine similarity; the
//! FTS inverted index over `content` serves keyword scoring.

use std::path::Path;
use std::sync::Arc;

use arrow::array::{
    Array, FixedSizeListArray, Float32Array, Int32Array, LargeStringArray, RecordBatch,
    RecordBatchIterator, StringArray,
};
use arrow::datatypes::{DataType, Field, Schema};
use futures::TryStreamExt;
use lancedb::DistanceType;
use lancedb::index::Index;
use lancedb::index::scalar::{FtsIndexBuilder, FullTextSearchQuery};
use lancedb::query::{ExecutableQuery, QueryBase};
use tracing::info;

use crate::StoreError;

const EMBEDDINGS_TABLE: &str = "embeddings";

/// An embedding row about to be written.
#[derive(Debug, Clone)]
pub struct NewEmbedding {
    pub resource_key: String,
    pub language: String,
    pub source_type: String,
    pub act_id: Option<String>,
    pub regulation_id: Option<String>,
    pub section_label: Option<String>,
    pub scope_type: Option<String>,
    /// Pipe-delimited (`|17|18|19|`) for LIKE-containment pushdown.
    pub scope_sections: Option<String>,
    pub status: Option<String>,
    pub chunk_index: i32,
    /// Exactly the text that was embedded, post-normalization.
    pub content: String,
    pub embedding: Vec<f32>,
    pub embedding_model: String,
}

/// A row surfaced by vector or keyword search.
#[derive(Debug, Clone)]
pub struct EmbeddingHit {
    pub resource_key: String,
    pub content: String,
    pub embedding: Vec<f32>,
    /// Cosine distance, present on vector-search hits.
    pub distance: Option<f32>,
    /// BM25 score, present on keyword-search hits.
    pub score: Option<f32>,
}

/// LanceDB-backed embedding store.
pub struct EmbeddingStore {
    db: lancedb::Connection,
    dim: usize,
}

impl EmbeddingStore {
    /// Connect to (or create) a LanceDB dataset at the given path.
    pub async fn open(path: &Path, dim: usize) -> Result<Self, StoreError> {
        let uri = path
            .to_str()
            .ok_or_else(|| StoreError::Other("non-UTF8 database path".into()))?;
        let db = lancedb::connect(uri).execute().await?;
        Ok(Self { db, dim })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    fn schema(&self) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("resource_key", DataType::Utf8, false),
            Field::new("language", DataType::Utf8, false),
            Field::new("source_type", DataType::Utf8, false),
            Field::new("act_id", DataType::Utf8, true),
            Field::new("regulation_id", DataType::Utf8, true),
            Field::new("section_label", DataType::Utf8, true),
            Field::new("scope_type", DataType::Utf8, true),
            Field::new("scope_sections", DataType::Utf8, true),
            Field::new("status", DataType::Utf8, true),
            Field::new("chunk_index", DataType::Int32, false),
            Field::new("content", DataType::Utf8, false),
            Field::new(
                "embedding",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    self.dim as i32,
                ),
                false,
            ),
            Field::new("embedding_model", DataType::Utf8, false),
        ]))
    }

    /// Create the embeddings table if it does not exist yet.
    pub async fn ensure_table(&self) -> Result<(), StoreError> {
        let names = self.db.table_names().execute().await?;
        if !names.contains(&EMBEDDINGS_TABLE.to_string()) {
            self.db
                .create_empty_table(EMBEDDINGS_TABLE, self.schema())
                .execute()
                .await?;
            info!(table = EMBEDDINGS_TABLE, dim = self.dim, "created embeddings table");
        }
        Ok(())
    }

    async fn table(&self) -> Result<lancedb::Table, StoreError> {
        Ok(self.db.open_table(EMBEDDINGS_TABLE).execute().await?)
    }

    pub async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.table().await?.count_rows(None).await?)
    }

    /// Idempotently write embedding rows, keyed by `resource_key`.
    pub async fn upsert(&self, rows: &[NewEmbedding]) -> Result<(), StoreError> {
        if rows.is_empty() {
            return Ok(());
        }
        self.ensure_table().await?;
        let batch = self.to_batch(rows)?;
        let schema = batch.schema();
        let reader = RecordBatchIterator::new(vec![Ok(batch)], schema);

        let table = self.table().await?;
        let mut merge = table.merge_insert(&["resource_key"]);
        merge
            .when_matched_update_all(None)
            .when_not_matched_insert_all();
        merge.execute(Box::new(reader)).await?;
        info!(count = rows.len(), "upserted embeddings");
        Ok(())
    }

    /// Build the vector and full-text indices. Run once after bulk ingest;
    /// search works without them but scans instead of seeking. Vector
    /// index training needs a corpus-sized table, so its failure on a
    /// small one downgrades to brute-force scans rather than failing the
    /// ingest.
    pub async fn create_indices(&self) -> Result<(), StoreError> {
        let table = self.table().await?;
        table
            .create_index(&["content"], Index::FTS(FtsIndexBuilder::default()))
            .execute()
            .await?;
        if let Err(e) = table
            .create_index(&["embedding"], Index::Auto)
            .execute()
            .await
        {
            tracing::warn!(error = %e, "vector index not built; searches will scan");
        }
        info!("created search indices");
        Ok(())
    }

    /// Nearest rows to the query vector by cosine distance.
    pub async fn vector_search(
        &self,
        query: &[f32],
        filter: Option<&str>,
        limit: usize,
    ) -> Result<Vec<EmbeddingHit>, StoreError> {
        let table = self.table().await?;
        let mut q = table
            .query()
            .nearest_to(query)?
            .distance_type(DistanceType::Cosine);
        if let Some(f) = filter {
            q = q.only_if(f);
        }
        let batches: Vec<RecordBatch> = q.limit(limit).execute().await?.try_collect().await?;
        parse_hits(&batches)
    }

    /// Rows matching the keyword query, BM25-ranked.
    pub async fn keyword_search(
        &self,
        query: &str,
        filter: Option<&str>,
        limit: usize,
    ) -> Result<Vec<EmbeddingHit>, StoreError> {
        let table = self.table().await?;
        let mut q = table
            .query()
            .full_text_search(FullTextSearchQuery::new(query.to_string()));
        if let Some(f) = filter {
            q = q.only_if(f);
        }
        let batches: Vec<RecordBatch> = q.limit(limit).execute().await?.try_collect().await?;
        parse_hits(&batches)
    }

    fn to_batch(&self, rows: &[NewEmbedding]) -> Result<RecordBatch, StoreError> {
        for row in rows {
            if row.embedding.len() != self.dim {
                return Err(StoreError::Other(format!(
                    "embedding for {} has dim {}, expected {}",
                    row.resource_key,
                    row.embedding.len(),
                    self.dim
                )));
            }
        }

        let strings = |f: &dyn Fn(&NewEmbedding) -> Option<String>| -> Arc<dyn Array> {
            Arc::new(StringArray::from(
                rows.iter().map(f).collect::<Vec<Option<String>>>(),
            ))
        };

        let flat: Vec<f32> = rows.iter().flat_map(|r| r.embedding.iter().copied()).collect();
        let embedding = FixedSizeListArray::try_new(
            Arc::new(Field::new("item", DataType::Float32, true)),
            self.dim as i32,
            Arc::new(Float32Array::from(flat)),
            None,
        )?;

        let batch = RecordBatch::try_new(
            self.schema(),
            vec![
                strings(&|r| Some(r.resource_key.clone())),
                strings(&|r| Some(r.language.clone())),
                strings(&|r| Some(r.source_type.clone())),
                strings(&|r| r.act_id.clone()),
                strings(&|r| r.regulation_id.clone()),
                strings(&|r| r.section_label.clone()),
                strings(&|r| r.scope_type.clone()),
                strings(&|r| r.scope_sections.clone()),
                strings(&|r| r.status.clone()),
                Arc::new(Int32Array::from(
                    rows.iter().map(|r| r.chunk_index).collect::<Vec<i32>>(),
                )),
                strings(&|r| Some(r.content.clone())),
                Arc::new(embedding),
                strings(&|r| Some(r.embedding_model.clone())),
            ],
        )?;
        Ok(batch)
    }
}

fn parse_hits(batches: &[RecordBatch]) -> Result<Vec<EmbeddingHit>, StoreError> {
    let mut hits = Vec::new();
    for batch in batches {
        let keys = string_column(batch, "resource_key")?;
        let contents = string_column(batch, "content")?;
        let distances = float_column(batch, "_distance");
        let scores = float_column(batch, "_score");
        let embeddings = batch
            .column_by_name("embedding")
            .and_then(|c| c.as_any().downcast_ref::<FixedSizeListArray>());

        for i in 0..batch.num_rows() {
            let embedding = embeddings
                .map(|col| {
                    col.value(i)
                        .as_any()
                        .downcast_ref::<Float32Array>()
                        .map(|v| v.values().to_vec())
                        .unwrap_or_default()
                })
                .unwrap_or_default();
            hits.push(EmbeddingHit {
                resource_key: keys[i].clone(),
                content: contents[i].clone(),
                embedding,
                distance: distances.as_ref().map(|d| d[i]),
                score: scores.as_ref().map(|s| s[i]),
            });
        }
    }
    Ok(hits)
}

/// Lance may surface VARCHAR columns as either Utf8 or LargeUtf8.
fn string_column(batch: &RecordBatch, name: &str) -> Result<Vec<String>, StoreError> {
    let col = batch
        .column_by_name(name)
        .ok_or_else(|| StoreError::Other(format!("missing column {name}")))?;
    if let Some(arr) = col.as_any().downcast_ref::<StringArray>() {
        Ok((0..arr.len()).map(|i| arr.value(i).to_string()).collect())
    } else if let Some(arr) = col.as_any().downcast_ref::<LargeStringArray>() {
        Ok((0..arr.len()).map(|i| arr.value(i).to_string()).collect())
    } else {
        Err(StoreError::Other(format!("column {name} is not a string type")))
    }
}

fn float_column(batch: &RecordBatch, name: &str) -> Option<Vec<f32>> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
        .map(|arr| (0..arr.len()).map(|i| arr.value(i)).collect())
}
