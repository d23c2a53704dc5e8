//! LanceDB-backed vector index implementation.

use crate::embeddings::compute_similarity;
use crate::types::{EmbeddedChunk, RetrievedChunk};
use crate::vector_index::VectorIndex;
use arrow_array::{
    Array, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray,
    UInt32Array, UInt64Array,
};
use arrow_schema::{DataType, Field, Schema};
use async_trait::async_trait;
use cdss_core::{AppError, AppResult};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase, Select};
use lancedb::{DistanceType, Table};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Table holding every chunk.
pub const CHUNKS_TABLE: &str = "chunks";

/// LanceDB-backed vector index for embedded chunks.
///
/// Each row carries an insertion sequence number (`seq`) that survives
/// reopening, so equal similarities are ordered the same way across runs.
pub struct LanceDbIndex {
    table: Table,
    embedding_dim: usize,
    next_seq: AtomicU64,
}

impl std::fmt::Debug for LanceDbIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LanceDbIndex")
            .field("table", &self.table.name())
            .field("embedding_dim", &self.embedding_dim)
            .finish()
    }
}

fn index_err(context: &'static str) -> impl Fn(lancedb::Error) -> AppError {
    move |e| AppError::Index(format!("{}: {}", context, e))
}

impl LanceDbIndex {
    /// Create or open a LanceDB index at `db_path`.
    ///
    /// # Errors
    /// * `AppError::Connectivity` - the database cannot be opened
    /// * `AppError::Index` - an existing table was built for another
    ///   embedding dimension
    pub async fn open(db_path: &Path, embedding_dim: usize) -> AppResult<Self> {
        std::fs::create_dir_all(db_path)?;

        let uri = db_path.to_string_lossy().to_string();
        let conn = lancedb::connect(&uri).execute().await.map_err(|e| {
            AppError::Connectivity(format!("Failed to connect to LanceDB at {}: {}", uri, e))
        })?;

        let table_names = conn
            .table_names()
            .execute()
            .await
            .map_err(|e| AppError::Connectivity(format!("Failed to list tables: {}", e)))?;

        let table = if table_names.iter().any(|name| name == CHUNKS_TABLE) {
            conn.open_table(CHUNKS_TABLE)
                .execute()
                .await
                .map_err(|e| AppError::Connectivity(format!("Failed to open table: {}", e)))?
        } else {
            let schema = Self::create_schema(embedding_dim);
            let empty_batch = RecordBatch::new_empty(schema.clone());

            conn.create_table(
                CHUNKS_TABLE,
                RecordBatchIterator::new(vec![Ok(empty_batch)], schema),
            )
            .execute()
            .await
            .map_err(index_err("Failed to create table"))?
        };

        let index = Self {
            table,
            embedding_dim,
            next_seq: AtomicU64::new(0),
        };
        index.check_table_dimensions().await?;
        let next_seq = index.max_seq().await?.map_or(0, |seq| seq + 1);
        index.next_seq.store(next_seq, Ordering::SeqCst);

        tracing::debug!("Initialized LanceDB index at {:?} (next seq {})", db_path, next_seq);

        Ok(index)
    }

    pub fn dimensions(&self) -> usize {
        self.embedding_dim
    }

    fn create_schema(embedding_dim: usize) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new("seq", DataType::UInt64, false),
            Field::new("source_id", DataType::Utf8, false),
            Field::new("position", DataType::UInt32, false),
            Field::new("content", DataType::Utf8, false),
            Field::new(
                "embedding",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    embedding_dim as i32,
                ),
                false,
            ),
            Field::new("word_count", DataType::UInt64, false),
            Field::new("char_count", DataType::UInt64, false),
        ]))
    }

    async fn check_table_dimensions(&self) -> AppResult<()> {
        let schema = self
            .table
            .schema()
            .await
            .map_err(index_err("Failed to read table schema"))?;

        let field = schema
            .field_with_name("embedding")
            .map_err(|e| AppError::Index(format!("Table has no embedding column: {}", e)))?;

        match field.data_type() {
            DataType::FixedSizeList(_, size) if *size as usize == self.embedding_dim => Ok(()),
            DataType::FixedSizeList(_, size) => Err(AppError::Index(format!(
                "Index was built with {}-dimensional embeddings but the embedder produces {}. Reset the index and ingest again.",
                size, self.embedding_dim
            ))),
            other => Err(AppError::Index(format!(
                "Unexpected embedding column type: {}",
                other
            ))),
        }
    }

    async fn max_seq(&self) -> AppResult<Option<u64>> {
        let batches: Vec<RecordBatch> = self
            .table
            .query()
            .select(Select::columns(&["seq"]))
            .execute()
            .await
            .map_err(index_err("Failed to scan sequence numbers"))?
            .try_collect()
            .await
            .map_err(index_err("Failed to collect sequence numbers"))?;

        let mut max = None;
        for batch in &batches {
            let seqs = column::<UInt64Array>(batch, "seq")?;
            for seq in seqs.values().iter().copied() {
                max = Some(max.map_or(seq, |m: u64| m.max(seq)));
            }
        }
        Ok(max)
    }

    fn chunks_to_batch(&self, chunks: &[EmbeddedChunk], first_seq: u64) -> AppResult<RecordBatch> {
        let schema = Self::create_schema(self.embedding_dim);

        let mut flat = Vec::with_capacity(chunks.len() * self.embedding_dim);
        for chunk in chunks {
            if chunk.embedding.len() != self.embedding_dim {
                return Err(AppError::Index(format!(
                    "Embedding dimension mismatch: expected {}, got {}",
                    self.embedding_dim,
                    chunk.embedding.len()
                )));
            }
            flat.extend_from_slice(&chunk.embedding);
        }

        let ids: Vec<String> = chunks.iter().map(|_| uuid::Uuid::new_v4().to_string()).collect();
        let seqs: Vec<u64> = (first_seq..first_seq + chunks.len() as u64).collect();

        let embedding_array = FixedSizeListArray::try_new(
            Arc::new(Field::new("item", DataType::Float32, true)),
            self.embedding_dim as i32,
            Arc::new(Float32Array::from(flat)),
            None,
        )
        .map_err(|e| AppError::Index(format!("Failed to build embedding column: {}", e)))?;

        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(ids)),
                Arc::new(UInt64Array::from(seqs)),
                Arc::new(StringArray::from_iter_values(
                    chunks.iter().map(|c| c.chunk.source_id.as_str()),
                )),
                Arc::new(UInt32Array::from_iter_values(
                    chunks.iter().map(|c| c.chunk.position),
                )),
                Arc::new(StringArray::from_iter_values(
                    chunks.iter().map(|c| c.chunk.content.as_str()),
                )),
                Arc::new(embedding_array),
                Arc::new(UInt64Array::from_iter_values(
                    chunks.iter().map(|c| c.chunk.metadata.word_count as u64),
                )),
                Arc::new(UInt64Array::from_iter_values(
                    chunks.iter().map(|c| c.chunk.metadata.char_count as u64),
                )),
            ],
        )
        .map_err(|e| AppError::Index(format!("Failed to create RecordBatch: {}", e)))
    }

    /// Read one search hit: the chunk projection, its stored embedding and
    /// its insertion sequence.
    fn read_row(batch: &RecordBatch, row: usize) -> AppResult<(RetrievedChunk, Vec<f32>, u64)> {
        let embeddings = column::<FixedSizeListArray>(batch, "embedding")?;
        let values = embeddings.value(row);
        let embedding = values
            .as_any()
            .downcast_ref::<Float32Array>()
            .ok_or_else(|| AppError::Index("Invalid embedding values".to_string()))?
            .values()
            .to_vec();

        let chunk = RetrievedChunk {
            content: column::<StringArray>(batch, "content")?.value(row).to_string(),
            source_id: column::<StringArray>(batch, "source_id")?.value(row).to_string(),
            position: column::<UInt32Array>(batch, "position")?.value(row),
            similarity: 0.0,
        };
        let seq = column::<UInt64Array>(batch, "seq")?.value(row);

        Ok((chunk, embedding, seq))
    }
}

fn column<'a, T: Array + 'static>(batch: &'a RecordBatch, name: &str) -> AppResult<&'a T> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<T>())
        .ok_or_else(|| AppError::Index(format!("Invalid {} column", name)))
}

/// SQL predicate selecting one source; single quotes are doubled.
fn source_predicate(source_id: &str) -> String {
    format!("source_id = '{}'", source_id.replace('\'', "''"))
}

#[async_trait]
impl VectorIndex for LanceDbIndex {
    fn backend_name(&self) -> &str {
        "lancedb"
    }

    async fn insert_many(&self, chunks: &[EmbeddedChunk]) -> AppResult<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let first_seq = self
            .next_seq
            .fetch_add(chunks.len() as u64, Ordering::SeqCst);
        let batch = self.chunks_to_batch(chunks, first_seq)?;
        let schema = batch.schema();

        self.table
            .add(RecordBatchIterator::new(vec![Ok(batch)], schema))
            .execute()
            .await
            .map_err(index_err("Failed to add chunks"))?;

        tracing::debug!("Batch inserted {} chunks into LanceDB", chunks.len());
        Ok(chunks.len())
    }

    async fn search(
        &self,
        query_embedding: &[f32],
        top_k: usize,
        source_filter: Option<&str>,
    ) -> AppResult<Vec<RetrievedChunk>> {
        if query_embedding.len() != self.embedding_dim {
            return Err(AppError::Index(format!(
                "Query embedding dimension mismatch: expected {}, got {}",
                self.embedding_dim,
                query_embedding.len()
            )));
        }
        if top_k == 0 || self.count().await? == 0 {
            return Ok(Vec::new());
        }

        let mut query = self
            .table
            .query()
            .nearest_to(query_embedding.to_vec())
            .map_err(index_err("Failed to create query"))?
            .distance_type(DistanceType::Cosine)
            .limit(top_k);
        if let Some(source_id) = source_filter {
            query = query.only_if(source_predicate(source_id));
        }

        let batches: Vec<RecordBatch> = query
            .execute()
            .await
            .map_err(index_err("Failed to execute search"))?
            .try_collect()
            .await
            .map_err(index_err("Failed to collect results"))?;

        let mut hits = Vec::new();
        for batch in &batches {
            for row in 0..batch.num_rows() {
                let (mut chunk, embedding, seq) = Self::read_row(batch, row)?;
                chunk.similarity = compute_similarity(query_embedding, &embedding);
                hits.push((chunk, seq));
            }
        }

        hits.sort_by(|a, b| b.0.similarity.total_cmp(&a.0.similarity).then(a.1.cmp(&b.1)));
        hits.truncate(top_k);

        tracing::debug!("Retrieved {} chunks (requested top-{})", hits.len(), top_k);

        Ok(hits.into_iter().map(|(chunk, _)| chunk).collect())
    }

    async fn delete_by_source(&self, source_id: &str) -> AppResult<usize> {
        let predicate = source_predicate(source_id);
        let count = self
            .table
            .count_rows(Some(predicate.clone()))
            .await
            .map_err(index_err("Failed to count rows"))?;

        if count > 0 {
            self.table
                .delete(&predicate)
                .await
                .map_err(index_err("Failed to delete source"))?;
            tracing::debug!("Deleted {} chunks of '{}'", count, source_id);
        }

        Ok(count)
    }

    async fn count(&self) -> AppResult<usize> {
        self.table
            .count_rows(None)
            .await
            .map_err(index_err("Failed to count rows"))
    }

    async fn sources(&self) -> AppResult<Vec<String>> {
        let batches: Vec<RecordBatch> = self
            .table
            .query()
            .select(Select::columns(&["source_id"]))
            .execute()
            .await
            .map_err(index_err("Failed to scan sources"))?
            .try_collect()
            .await
            .map_err(index_err("Failed to collect sources"))?;

        let mut sources = BTreeSet::new();
        for batch in &batches {
            let column = column::<StringArray>(batch, "source_id")?;
            for row in 0..column.len() {
                sources.insert(column.value(row).to_string());
            }
        }
        Ok(sources.into_iter().collect())
    }

    async fn clear(&self) -> AppResult<usize> {
        let count = self.count().await?;
        if count > 0 {
            self.table
                .delete("id IS NOT NULL")
                .await
                .map_err(index_err("Failed to reset index"))?;
        }

        tracing::info!("Reset LanceDB index ({} chunks removed)", count);
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Chunk;
    use tempfile::TempDir;

    fn embedded(source: &str, position: u32, embedding: Vec<f32>) -> EmbeddedChunk {
        EmbeddedChunk::new(
            Chunk::new(source, position, format!("{} chunk {}", source, position)),
            embedding,
        )
    }

    #[test]
    fn test_source_predicate_escapes_quotes() {
        assert_eq!(source_predicate("acmg.txt"), "source_id = 'acmg.txt'");
        assert_eq!(source_predicate("o'brien.md"), "source_id = 'o''brien.md'");
    }

    #[tokio::test]
    async fn test_insert_search_delete() {
        let dir = TempDir::new().unwrap();
        let index = LanceDbIndex::open(dir.path(), 3).await.unwrap();

        assert_eq!(index.count().await.unwrap(), 0);
        assert!(index.search(&[1.0, 0.0, 0.0], 5, None).await.unwrap().is_empty());

        let inserted = index
            .insert_many(&[
                embedded("a.txt", 0, vec![0.0, 1.0, 0.0]),
                embedded("a.txt", 1, vec![1.0, 0.0, 0.0]),
                embedded("b.txt", 0, vec![1.0, 1.0, 0.0]),
            ])
            .await
            .unwrap();
        assert_eq!(inserted, 3);
        assert_eq!(index.count().await.unwrap(), 3);
        assert_eq!(index.sources().await.unwrap(), vec!["a.txt", "b.txt"]);

        let results = index.search(&[1.0, 0.0, 0.0], 3, None).await.unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].source_id, "a.txt");
        assert_eq!(results[0].position, 1);
        assert!((results[0].similarity - 1.0).abs() < 1e-5);
        assert!(results.windows(2).all(|w| w[0].similarity >= w[1].similarity));

        let filtered = index.search(&[1.0, 0.0, 0.0], 3, Some("b.txt")).await.unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].source_id, "b.txt");

        assert_eq!(index.delete_by_source("a.txt").await.unwrap(), 2);
        assert_eq!(index.count().await.unwrap(), 1);
        assert_eq!(index.clear().await.unwrap(), 1);
        assert_eq!(index.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_ties_ordered_by_insertion_across_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let index = LanceDbIndex::open(dir.path(), 2).await.unwrap();
            index
                .insert_many(&[embedded("x", 0, vec![0.6, 0.8]), embedded("x", 1, vec![0.6, 0.8])])
                .await
                .unwrap();
        }

        let index = LanceDbIndex::open(dir.path(), 2).await.unwrap();
        index
            .insert_many(&[embedded("x", 2, vec![0.6, 0.8])])
            .await
            .unwrap();

        let results = index.search(&[0.6, 0.8], 3, None).await.unwrap();
        let positions: Vec<_> = results.iter().map(|r| r.position).collect();
        assert_eq!(positions, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_dimension_mismatch() {
        let dir = TempDir::new().unwrap();
        let index = LanceDbIndex::open(dir.path(), 3).await.unwrap();

        let err = index
            .insert_many(&[embedded("a", 0, vec![1.0])])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Index(_)));

        let err = index.search(&[1.0], 1, None).await.unwrap_err();
        assert!(matches!(err, AppError::Index(_)));

        drop(index);
        let err = LanceDbIndex::open(dir.path(), 4).await.unwrap_err();
        assert!(matches!(err, AppError::Index(_)));
    }

    #[tokio::test]
    async fn test_filter_with_quote_in_source() {
        let dir = TempDir::new().unwrap();
        let index = LanceDbIndex::open(dir.path(), 2).await.unwrap();
        index
            .insert_many(&[
                embedded("o'brien.md", 0, vec![1.0, 0.0]),
                embedded("plain.md", 0, vec![1.0, 0.0]),
            ])
            .await
            .unwrap();

        let results = index.search(&[1.0, 0.0], 5, Some("o'brien.md")).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].source_id, "o'brien.md");
        assert_eq!(index.delete_by_source("o'brien.md").await.unwrap(), 1);
    }
}
