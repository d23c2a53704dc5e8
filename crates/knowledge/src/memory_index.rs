//! In-memory vector index with exact cosine search.

use crate::embeddings::compute_similarity;
use crate::types::{EmbeddedChunk, RetrievedChunk};
use crate::vector_index::VectorIndex;
use async_trait::async_trait;
use cdss_core::{AppError, AppResult};
use std::collections::BTreeSet;
use tokio::sync::RwLock;

/// Vector index kept in process memory.
///
/// Every search scans all rows. Suited to tests and small corpora.
#[derive(Debug)]
pub struct InMemoryIndex {
    dimensions: usize,
    /// Kept in insertion order
    rows: RwLock<Vec<EmbeddedChunk>>,
}

impl InMemoryIndex {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            rows: RwLock::new(Vec::new()),
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn check_dimensions(&self, len: usize, what: &str) -> AppResult<()> {
        if len != self.dimensions {
            return Err(AppError::Index(format!(
                "{} dimension mismatch: expected {}, got {}",
                what, self.dimensions, len
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    fn backend_name(&self) -> &str {
        "memory"
    }

    async fn insert_many(&self, chunks: &[EmbeddedChunk]) -> AppResult<usize> {
        for chunk in chunks {
            self.check_dimensions(chunk.embedding.len(), "Embedding")?;
        }

        self.rows.write().await.extend_from_slice(chunks);

        tracing::debug!("Inserted {} chunks into memory index", chunks.len());
        Ok(chunks.len())
    }

    async fn search(
        &self,
        query_embedding: &[f32],
        top_k: usize,
        source_filter: Option<&str>,
    ) -> AppResult<Vec<RetrievedChunk>> {
        self.check_dimensions(query_embedding.len(), "Query embedding")?;
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let rows = self.rows.read().await;
        let mut scored: Vec<(f32, &EmbeddedChunk)> = rows
            .iter()
            .filter(|c| source_filter.map_or(true, |s| c.chunk.source_id == s))
            .map(|c| (compute_similarity(query_embedding, &c.embedding), c))
            .collect();

        // Stable, so equal scores stay in insertion order

        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored.truncate(top_k);

        Ok(scored
            .into_iter()
            .map(|(similarity, chunk)| RetrievedChunk::from_embedded(chunk, similarity))
            .collect())
    }

    async fn delete_by_source(&self, source_id: &str) -> AppResult<usize> {
        let mut rows = self.rows.write().await;
        let before = rows.len();
        rows.retain(|c| c.chunk.source_id != source_id);
        Ok(before - rows.len())
    }

    async fn count(&self) -> AppResult<usize> {
        Ok(self.rows.read().await.len())
    }

    async fn sources(&self) -> AppResult<Vec<String>> {
        let rows = self.rows.read().await;
        let sources: BTreeSet<&str> = rows
            .iter()
            .map(|c| c.chunk.source_id.as_str())
            .collect();
        Ok(sources.into_iter().map(String::from).collect())
    }

    async fn clear(&self) -> AppResult<usize> {
        let mut rows = self.rows.write().await;
        let removed = rows.len();
        rows.clear();
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Chunk;

    fn embedded(source: &str, position: u32, embedding: Vec<f32>) -> EmbeddedChunk {
        EmbeddedChunk::new(
            Chunk::new(source, position, format!("{} chunk {}", source, position)),
            embedding,
        )
    }

    #[tokio::test]
    async fn test_empty_index_search() {
        let index = InMemoryIndex::new(2);
        assert!(index.search(&[1.0, 0.0], 5, None).await.unwrap().is_empty());
        assert_eq!(index.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_search_orders_by_similarity() {
        let index = InMemoryIndex::new(2);
        index
            .insert_many(&[
                embedded("a", 0, vec![0.0, 1.0]),
                embedded("a", 1, vec![1.0, 0.0]),
                embedded("b", 0, vec![1.0, 1.0]),
            ])
            .await
            .unwrap();

        let results = index.search(&[1.0, 0.0], 3, None).await.unwrap();
        let order: Vec<_> = results.iter().map(|r| (r.source_id.as_str(), r.position)).collect();
        assert_eq!(order, vec![("a", 1), ("b", 0), ("a", 0)]);
        assert!(results.windows(2).all(|w| w[0].similarity >= w[1].similarity));
    }

    #[tokio::test]
    async fn test_ties_keep_insertion_order() {
        let index = InMemoryIndex::new(2);
        for i in 0..5 {
            index
                .insert_many(&[embedded("dup", i, vec![0.6, 0.8])])
                .await
                .unwrap();
        }

        let results = index.search(&[0.6, 0.8], 3, None).await.unwrap();
        let positions: Vec<_> = results.iter().map(|r| r.position).collect();
        assert_eq!(positions, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_source_filter() {
        let index = InMemoryIndex::new(2);
        index
            .insert_many(&[
                embedded("a", 0, vec![1.0, 0.0]),
                embedded("b", 0, vec![1.0, 0.0]),
            ])
            .await
            .unwrap();

        let results = index.search(&[1.0, 0.0], 5, Some("b")).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].source_id, "b");
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_index_error() {
        let index = InMemoryIndex::new(3);
        let err = index
            .insert_many(&[embedded("a", 0, vec![1.0])])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Index(_)));

        let err = index.search(&[1.0], 1, None).await.unwrap_err();
        assert!(matches!(err, AppError::Index(_)));
    }

    #[tokio::test]
    async fn test_delete_sources_and_clear() {
        let index = InMemoryIndex::new(2);
        index
            .insert_many(&[
                embedded("b", 0, vec![1.0, 0.0]),
                embedded("a", 0, vec![1.0, 0.0]),
                embedded("a", 1, vec![0.0, 1.0]),
            ])
            .await
            .unwrap();

        assert_eq!(index.sources().await.unwrap(), vec!["a", "b"]);
        assert!(index.contains_source("a").await.unwrap());
        assert_eq!(index.delete_by_source("a").await.unwrap(), 2);
        assert_eq!(index.delete_by_source("a").await.unwrap(), 0);
        assert_eq!(index.count().await.unwrap(), 1);
        assert_eq!(index.clear().await.unwrap(), 1);
        assert!(index.sources().await.unwrap().is_empty());
    }
}
