//! Vector index abstraction for embedded chunks.
//!
//! Defines the narrow storage contract the retrieval path depends on.

use crate::types::{EmbeddedChunk, RetrievedChunk};
use async_trait::async_trait;
use cdss_core::AppResult;

/// Trait for vector index backends.
///
/// Implementations must support concurrent readers. Writes for a single
/// source are serialized by the caller (see [`crate::ingest::Ingestor`]).
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Backend name for logs and status output.
    fn backend_name(&self) -> &str;

    /// Store embedded chunks. Returns the number inserted.
    async fn insert_many(&self, chunks: &[EmbeddedChunk]) -> AppResult<usize>;

    /// Return up to `top_k` chunks most similar to `query_embedding`.
    ///
    /// Results are ordered by similarity descending; equal similarities keep
    /// ascending insertion order. `source_filter` restricts the search to one
    /// source.
    async fn search(
        &self,
        query_embedding: &[f32],
        top_k: usize,
        source_filter: Option<&str>,
    ) -> AppResult<Vec<RetrievedChunk>>;

    /// Delete every chunk of `source_id`. Returns the number deleted.
    async fn delete_by_source(&self, source_id: &str) -> AppResult<usize>;

    /// Total number of stored chunks.
    async fn count(&self) -> AppResult<usize>;

    /// Sorted, de-duplicated source ids.
    async fn sources(&self) -> AppResult<Vec<String>>;

    /// Remove everything. Returns the number of chunks removed.
    async fn clear(&self) -> AppResult<usize>;

    /// Whether any chunk of `source_id` is stored.
    async fn contains_source(&self, source_id: &str) -> AppResult<bool> {
        Ok(self.sources().await?.iter().any(|s| s == source_id))
    }
}
