//! Query-time retrieval: embed the question, search, filter.

use crate::embeddings::Embedder;
use crate::types::RetrievedChunk;
use crate::vector_index::VectorIndex;
use cdss_core::AppResult;
use std::sync::Arc;

/// Finds the chunks most relevant to a question.
#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<Embedder>,
    index: Arc<dyn VectorIndex>,
}

impl std::fmt::Debug for Retriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever")
            .field("embedder", &self.embedder)
            .field("index", &self.index.backend_name())
            .finish()
    }
}

impl Retriever {
    pub fn new(embedder: Arc<Embedder>, index: Arc<dyn VectorIndex>) -> Self {
        Self { embedder, index }
    }

    pub fn embedder(&self) -> &Arc<Embedder> {
        &self.embedder
    }

    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    /// Return up to `top_k` chunks ordered by similarity, highest first.
    ///
    /// With `min_similarity > 0`, chunks scoring below it are dropped. An
    /// empty index or a fully filtered result is an empty vector.
    pub async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
        source_filter: Option<&str>,
        min_similarity: f32,
    ) -> AppResult<Vec<RetrievedChunk>> {
        tracing::info!(
            "Retrieving top {} chunks for query: '{}'",
            top_k,
            query.chars().take(50).collect::<String>()
        );

        let query_embedding = self.embedder.embed_one(query).await?;
        let mut results = self
            .index
            .search(&query_embedding, top_k, source_filter)
            .await?;

        if min_similarity > 0.0 {
            let before = results.len();
            results.retain(|chunk| chunk.similarity >= min_similarity);
            if results.len() < before {
                tracing::debug!(
                    "Filtered {} results below similarity {}",
                    before - results.len(),
                    min_similarity
                );
            }
        }

        tracing::info!(
            "Retrieved {} relevant chunks (max score: {:.3})",
            results.len(),
            results.first().map_or(0.0, |c| c.similarity)
        );

        Ok(results)
    }
}
