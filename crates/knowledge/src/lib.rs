//! Clinical knowledge base and retrieval-augmented answering.
//!
//! Documents are cleaned, chunked and embedded into a vector index; the
//! [`rag::Pipeline`] answers questions from the most similar chunks with
//! numbered source citations.

pub mod base;
pub mod chunker;
pub mod clean;
pub mod embeddings;
pub mod extract;
pub mod ingest;
pub mod lancedb_index;
pub mod memory_index;
pub mod rag;
pub mod types;
pub mod vector_index;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use base::KnowledgeBase;
pub use chunker::ChunkOptions;
pub use embeddings::{compute_similarity, Embedder, EmbeddingProvider};
pub use ingest::{IngestOptions, IngestOutcome, IngestStats, Ingestor};
pub use lancedb_index::LanceDbIndex;
pub use memory_index::InMemoryIndex;
pub use rag::{
    Pipeline, PipelineOptions, QueryEvent, QueryResult, QueryStream, SourceCitation, SystemStatus,
};
pub use types::{Chunk, ChunkMetadata, EmbeddedChunk, RetrievedChunk};
pub use vector_index::VectorIndex;
