//! Core types for the knowledge store.

use serde::{Deserialize, Serialize};

/// Size metadata recorded for every chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub word_count: usize,
    pub char_count: usize,
}

impl ChunkMetadata {
    /// Measure `content`. Characters are Unicode scalar values, not bytes.
    pub fn of(content: &str) -> Self {
        Self {
            word_count: content.split_whitespace().count(),
            char_count: content.chars().count(),
        }
    }
}

/// A contiguous span of source text, the unit of retrieval.
///
/// Chunks are immutable once created. `position` starts at 0 and is unique
/// per `source_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Chunk text
    pub content: String,

    /// Originating document
    pub source_id: String,

    /// Ordinal within its source
    pub position: u32,

    pub metadata: ChunkMetadata,
}

impl Chunk {
    pub fn new(source_id: impl Into<String>, position: u32, content: impl Into<String>) -> Self {
        let content = content.into();
        let metadata = ChunkMetadata::of(&content);
        Self {
            content,
            source_id: source_id.into(),
            position,
            metadata,
        }
    }
}

/// A chunk together with its embedding vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedChunk {
    #[serde(flatten)]
    pub chunk: Chunk,

    /// Fixed length for a given model
    pub embedding: Vec<f32>,
}

impl EmbeddedChunk {
    pub fn new(chunk: Chunk, embedding: Vec<f32>) -> Self {
        Self { chunk, embedding }
    }
}

/// A chunk returned by a similarity search.
///
/// Exists only for the duration of one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub content: String,
    pub source_id: String,
    pub position: u32,

    /// Cosine similarity to the query, in [-1, 1]
    pub similarity: f32,
}

impl RetrievedChunk {
    pub fn from_embedded(chunk: &EmbeddedChunk, similarity: f32) -> Self {
        Self {
            content: chunk.chunk.content.clone(),
            source_id: chunk.chunk.source_id.clone(),
            position: chunk.chunk.position,
            similarity,
        }
    }
}
