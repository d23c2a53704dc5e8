//! RAG result and event types.

use cdss_core::config::AppConfig;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Answer returned when retrieval finds nothing.
pub const FALLBACK_ANSWER: &str = "I couldn't find relevant information in my knowledge base to answer this question. Please try rephrasing or consult with a healthcare professional.";

/// Message of the error event a stream emits when retrieval finds nothing.
pub const NO_INFORMATION_MESSAGE: &str = "No relevant information found.";

/// A reference back to a retrieved chunk, for display next to an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceCitation {
    pub source_id: String,

    /// Chunk position within the source
    pub position: u32,

    /// Rounded to 3 decimals
    pub similarity: f32,

    /// First 100 characters of the chunk followed by "..."
    pub preview: String,
}

/// Outcome of one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub query: String,
    pub answer: String,
    pub sources: Vec<SourceCitation>,

    /// Context the answer was generated from; empty when nothing was found
    pub context_used: String,

    pub chunks_retrieved: usize,
}

impl QueryResult {
    /// Result for a question with no relevant chunks. This is a normal
    /// outcome, not an error.
    pub fn no_context(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            answer: FALLBACK_ANSWER.to_string(),
            sources: Vec::new(),
            context_used: String::new(),
            chunks_retrieved: 0,
        }
    }

    /// Whether the answer was grounded in retrieved chunks.
    pub fn has_context(&self) -> bool {
        self.chunks_retrieved > 0
    }
}

/// One event of a streamed answer.
///
/// A successful stream is `Sources`, any number of `AnswerChunk`s, then
/// `Done`. A stream that fails ends with `Error` instead of `Done`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content", rename_all = "snake_case")]
pub enum QueryEvent {
    Sources(Vec<SourceCitation>),
    AnswerChunk(String),
    Done,
    Error(String),
}

impl QueryEvent {
    /// Whether no event follows this one.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error(_))
    }
}

/// Stages a query moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Retrieving,
    NoContext,
    ContextReady,
    Generating,
    Done,
    Error,
}

impl PipelineState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Retrieving => "retrieving",
            Self::NoContext => "no_context",
            Self::ContextReady => "context_ready",
            Self::Generating => "generating",
            Self::Done => "done",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Readiness of the pipeline's collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemStatus {
    /// Completion service answered the probe
    pub llm: bool,

    /// Index holds at least one chunk
    pub index: bool,

    pub ready: bool,
}

impl SystemStatus {
    pub fn new(llm: bool, index: bool) -> Self {
        Self {
            llm,
            index,
            ready: llm && index,
        }
    }
}

/// Retrieval and generation parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineOptions {
    pub top_k: usize,
    pub temperature: f32,
    pub max_tokens: u32,

    /// Results below this similarity are dropped; 0 disables filtering
    pub min_similarity: f32,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for PipelineOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            top_k: config.retrieval.top_k,
            temperature: config.generation.temperature,
            max_tokens: config.generation.max_tokens,
            min_similarity: config.retrieval.min_similarity,
        }
    }
}
