//! Retrieval-augmented answering.

pub mod context;
pub mod generator;
pub mod pipeline;
pub mod retriever;
pub mod types;

pub use context::{format_context, get_sources, PREVIEW_CHARS};
pub use generator::{AnswerStream, Generator};
pub use pipeline::{Pipeline, QueryStream};
pub use retriever::Retriever;
pub use types::{
    PipelineOptions, PipelineState, QueryEvent, QueryResult, SourceCitation, SystemStatus,
    FALLBACK_ANSWER, NO_INFORMATION_MESSAGE,
};
