//! Completion service implementations.

pub mod ollama;

pub use ollama::{OllamaClient, DEFAULT_OLLAMA_URL};
