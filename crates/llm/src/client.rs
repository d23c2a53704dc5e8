//! Completion service contract.
//!
//! The answer generator only needs three things from a model server: a full
//! completion, the same completion as incremental fragments, and a cheap
//! reachability check for `cdss status`.

use cdss_core::AppResult;
use futures::Stream;
use std::pin::Pin;

/// One prompt sent to the completion service.
///
/// Sampling fields left as `None` fall back to the server's model defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmRequest {
    pub prompt: String,
    pub system: Option<String>,
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub stream: bool,
}

impl LlmRequest {
    pub fn new(prompt: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system: None,
            model: model.into(),
            temperature: None,
            max_tokens: None,
            stream: false,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_streaming(mut self) -> Self {
        self.stream = true;
        self
    }
}

/// Token counts reported by the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LlmUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl LlmUsage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// A finished, non-streamed completion.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmResponse {
    pub content: String,
    pub model: String,
    pub usage: LlmUsage,

    /// False when the server stopped early, e.g. on the token limit
    pub done: bool,
}

/// One record of a streamed completion.
///
/// Only the final record has `done` set, and only it carries usage.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmStreamChunk {
    pub content: String,
    pub model: String,
    pub done: bool,
    pub usage: Option<LlmUsage>,
}

impl LlmStreamChunk {
    /// An intermediate answer fragment.
    pub fn fragment(model: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            model: model.into(),
            done: false,
            usage: None,
        }
    }

    /// The closing record, which may still carry trailing text.
    pub fn last(model: impl Into<String>, content: impl Into<String>, usage: LlmUsage) -> Self {
        Self {
            content: content.into(),
            model: model.into(),
            done: true,
            usage: Some(usage),
        }
    }
}

/// Streamed completion records.
///
/// Nothing past the opening request is read until the consumer polls, and
/// dropping the stream closes the connection.
pub type LlmStream = Pin<Box<dyn Stream<Item = AppResult<LlmStreamChunk>> + Send>>;

/// A model server the answer generator can talk to.
///
/// An unreachable server is `AppError::Connectivity`; a server that answered
/// with an error or an unreadable body is `AppError::Generation`.
#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    fn provider_name(&self) -> &str;

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse>;

    /// Streaming is forced on regardless of `request.stream`.
    async fn stream(&self, request: &LlmRequest) -> AppResult<LlmStream>;

    /// Whether the server answers at all. Failures report `false`.
    async fn health_check(&self) -> bool;

    /// Models installed on the server.
    async fn list_models(&self) -> AppResult<Vec<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let request = LlmRequest::new("What is PVS1?", "llama3")
            .with_system("You are a clinical assistant.")
            .with_temperature(0.3)
            .with_max_tokens(1024)
            .with_streaming();

        assert_eq!(request.prompt, "What is PVS1?");
        assert_eq!(request.system.as_deref(), Some("You are a clinical assistant."));
        assert_eq!(request.temperature, Some(0.3));
        assert_eq!(request.max_tokens, Some(1024));
        assert!(request.stream);
    }

    #[test]
    fn test_unset_sampling_is_none() {
        let request = LlmRequest::new("q", "llama3");
        assert_eq!(request.temperature, None);
        assert_eq!(request.max_tokens, None);
        assert!(!request.stream);
    }

    #[test]
    fn test_only_last_chunk_carries_usage() {
        let fragment = LlmStreamChunk::fragment("llama3", "Null ");
        assert!(!fragment.done);
        assert_eq!(fragment.usage, None);

        let last = LlmStreamChunk::last("llama3", "", LlmUsage::new(4, 2));
        assert!(last.done);
        assert_eq!(last.usage.map(|u| u.total_tokens), Some(6));
    }
}
