//! Ollama LLM provider implementation.
//!
//! This module provides integration with Ollama, a local LLM runtime.
//! Ollama API: https://github.com/ollama/ollama/blob/main/docs/api.md

use crate::client::{LlmClient, LlmRequest, LlmResponse, LlmStream, LlmStreamChunk, LlmUsage};
use cdss_core::{AppError, AppResult};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt::Display;
use std::time::Duration;

/// Default Ollama endpoint.
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Timeout for the `/api/tags` reachability probe.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Ollama API request format.
#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    stream: bool,
    options: OllamaOptions,
}

/// Sampling options. Ollama ignores these unless nested under `options`.
#[derive(Debug, Default, Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

/// Ollama API response format, also used for each streamed line.
#[derive(Debug, Deserialize)]
struct OllamaResponse {
    #[serde(default)]
    model: String,
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
    #[serde(default)]
    error: Option<String>,
}

impl OllamaResponse {
    fn usage(&self) -> LlmUsage {
        LlmUsage::new(
            self.prompt_eval_count.unwrap_or(0),
            self.eval_count.unwrap_or(0),
        )
    }
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagModel>,
}

#[derive(Debug, Deserialize)]
struct TagModel {
    name: String,
}

/// Ollama LLM client.
pub struct OllamaClient {
    /// Base URL for Ollama API
    base_url: String,

    /// HTTP client
    client: reqwest::Client,
}

impl OllamaClient {
    /// Create a new Ollama client with default settings.
    ///
    /// Default URL: http://localhost:11434
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_OLLAMA_URL)
    }

    /// Create a new Ollama client with a custom base URL and no request timeout.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: normalize_base_url(base_url.into()),
            client: reqwest::Client::new(),
        }
    }

    /// Create a client whose requests fail after `timeout`.
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: normalize_base_url(base_url.into()),
            client,
        })
    }

    /// Base URL requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Convert LlmRequest to Ollama format.
    fn to_ollama_request(&self, request: &LlmRequest) -> OllamaRequest {
        OllamaRequest {
            model: request.model.clone(),
            prompt: request.prompt.clone(),
            system: request.system.clone(),
            stream: request.stream,
            options: OllamaOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
        }
    }

    /// Convert Ollama response to LlmResponse.
    fn convert_response(&self, response: OllamaResponse) -> AppResult<LlmResponse> {
        if let Some(error) = &response.error {
            return Err(AppError::Generation(format!("Ollama error: {}", error)));
        }

        let usage = response.usage();
        Ok(LlmResponse {
            content: response.response,
            model: response.model,
            usage,
            done: response.done,
        })
    }

    /// POST to `/api/generate`, mapping transport and status failures.
    async fn send_generate(&self, request: &OllamaRequest) -> AppResult<reqwest::Response> {
        let url = format!("{}/api/generate", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                AppError::Connectivity(format!("Failed to reach Ollama at {}: {}", self.base_url, e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::Generation(format!(
                "Ollama API error ({}): {}",
                status, error_text
            )));
        }

        Ok(response)
    }

    async fn fetch_tags(&self) -> AppResult<TagsResponse> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self
            .client
            .get(&url)
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
            .map_err(|e| AppError::Connectivity(format!("Failed to reach Ollama: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Connectivity(format!(
                "Ollama returned status {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Generation(format!("Failed to parse model list: {}", e)))
    }
}

impl Default for OllamaClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl LlmClient for OllamaClient {
    fn provider_name(&self) -> &str {
        "ollama"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        tracing::info!(model = %request.model, "Sending completion request to Ollama");
        tracing::debug!("Request: {:?}", request);

        let mut ollama_request = self.to_ollama_request(request);
        ollama_request.stream = false;

        let response = self.send_generate(&ollama_request).await?;

        // For non-streaming, Ollama returns a single JSON object
        let ollama_response: OllamaResponse = response
            .json()
            .await
            .map_err(|e| AppError::Generation(format!("Failed to parse Ollama response: {}", e)))?;

        tracing::info!("Received completion from Ollama");
        tracing::debug!("Response: {:?}", ollama_response);

        self.convert_response(ollama_response)
    }

    async fn stream(&self, request: &LlmRequest) -> AppResult<LlmStream> {
        tracing::info!(model = %request.model, "Starting streaming request to Ollama");
        tracing::debug!("Request: {:?}", request);

        let mut ollama_request = self.to_ollama_request(request);
        ollama_request.stream = true;

        let response = self.send_generate(&ollama_request).await?;

        Ok(decode_ndjson(response.bytes_stream()))
    }

    async fn health_check(&self) -> bool {
        match self.fetch_tags().await {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!("Ollama health check failed: {}", e);
                false
            }
        }
    }

    async fn list_models(&self) -> AppResult<Vec<String>> {
        let tags = self.fetch_tags().await?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }
}

fn normalize_base_url(base_url: String) -> String {
    base_url.trim_end_matches('/').to_string()
}

/// Accumulates raw bytes and yields one parsed chunk per complete line.
///
/// Network reads can split a JSON line anywhere, including inside a
/// multi-byte character, so decoding waits for the newline.
#[derive(Debug, Default)]
struct LineDecoder {
    buffer: Vec<u8>,
}

impl LineDecoder {
    fn push(&mut self, bytes: &[u8]) -> Vec<AppResult<LlmStreamChunk>> {
        self.buffer.extend_from_slice(bytes);

        let mut out = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(item) = parse_line(&line) {
                out.push(item);
            }
        }
        out
    }

    /// Parse whatever is left once the body ends without a trailing newline.
    fn finish(&mut self) -> Option<AppResult<LlmStreamChunk>> {
        let rest = std::mem::take(&mut self.buffer);
        parse_line(&rest)
    }
}

fn parse_line(line: &[u8]) -> Option<AppResult<LlmStreamChunk>> {
    let text = match std::str::from_utf8(line) {
        Ok(text) => text.trim(),
        Err(e) => {
            return Some(Err(AppError::Generation(format!(
                "Stream chunk is not UTF-8: {}",
                e
            ))))
        }
    };
    if text.is_empty() {
        return None;
    }

    let parsed = serde_json::from_str::<OllamaResponse>(text)
        .map_err(|e| AppError::Generation(format!("Failed to parse chunk: {}", e)))
        .and_then(|response| {
            if let Some(error) = &response.error {
                return Err(AppError::Generation(format!("Ollama error: {}", error)));
            }
            let usage = response.usage();
            Ok(if response.done {
                LlmStreamChunk::last(response.model, response.response, usage)
            } else {
                LlmStreamChunk::fragment(response.model, response.response)
            })
        });
    Some(parsed)
}

struct DecodeState<S> {
    bytes: S,
    decoder: LineDecoder,
    pending: VecDeque<AppResult<LlmStreamChunk>>,
    exhausted: bool,
}

/// Turn a newline-delimited JSON byte stream into stream chunks.
fn decode_ndjson<S, B, E>(bytes: S) -> LlmStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    let state = DecodeState {
        bytes: Box::pin(bytes),
        decoder: LineDecoder::default(),
        pending: VecDeque::new(),
        exhausted: false,
    };

    let stream = futures::stream::unfold(state, |mut st| async move {
        loop {
            if let Some(item) = st.pending.pop_front() {
                // Nothing after the final record is ours to read.
                if matches!(&item, Ok(chunk) if chunk.done) {
                    st.exhausted = true;
                    st.pending.clear();
                }
                return Some((item, st));
            }
            if st.exhausted {
                return None;
            }
            match st.bytes.next().await {
                Some(Ok(bytes)) => {
                    let items = st.decoder.push(bytes.as_ref());
                    st.pending.extend(items);
                }
                Some(Err(e)) => {
                    st.exhausted = true;
                    st.pending
                        .push_back(Err(AppError::Connectivity(format!("Stream error: {}", e))));
                }
                None => {
                    st.exhausted = true;
                    if let Some(item) = st.decoder.finish() {
                        st.pending.push_back(item);
                    }
                }
            }
        }
    });

    Box::pin(stream)
}
