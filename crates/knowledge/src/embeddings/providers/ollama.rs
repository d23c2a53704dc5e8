//! Ollama embedding provider.
//!
//! Embeds text through Ollama's local `/api/embeddings` endpoint with models
//! such as `all-minilm` (384 dimensions) or `nomic-embed-text` (768).
//!
//! # Example
//! ```no_run
//! use cdss_core::config::EmbeddingSettings;
//! use cdss_knowledge::embeddings::{EmbeddingProvider, OllamaProvider};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let provider = OllamaProvider::connect(&EmbeddingSettings::default()).await?;
//! let embedding = provider.embed("Null variant in BRCA1").await?;
//! assert_eq!(embedding.len(), 384);
//! # Ok(())
//! # }
//! ```

use crate::embeddings::EmbeddingProvider;
use async_trait::async_trait;
use cdss_core::config::EmbeddingSettings;
use cdss_core::{AppError, AppResult};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

const EMBEDDING_ENDPOINT: &str = "/api/embeddings";

/// Request timeout in seconds
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Ollama embedding provider using local API
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    client: Client,
    base_url: String,
    /// Model name (e.g., "all-minilm")
    model: String,
    /// Expected embedding dimensions
    dimensions: usize,
}

/// Request payload for Ollama embeddings API
#[derive(Debug, Clone, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

/// Response from Ollama embeddings API
#[derive(Debug, Clone, Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

/// Error response from Ollama API
#[derive(Debug, Clone, Deserialize)]
struct ErrorResponse {
    error: String,
}

impl OllamaProvider {
    /// Connect to Ollama and verify the configured model.
    ///
    /// # Errors
    /// * `AppError::Initialization` - Ollama is not reachable, the model is
    ///   not installed, or it returns vectors of the wrong size
    pub async fn connect(settings: &EmbeddingSettings) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| {
                AppError::Initialization(format!("Failed to create HTTP client for Ollama: {}", e))
            })?;

        let provider = Self {
            client,
            base_url: settings.endpoint.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            dimensions: settings.dimensions,
        };

        provider.verify_connection().await?;

        Ok(provider)
    }

    /// Verify Ollama connection and model dimensionality.
    #[instrument(skip(self), fields(model = %self.model))]
    async fn verify_connection(&self) -> AppResult<()> {
        debug!("Verifying Ollama connection at {}", self.base_url);

        match self.embed_single("test connection").await {
            Ok(_) => {
                debug!("Ollama connection verified, model '{}' ready", self.model);
                Ok(())
            }
            Err(AppError::Connectivity(e)) => Err(AppError::Initialization(format!(
                "Ollama not available at {} ({}). Ensure Ollama is running and model '{}' is installed. Run: ollama pull {}",
                self.base_url, e, self.model, self.model
            ))),
            Err(e) => Err(AppError::Initialization(format!(
                "Embedding model '{}' failed to load: {}",
                self.model, e
            ))),
        }
    }

    /// Embed one non-empty text. No retries.
    #[instrument(skip(self, text), fields(text_len = text.len()))]
    async fn embed_single(&self, text: &str) -> AppResult<Vec<f32>> {
        let url = format!("{}{}", self.base_url, EMBEDDING_ENDPOINT);

        let request = EmbeddingRequest {
            model: &self.model,
            prompt: text,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Connectivity(format!("Failed to reach Ollama: {}", e)))?;

        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());

            let message = serde_json::from_str::<ErrorResponse>(&error_text)
                .map(|e| e.error)
                .unwrap_or(error_text);

            return Err(AppError::Knowledge(format!(
                "Ollama embedding error ({}): {}",
                status, message
            )));
        }

        let response_body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| AppError::Knowledge(format!("Failed to parse Ollama response: {}", e)))?;

        if response_body.embedding.len() != self.dimensions {
            return Err(AppError::Knowledge(format!(
                "Model '{}' returned {} dimensions, expected {}",
                self.model,
                response_body.embedding.len(),
                self.dimensions
            )));
        }

        Ok(response_body.embedding)
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaProvider {
    fn provider_name(&self) -> &str {
        "ollama"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    #[instrument(skip(self, texts), fields(batch_size = texts.len(), model = %self.model))]
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        // The endpoint takes one prompt per request
        let mut embeddings = Vec::with_capacity(texts.len());

        for text in texts {
            if text.trim().is_empty() {
                embeddings.push(vec![0.0; self.dimensions]);
                continue;
            }
            embeddings.push(self.embed_single(text).await?);
        }

        Ok(embeddings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_settings() -> EmbeddingSettings {
        EmbeddingSettings {
            provider: "ollama".to_string(),
            ..EmbeddingSettings::default()
        }
    }

    /// Helper to check if Ollama is running
    async fn is_ollama_running(endpoint: &str) -> bool {
        let client = match Client::builder().timeout(Duration::from_secs(2)).build() {
            Ok(client) => client,
            Err(_) => return false,
        };
        client
            .get(format!("{}/api/tags", endpoint))
            .send()
            .await
            .is_ok()
    }

    #[tokio::test]
    async fn test_unreachable_server_is_initialization_failure() {
        let settings = EmbeddingSettings {
            endpoint: "http://127.0.0.1:9".to_string(),
            ..test_settings()
        };

        let result = OllamaProvider::connect(&settings).await;
        assert!(matches!(result, Err(AppError::Initialization(_))));
    }

    #[tokio::test]
    async fn test_embed_batch_against_live_server() {
        let settings = test_settings();
        if !is_ollama_running(&settings.endpoint).await {
            println!("Skipping test: Ollama not running");
            return;
        }
        let provider = match OllamaProvider::connect(&settings).await {
            Ok(provider) => provider,
            Err(e) => {
                println!("Skipping test: {}", e);
                return;
            }
        };

        let texts = vec!["BRCA1".to_string(), "".to_string()];
        let embeddings = provider.embed_batch(&texts).await.unwrap();

        assert_eq!(embeddings.len(), 2);
        assert_eq!(embeddings[0].len(), settings.dimensions);
        assert!(embeddings[1].iter().all(|&x| x == 0.0));
    }
}
