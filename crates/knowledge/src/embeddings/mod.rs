//! Embedding of chunks and queries.
//!
//! [`Embedder`] is the handle the rest of the crate holds. It owns the
//! configured provider, loads it on first use and shares it afterwards.

pub mod provider;
pub mod providers;

pub use provider::{create_provider, EmbeddingProvider};
pub use providers::{OllamaProvider, TrigramProvider};

use cdss_core::config::EmbeddingSettings;
use cdss_core::{AppError, AppResult};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::sync::Arc;
use tokio::sync::OnceCell;

type ProviderInit =
    Box<dyn Fn(EmbeddingSettings) -> BoxFuture<'static, AppResult<Arc<dyn EmbeddingProvider>>> + Send + Sync>;

/// Lazily initialized, shared embedding model.
///
/// The provider is created on the first embedding call and reused by every
/// later call; concurrent first calls wait on a single initialization.
/// A failed initialization is returned as `AppError::Initialization` and is
/// not cached, so a later call tries again.
pub struct Embedder {
    settings: EmbeddingSettings,
    init: ProviderInit,
    provider: OnceCell<Arc<dyn EmbeddingProvider>>,
}

impl std::fmt::Debug for Embedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Embedder")
            .field("provider", &self.settings.provider)
            .field("model", &self.settings.model)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

impl Embedder {
    /// Embedder for the configured provider.
    pub fn new(settings: EmbeddingSettings) -> Self {
        Self::with_initializer(settings, |settings| {
            async move { create_provider(&settings).await }.boxed()
        })
    }

    /// Embedder whose provider is built by `init` on first use.
    pub fn with_initializer<F>(settings: EmbeddingSettings, init: F) -> Self
    where
        F: Fn(EmbeddingSettings) -> BoxFuture<'static, AppResult<Arc<dyn EmbeddingProvider>>>
            + Send
            + Sync
            + 'static,
    {
        Self {
            settings,
            init: Box::new(init),
            provider: OnceCell::new(),
        }
    }

    /// Embedder around an already initialized provider.
    pub fn with_provider(provider: Arc<dyn EmbeddingProvider>) -> Self {
        let settings = EmbeddingSettings {
            provider: provider.provider_name().to_string(),
            model: provider.model_name().to_string(),
            dimensions: provider.dimensions(),
            ..EmbeddingSettings::default()
        };
        let ready = Arc::clone(&provider);
        Self {
            settings,
            init: Box::new(move |_| {
                let provider = Arc::clone(&ready);
                async move { Ok(provider) }.boxed()
            }),
            provider: OnceCell::new_with(Some(provider)),
        }
    }

    pub fn settings(&self) -> &EmbeddingSettings {
        &self.settings
    }

    pub fn is_initialized(&self) -> bool {
        self.provider.initialized()
    }

    /// Vector length produced by this embedder.
    pub fn dimensions(&self) -> usize {
        self.provider
            .get()
            .map(|p| p.dimensions())
            .unwrap_or(self.settings.dimensions)
    }

    /// The loaded provider, initializing it on first use.
    pub async fn provider(&self) -> AppResult<&Arc<dyn EmbeddingProvider>> {
        self.provider
            .get_or_try_init(|| async {
                tracing::info!(
                    provider = %self.settings.provider,
                    model = %self.settings.model,
                    "Loading embedding model"
                );
                (self.init)(self.settings.clone()).await.map_err(|e| match e {
                    AppError::Initialization(_) => e,
                    other => AppError::Initialization(other.to_string()),
                })
            })
            .await
    }

    /// Embed a single text.
    pub async fn embed_one(&self, text: &str) -> AppResult<Vec<f32>> {
        let provider = self.provider().await?;
        let embedding = provider.embed(text).await?;
        self.check_dimensions(&embedding)?;
        Ok(embedding)
    }

    /// Embed `texts` in batches of `batch_size`, preserving order.
    pub async fn embed_many(&self, texts: &[String], batch_size: usize) -> AppResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let provider = self.provider().await?;
        let batch_size = batch_size.max(1);

        tracing::info!(
            "Embedding {} texts using provider '{}' (model: {}, batch size: {})",
            texts.len(),
            provider.provider_name(),
            provider.model_name(),
            batch_size
        );

        let mut embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(batch_size) {
            let vectors = provider.embed_batch(batch).await?;
            if vectors.len() != batch.len() {
                return Err(AppError::Knowledge(format!(
                    "Provider returned {} embeddings for {} texts",
                    vectors.len(),
                    batch.len()
                )));
            }
            for vector in &vectors {
                self.check_dimensions(vector)?;
            }
            embeddings.extend(vectors);
        }

        tracing::debug!(
            "Generated {} embeddings of dimension {}",
            embeddings.len(),
            provider.dimensions()
        );

        Ok(embeddings)
    }

    fn check_dimensions(&self, embedding: &[f32]) -> AppResult<()> {
        let expected = self.dimensions();
        if embedding.len() != expected {
            return Err(AppError::Knowledge(format!(
                "Embedding dimension mismatch: expected {}, got {}",
                expected,
                embedding.len()
            )));
        }
        Ok(())
    }
}

/// Cosine similarity of two vectors.
///
/// Returns 0 when either vector has zero norm or the lengths differ.
pub fn compute_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot_product / (norm_a * norm_b)).clamp(-1.0, 1.0)
}
