//! Wiring of a workspace's knowledge base from configuration.

use crate::embeddings::Embedder;
use crate::ingest::{IngestOptions, Ingestor};
use crate::lancedb_index::LanceDbIndex;
use crate::rag::{Generator, Pipeline, PipelineOptions, Retriever};
use crate::vector_index::VectorIndex;
use cdss_core::config::AppConfig;
use cdss_core::AppResult;
use cdss_llm::{create_client, LlmClient};
use cdss_prompt::PromptSet;
use std::sync::Arc;
use std::time::Duration;

/// The shared, read-mostly resources of one workspace: the embedding model
/// and the vector index.
#[derive(Clone)]
pub struct KnowledgeBase {
    embedder: Arc<Embedder>,
    index: Arc<dyn VectorIndex>,
}

impl std::fmt::Debug for KnowledgeBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnowledgeBase")
            .field("embedder", &self.embedder)
            .field("index", &self.index.backend_name())
            .finish()
    }
}

impl KnowledgeBase {
    /// Open the persistent index under `<workspace>/.cdss/index`.
    ///
    /// The embedding model is not loaded until first use.
    pub async fn open(config: &AppConfig) -> AppResult<Self> {
        config.ensure_cdss_dir()?;
        let index = LanceDbIndex::open(&config.index_dir(), config.embedding.dimensions).await?;

        tracing::debug!(
            "Opened knowledge base at {:?} ({} embeddings, {} dimensions)",
            config.index_dir(),
            config.embedding.provider,
            config.embedding.dimensions
        );

        Ok(Self::new(
            Arc::new(Embedder::new(config.embedding.clone())),
            Arc::new(index),
        ))
    }

    pub fn new(embedder: Arc<Embedder>, index: Arc<dyn VectorIndex>) -> Self {
        Self { embedder, index }
    }

    pub fn embedder(&self) -> &Arc<Embedder> {
        &self.embedder
    }

    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    pub fn ingestor(&self, options: IngestOptions) -> Ingestor {
        Ingestor::new(Arc::clone(&self.embedder), Arc::clone(&self.index), options)
    }

    pub fn retriever(&self) -> Retriever {
        Retriever::new(Arc::clone(&self.embedder), Arc::clone(&self.index))
    }

    /// Answering pipeline using the configured completion service and the
    /// workspace's prompt overrides.
    pub fn pipeline(&self, config: &AppConfig) -> AppResult<Pipeline> {
        let client = create_client(
            &config.llm.provider,
            Some(&config.llm.endpoint),
            config.llm.timeout_secs.map(Duration::from_secs),
        )?;
        let prompts = PromptSet::load(&config.prompts_dir())?;
        if !prompts.overridden().is_empty() {
            tracing::info!("Using workspace prompts: {:?}", prompts.overridden());
        }

        Ok(self.pipeline_with(client, prompts, &config.llm.model, PipelineOptions::from(config)))
    }

    pub fn pipeline_with(
        &self,
        client: Arc<dyn LlmClient>,
        prompts: PromptSet,
        model: &str,
        options: PipelineOptions,
    ) -> Pipeline {
        Pipeline::new(
            self.retriever(),
            Generator::new(client, Arc::new(prompts), model),
            options,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::TrigramProvider;
    use crate::ingest::IngestOutcome;
    use crate::memory_index::InMemoryIndex;
    use crate::tests::support::ScriptedLlm;
    use cdss_core::config::EmbeddingSettings;
    use tempfile::TempDir;

    fn trigram_config(workspace: &std::path::Path) -> AppConfig {
        AppConfig {
            workspace: workspace.to_path_buf(),
            embedding: EmbeddingSettings {
                provider: "trigram".to_string(),
                model: TrigramProvider::MODEL_NAME.to_string(),
                dimensions: 64,
                ..EmbeddingSettings::default()
            },
            ..AppConfig::default()
        }
    }

    #[tokio::test]
    async fn test_open_ingest_and_query_persistent_base() {
        let dir = TempDir::new().unwrap();
        let config = trigram_config(dir.path());

        {
            let base = KnowledgeBase::open(&config).await.unwrap();
            let outcome = base
                .ingestor(IngestOptions::from(&config))
                .ingest_text("acmg.txt", "Null variants are very strong evidence of pathogenicity.", false)
                .await
                .unwrap();
            assert!(matches!(outcome, IngestOutcome::Ingested { chunks: 1, .. }));
        }
        assert!(config.index_dir().exists());

        let base = KnowledgeBase::open(&config).await.unwrap();
        assert_eq!(base.index().count().await.unwrap(), 1);

        let pipeline = base.pipeline_with(
            Arc::new(ScriptedLlm::answering("PVS1.")),
            PromptSet::builtin().unwrap(),
            "llama3",
            PipelineOptions::from(&config),
        );
        let result = pipeline.query("null variant evidence", None).await.unwrap();
        assert_eq!(result.answer, "PVS1.");
        assert_eq!(result.chunks_retrieved, 1);
        assert_eq!(result.sources[0].source_id, "acmg.txt");
    }

    #[tokio::test]
    async fn test_pipeline_from_config_rejects_unknown_provider() {
        let dir = TempDir::new().unwrap();
        let mut config = trigram_config(dir.path());
        config.llm.provider = "nonexistent".to_string();

        let base = KnowledgeBase::new(
            Arc::new(Embedder::with_provider(Arc::new(TrigramProvider::new(64)))),
            Arc::new(InMemoryIndex::new(64)),
        );
        assert!(base.pipeline(&config).is_err());
    }
}
