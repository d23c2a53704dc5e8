//! Test doubles and fixtures shared by the scenario tests.

use crate::chunker::ChunkOptions;
use crate::embeddings::{Embedder, TrigramProvider};
use crate::ingest::{IngestOptions, Ingestor};
use crate::memory_index::InMemoryIndex;
use crate::rag::{Generator, Pipeline, PipelineOptions, Retriever};
use async_trait::async_trait;
use cdss_core::{AppError, AppResult};
use cdss_llm::{LlmClient, LlmRequest, LlmResponse, LlmStream, LlmStreamChunk, LlmUsage};
use cdss_prompt::PromptSet;
use futures::StreamExt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const DIMS: usize = 128;

enum Script {
    Answer(String),
    Stream {
        fragments: Vec<String>,
        then_fail: Option<AppError>,
    },
    Fail(AppError),
}

/// Completion service that replays a fixed script and records requests.
pub struct ScriptedLlm {
    script: Script,
    healthy: bool,
    requests: Mutex<Vec<LlmRequest>>,
    pulled: Arc<AtomicUsize>,
}

/// Rebuild an error of the same kind; `AppError` is not `Clone`.
fn replay(error: &AppError) -> AppError {
    match error {
        AppError::Connectivity(m) => AppError::Connectivity(m.clone()),
        AppError::Generation(m) => AppError::Generation(m.clone()),
        AppError::Initialization(m) => AppError::Initialization(m.clone()),
        AppError::Index(m) => AppError::Index(m.clone()),
        other => AppError::Other(other.to_string()),
    }
}

impl ScriptedLlm {
    fn with_script(script: Script) -> Self {
        Self {
            script,
            healthy: true,
            requests: Mutex::new(Vec::new()),
            pulled: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Completes with `answer`, or streams it as one fragment.
    pub fn answering(answer: &str) -> Self {
        Self::with_script(Script::Answer(answer.to_string()))
    }

    /// Streams `fragments`; a non-streaming call gets them concatenated.
    pub fn streaming(fragments: &[&str]) -> Self {
        Self::with_script(Script::Stream {
            fragments: fragments.iter().map(|f| f.to_string()).collect(),
            then_fail: None,
        })
    }

    /// Streams `fragments`, then fails with `error`.
    pub fn streaming_then_failing(fragments: &[&str], error: AppError) -> Self {
        Self::with_script(Script::Stream {
            fragments: fragments.iter().map(|f| f.to_string()).collect(),
            then_fail: Some(error),
        })
    }

    /// Every call fails with `error`.
    pub fn failing(error: AppError) -> Self {
        Self::with_script(Script::Fail(error))
    }

    pub fn unhealthy(mut self) -> Self {
        self.healthy = false;
        self
    }

    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn calls(&self) -> usize {
        self.requests().len()
    }

    /// Stream items the consumer has pulled so far.
    pub fn fragments_pulled(&self) -> usize {
        self.pulled.load(Ordering::SeqCst)
    }

    fn record(&self, request: &LlmRequest) {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(request.clone());
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        self.record(request);
        let content = match &self.script {
            Script::Answer(answer) => answer.clone(),
            Script::Stream {
                then_fail: Some(error),
                ..
            } => return Err(replay(error)),
            Script::Stream { fragments, .. } => fragments.concat(),
            Script::Fail(error) => return Err(replay(error)),
        };
        Ok(LlmResponse {
            content,
            model: request.model.clone(),
            usage: LlmUsage::new(10, 5),
            done: true,
        })
    }

    async fn stream(&self, request: &LlmRequest) -> AppResult<LlmStream> {
        self.record(request);
        let model = request.model.as_str();

        let mut items: Vec<AppResult<LlmStreamChunk>> = match &self.script {
            Script::Answer(answer) => vec![Ok(LlmStreamChunk::fragment(model, answer.as_str()))],
            Script::Stream { fragments, .. } => fragments
                .iter()
                .map(|f| Ok(LlmStreamChunk::fragment(model, f.as_str())))
                .collect(),
            Script::Fail(error) => return Err(replay(error)),
        };
        match &self.script {
            Script::Stream {
                then_fail: Some(error),
                ..
            } => items.push(Err(replay(error))),
            _ => items.push(Ok(LlmStreamChunk::last(model, "", LlmUsage::new(10, 5)))),
        }

        let pulled = Arc::clone(&self.pulled);
        Ok(futures::stream::iter(items)
            .inspect(move |_| {
                pulled.fetch_add(1, Ordering::SeqCst);
            })
            .boxed())
    }

    async fn health_check(&self) -> bool {
        self.healthy
    }

    async fn list_models(&self) -> AppResult<Vec<String>> {
        if self.healthy {
            Ok(vec!["llama3:latest".to_string()])
        } else {
            Err(AppError::Connectivity("scripted service is down".to_string()))
        }
    }
}

pub fn embedder() -> Arc<Embedder> {
    Arc::new(Embedder::with_provider(Arc::new(TrigramProvider::new(DIMS))))
}

/// Pipeline over an in-memory index, plus the handles tests inspect.
pub struct Fixture {
    pub pipeline: Pipeline,
    pub ingestor: Ingestor,
    pub index: Arc<InMemoryIndex>,
    pub llm: Arc<ScriptedLlm>,
}

pub fn fixture(llm: ScriptedLlm, options: PipelineOptions) -> Fixture {
    let embedder = embedder();
    let index = Arc::new(InMemoryIndex::new(DIMS));
    let llm = Arc::new(llm);

    let ingestor = Ingestor::new(
        Arc::clone(&embedder),
        index.clone(),
        IngestOptions {
            chunking: ChunkOptions {
                chunk_size: 40,
                chunk_overlap: 10,
                respect_sentences: true,
            },
            batch_size: 8,
            aggressive_clean: false,
        },
    );

    let prompts = match PromptSet::builtin() {
        Ok(prompts) => Arc::new(prompts),
        Err(e) => panic!("built-in prompts must compile: {}", e),
    };
    let pipeline = Pipeline::new(
        Retriever::new(embedder, index.clone()),
        Generator::new(llm.clone(), prompts, "llama3"),
        options,
    );

    Fixture {
        pipeline,
        ingestor,
        index,
        llm,
    }
}

pub const ACMG: &str = "Pathogenic variants are classified using criteria from the ACMG guidelines. \
    A null variant in a gene where loss of function is a known mechanism of disease is very strong evidence of pathogenicity. \
    Segregation of the variant with disease in multiple affected family members supports pathogenicity. \
    Well-established functional studies showing a damaging effect are strong evidence.";

pub const BENIGN: &str = "Benign variants are common in the population. \
    An allele frequency above five percent in population databases is stand-alone evidence for a benign classification. \
    Lack of segregation in affected family members supports a benign interpretation.";

pub const ONCOLOGY: &str = "Tumor boards review somatic findings. \
    Therapeutic targets are prioritized by level of clinical evidence. \
    Germline confirmation is recommended when a somatic finding suggests a hereditary syndrome.";

/// Fixture with the three guideline documents ingested.
pub async fn seeded(llm: ScriptedLlm, options: PipelineOptions) -> Fixture {
    let fixture = fixture(llm, options);
    for (source, text) in [("acmg.txt", ACMG), ("benign.md", BENIGN), ("oncology.txt", ONCOLOGY)] {
        if let Err(e) = fixture.ingestor.ingest_text(source, text, false).await {
            panic!("failed to seed {}: {}", source, e);
        }
    }
    fixture
}
