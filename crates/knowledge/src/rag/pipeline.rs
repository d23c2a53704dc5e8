//! RAG answering orchestration.
//!
//! Retrieves relevant chunks, assembles a cited context and generates an
//! answer. A question with no relevant chunks gets a fixed fallback answer
//! without calling the completion service.

use crate::rag::context::{format_context, get_sources};
use crate::rag::generator::{AnswerStream, Generator};
use crate::rag::retriever::Retriever;
use crate::rag::types::{
    PipelineOptions, PipelineState, QueryEvent, QueryResult, SourceCitation, SystemStatus,
    NO_INFORMATION_MESSAGE,
};
use crate::types::RetrievedChunk;
use cdss_core::{AppError, AppResult};
use cdss_prompt::Exchange;
use futures::{stream, Stream, StreamExt};
use std::pin::Pin;

/// Events of one streamed answer. Dropping the stream cancels generation.
pub type QueryStream = Pin<Box<dyn Stream<Item = QueryEvent> + Send>>;

fn enter(state: PipelineState) {
    tracing::debug!(state = %state, "Pipeline state");
}

/// Clinical question answering over the knowledge base.
#[derive(Debug, Clone)]
pub struct Pipeline {
    retriever: Retriever,
    generator: Generator,
    options: PipelineOptions,
}

impl Pipeline {
    pub fn new(retriever: Retriever, generator: Generator, options: PipelineOptions) -> Self {
        tracing::info!(
            "CDSS pipeline initialized (top_k={}, temp={})",
            options.top_k,
            options.temperature
        );
        Self {
            retriever,
            generator,
            options,
        }
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    pub fn generator(&self) -> &Generator {
        &self.generator
    }

    /// Probe the completion service and check that the index has content.
    ///
    /// Failures are reported as `false`, never as errors.
    pub async fn check_system_status(&self) -> SystemStatus {
        let llm = self.generator.client().health_check().await;
        let index = match self.retriever.index().count().await {
            Ok(count) => count > 0,
            Err(e) => {
                tracing::warn!("Index status check failed: {}", e);
                false
            }
        };
        SystemStatus::new(llm, index)
    }

    async fn retrieve(
        &self,
        question: &str,
        source_filter: Option<&str>,
        min_similarity: f32,
    ) -> AppResult<Vec<RetrievedChunk>> {
        enter(PipelineState::Retrieving);
        let chunks = self
            .retriever
            .retrieve(question, self.options.top_k, source_filter, min_similarity)
            .await
            .inspect_err(|_| enter(PipelineState::Error))?;

        if chunks.is_empty() {
            tracing::warn!("No relevant chunks found");
            enter(PipelineState::NoContext);
        } else {
            enter(PipelineState::ContextReady);
        }
        Ok(chunks)
    }

    /// Answer `question`, optionally searching only one source.
    ///
    /// No relevant chunks is a successful result carrying the fallback
    /// answer. Collaborator failures are returned as errors.
    pub async fn query(&self, question: &str, source_filter: Option<&str>) -> AppResult<QueryResult> {
        tracing::info!("CDSS query: {}", question);
        enter(PipelineState::Idle);

        let chunks = self
            .retrieve(question, source_filter, self.options.min_similarity)
            .await?;
        if chunks.is_empty() {
            enter(PipelineState::Done);
            return Ok(QueryResult::no_context(question));
        }

        let context = format_context(&chunks);
        let sources = get_sources(&chunks);

        enter(PipelineState::Generating);
        let answer = self
            .generator
            .generate(
                question,
                &context,
                self.options.temperature,
                self.options.max_tokens,
            )
            .await
            .inspect_err(|_| enter(PipelineState::Error))?;
        enter(PipelineState::Done);

        Ok(QueryResult {
            query: question.to_string(),
            answer,
            sources,
            context_used: context,
            chunks_retrieved: chunks.len(),
        })
    }

    /// Answer `question` as a stream of events.
    ///
    /// Retrieval happens before this returns; a retrieval failure is an
    /// error. With no relevant chunks the stream is a single
    /// [`QueryEvent::Error`] and the completion service is not called.
    /// Otherwise it is `Sources`, the answer fragments, then `Done`; a
    /// failure while generating ends the stream with `Error` instead.
    pub async fn query_stream(&self, question: &str, source_filter: Option<&str>) -> AppResult<QueryStream> {
        tracing::info!("CDSS streaming query: {}", question);
        enter(PipelineState::Idle);

        let chunks = self
            .retrieve(question, source_filter, self.options.min_similarity)
            .await?;
        if chunks.is_empty() {
            enter(PipelineState::Done);
            return Ok(stream::iter([QueryEvent::Error(NO_INFORMATION_MESSAGE.to_string())]).boxed());
        }

        let context = format_context(&chunks);
        let sources = get_sources(&chunks);

        enter(PipelineState::Generating);
        let answer = self
            .generator
            .generate_stream(
                question,
                &context,
                self.options.temperature,
                self.options.max_tokens,
            )
            .await;

        Ok(event_stream(sources, answer))
    }

    /// Answer a question in the light of earlier exchanges.
    ///
    /// Only the most recent exchanges are sent to the model.
    pub async fn follow_up(
        &self,
        question: &str,
        history: &[Exchange],
        source_filter: Option<&str>,
    ) -> AppResult<QueryResult> {
        tracing::info!("CDSS follow-up ({} prior exchanges): {}", history.len(), question);
        enter(PipelineState::Idle);

        let chunks = self
            .retrieve(question, source_filter, self.options.min_similarity)
            .await?;
        if chunks.is_empty() {
            enter(PipelineState::Done);
            return Ok(QueryResult::no_context(question));
        }

        let context = format_context(&chunks);
        let sources = get_sources(&chunks);

        enter(PipelineState::Generating);
        let answer = self
            .generator
            .generate_followup(
                question,
                &context,
                history,
                self.options.temperature,
                self.options.max_tokens,
            )
            .await
            .inspect_err(|_| enter(PipelineState::Error))?;
        enter(PipelineState::Done);

        Ok(QueryResult {
            query: question.to_string(),
            answer,
            sources,
            context_used: context,
            chunks_retrieved: chunks.len(),
        })
    }

    /// Summarize the best-matching chunks of one source.
    pub async fn summarize(&self, source_id: &str) -> AppResult<QueryResult> {
        tracing::info!("CDSS summary of '{}'", source_id);
        enter(PipelineState::Idle);

        let chunks = self.retrieve(source_id, Some(source_id), 0.0).await?;
        if chunks.is_empty() {
            enter(PipelineState::Done);
            return Ok(QueryResult::no_context(source_id));
        }

        let excerpts: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();

        enter(PipelineState::Generating);
        let answer = self
            .generator
            .generate_summary(&excerpts, self.options.temperature, self.options.max_tokens)
            .await
            .inspect_err(|_| enter(PipelineState::Error))?;
        enter(PipelineState::Done);

        Ok(QueryResult {
            query: source_id.to_string(),
            answer,
            sources: get_sources(&chunks),
            context_used: format_context(&chunks),
            chunks_retrieved: chunks.len(),
        })
    }
}

enum Stage {
    Sources(Vec<SourceCitation>, AppResult<AnswerStream>),
    Answering(AnswerStream),
    Failed(AppError),
    Finished,
}

/// Sources first, then answer fragments, then exactly one terminal event.
fn event_stream(sources: Vec<SourceCitation>, answer: AppResult<AnswerStream>) -> QueryStream {
    stream::unfold(Stage::Sources(sources, answer), |stage| async move {
        match stage {
            Stage::Sources(sources, Ok(answer)) => {
                Some((QueryEvent::Sources(sources), Stage::Answering(answer)))
            }
            Stage::Sources(sources, Err(e)) => Some((QueryEvent::Sources(sources), Stage::Failed(e))),
            Stage::Answering(mut answer) => match answer.next().await {
                Some(Ok(fragment)) => Some((QueryEvent::AnswerChunk(fragment), Stage::Answering(answer))),
                Some(Err(e)) => {
                    enter(PipelineState::Error);
                    Some((QueryEvent::Error(e.to_string()), Stage::Finished))
                }
                None => {
                    enter(PipelineState::Done);
                    Some((QueryEvent::Done, Stage::Finished))
                }
            },
            Stage::Failed(e) => {
                enter(PipelineState::Error);
                Some((QueryEvent::Error(e.to_string()), Stage::Finished))
            }
            Stage::Finished => None,
        }
    })
    .boxed()
}
