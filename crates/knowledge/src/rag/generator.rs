//! Answer generation against the completion service.

use cdss_core::AppResult;
use cdss_llm::{LlmClient, LlmRequest};
use cdss_prompt::{BuiltPrompt, Exchange, PromptSet};
use futures::{Stream, StreamExt, TryStreamExt};
use std::pin::Pin;
use std::sync::Arc;

/// Answer text fragments in the order the service emits them.
///
/// Dropping the stream stops generation; nothing is replayed.
pub type AnswerStream = Pin<Box<dyn Stream<Item = AppResult<String>> + Send>>;

/// Builds prompts and sends them to the completion service.
#[derive(Clone)]
pub struct Generator {
    client: Arc<dyn LlmClient>,
    prompts: Arc<PromptSet>,
    model: String,
}

impl std::fmt::Debug for Generator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Generator")
            .field("provider", &self.client.provider_name())
            .field("model", &self.model)
            .finish()
    }
}

impl Generator {
    pub fn new(client: Arc<dyn LlmClient>, prompts: Arc<PromptSet>, model: impl Into<String>) -> Self {
        Self {
            client,
            prompts,
            model: model.into(),
        }
    }

    pub fn client(&self) -> &Arc<dyn LlmClient> {
        &self.client
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Whether the configured model is installed on the service.
    ///
    /// A bare name such as `llama3` matches any tag of it (`llama3:latest`).
    pub async fn model_available(&self) -> AppResult<bool> {
        let models = self.client.list_models().await?;
        Ok(models.iter().any(|name| {
            name == &self.model
                || name
                    .strip_prefix(self.model.as_str())
                    .is_some_and(|tag| tag.starts_with(':'))
        }))
    }

    /// Answer `query` from `context` and return the completion verbatim.
    ///
    /// Context equal to the no-context sentinel selects the canned
    /// no-information prompt.
    pub async fn generate(
        &self,
        query: &str,
        context: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> AppResult<String> {
        let prompt = self.prompts.build_rag_prompt(query, context)?;
        self.complete(&prompt, temperature, max_tokens).await
    }

    /// Same prompt as [`Generator::generate`], streamed.
    pub async fn generate_stream(
        &self,
        query: &str,
        context: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> AppResult<AnswerStream> {
        let prompt = self.prompts.build_rag_prompt(query, context)?;
        self.stream(&prompt, temperature, max_tokens).await
    }

    /// Answer a follow-up question with recent exchanges in the prompt.
    pub async fn generate_followup(
        &self,
        query: &str,
        context: &str,
        history: &[Exchange],
        temperature: f32,
        max_tokens: u32,
    ) -> AppResult<String> {
        let prompt = self.prompts.build_followup_prompt(query, context, history)?;
        self.complete(&prompt, temperature, max_tokens).await
    }

    /// Summarize excerpts of one source.
    pub async fn generate_summary<S: AsRef<str>>(
        &self,
        excerpts: &[S],
        temperature: f32,
        max_tokens: u32,
    ) -> AppResult<String> {
        let prompt = self.prompts.build_summary_prompt(excerpts)?;
        self.complete(&prompt, temperature, max_tokens).await
    }

    fn request(&self, prompt: &BuiltPrompt, temperature: f32, max_tokens: u32) -> LlmRequest {
        let request = LlmRequest::new(prompt.user.clone(), self.model.clone())
            .with_temperature(temperature)
            .with_max_tokens(max_tokens);
        match &prompt.system {
            Some(system) => request.with_system(system.clone()),
            None => request,
        }
    }

    async fn complete(&self, prompt: &BuiltPrompt, temperature: f32, max_tokens: u32) -> AppResult<String> {
        tracing::debug!(
            "Generating answer (provider: {}, model: {}, prompt: {})",
            self.client.provider_name(),
            self.model,
            prompt.kind
        );

        let response = self
            .client
            .complete(&self.request(prompt, temperature, max_tokens))
            .await?;

        tracing::debug!(
            "Generated {} characters ({} completion tokens)",
            response.content.len(),
            response.usage.completion_tokens
        );

        Ok(response.content)
    }

    async fn stream(&self, prompt: &BuiltPrompt, temperature: f32, max_tokens: u32) -> AppResult<AnswerStream> {
        tracing::debug!(
            "Streaming answer (provider: {}, model: {}, prompt: {})",
            self.client.provider_name(),
            self.model,
            prompt.kind
        );

        let request = self.request(prompt, temperature, max_tokens).with_streaming();
        let chunks = self.client.stream(&request).await?;

        Ok(chunks
            .try_filter_map(|chunk| async move {
                Ok((!chunk.content.is_empty()).then_some(chunk.content))
            })
            .boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::support::ScriptedLlm;
    use cdss_core::AppError;
    use cdss_prompt::{PromptKind, NO_CONTEXT_SENTINEL};

    fn generator(llm: Arc<ScriptedLlm>) -> Generator {
        Generator::new(llm, Arc::new(PromptSet::builtin().unwrap()), "llama3")
    }

    #[tokio::test]
    async fn test_generate_returns_completion_verbatim() {
        let llm = Arc::new(ScriptedLlm::answering("  PVS1 applies [Source 1].\n"));
        let answer = generator(llm.clone())
            .generate("What is PVS1?", "[Source 1: acmg.txt (relevance: 0.90)]\nPVS1 ...", 0.3, 256)
            .await
            .unwrap();

        assert_eq!(answer, "  PVS1 applies [Source 1].\n");

        let requests = llm.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].model, "llama3");
        assert_eq!(requests[0].temperature, Some(0.3));
        assert_eq!(requests[0].max_tokens, Some(256));
        assert!(requests[0].system.is_some());
        assert!(requests[0].prompt.contains("What is PVS1?"));
        assert!(requests[0].prompt.contains("[Source 1: acmg.txt"));
        assert!(!requests[0].stream);
    }

    #[tokio::test]
    async fn test_sentinel_context_uses_no_context_prompt() {
        let llm = Arc::new(ScriptedLlm::answering("Nothing found."));
        generator(llm.clone())
            .generate("What is PVS1?", NO_CONTEXT_SENTINEL, 0.3, 256)
            .await
            .unwrap();

        let prompt = &llm.requests()[0].prompt;
        assert!(!prompt.contains(NO_CONTEXT_SENTINEL));
        assert_eq!(
            prompt,
            &PromptSet::builtin()
                .unwrap()
                .build_rag_prompt("What is PVS1?", "")
                .unwrap()
                .user
        );
        assert_eq!(
            PromptSet::builtin().unwrap().build_rag_prompt("q", NO_CONTEXT_SENTINEL).unwrap().kind,
            PromptKind::NoContext
        );
    }

    #[tokio::test]
    async fn test_stream_yields_fragments_in_order() {
        let llm = Arc::new(ScriptedLlm::streaming(&["PVS1 ", "", "is ", "very strong."]));
        let fragments: Vec<String> = generator(llm.clone())
            .generate_stream("q", "context", 0.3, 64)
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();

        assert_eq!(fragments, vec!["PVS1 ", "is ", "very strong."]);
        assert!(llm.requests()[0].stream);
    }

    #[tokio::test]
    async fn test_stream_can_stop_early() {
        let llm = Arc::new(ScriptedLlm::streaming(&["one", "two", "three"]));
        let mut stream = generator(llm.clone())
            .generate_stream("q", "context", 0.3, 64)
            .await
            .unwrap();

        assert_eq!(stream.next().await.unwrap().unwrap(), "one");
        drop(stream);
        assert_eq!(llm.fragments_pulled(), 1);
    }

    #[tokio::test]
    async fn test_model_available_matches_tags() {
        let llm = Arc::new(ScriptedLlm::answering("x"));
        let prompts = Arc::new(PromptSet::builtin().unwrap());

        assert!(Generator::new(llm.clone(), prompts.clone(), "llama3")
            .model_available()
            .await
            .unwrap());
        assert!(Generator::new(llm.clone(), prompts.clone(), "llama3:latest")
            .model_available()
            .await
            .unwrap());
        assert!(!Generator::new(llm.clone(), prompts.clone(), "llama")
            .model_available()
            .await
            .unwrap());
        assert!(!Generator::new(llm, prompts, "meditron")
            .model_available()
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_model_available_fails_when_service_down() {
        let llm = Arc::new(ScriptedLlm::answering("x").unhealthy());
        let err = generator(llm).model_available().await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_generation_failure_propagates() {
        let llm = Arc::new(ScriptedLlm::failing(AppError::Generation("model crashed".to_string())));
        let err = generator(llm)
            .generate("q", "context", 0.3, 64)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Generation(_)));
    }
}
