//! Prompt types for the CDSS answering pipeline.

use serde::{Deserialize, Serialize};

/// The templates the pipeline renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptKind {
    /// Persona and grounding rules, sent as the system prompt
    System,
    /// Grounded answer over retrieved context
    Rag,
    /// Canned prompt used when no context was retrieved
    NoContext,
    /// Follow-up question with conversation history
    Followup,
    /// Summary of guideline excerpts
    Summary,
}

impl PromptKind {
    pub const ALL: [PromptKind; 5] = [
        PromptKind::System,
        PromptKind::Rag,
        PromptKind::NoContext,
        PromptKind::Followup,
        PromptKind::Summary,
    ];

    /// Name used for override files (`<name>.yaml`).
    pub fn name(&self) -> &'static str {
        match self {
            PromptKind::System => "system",
            PromptKind::Rag => "rag",
            PromptKind::NoContext => "no_context",
            PromptKind::Followup => "followup",
            PromptKind::Summary => "summary",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

impl std::fmt::Display for PromptKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A template override loaded from `.cdss/prompts/<name>.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptOverride {
    /// Which built-in template this replaces
    pub name: String,

    /// Template string with Handlebars syntax
    pub template: String,
}

/// One previous question/answer pair of a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exchange {
    pub question: String,
    pub answer: String,
}

impl Exchange {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }
}

/// A fully built prompt ready for LLM execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltPrompt {
    /// System message
    pub system: Option<String>,

    /// User message (required)
    pub user: String,

    /// Template the user message was rendered from
    pub kind: PromptKind,
}
