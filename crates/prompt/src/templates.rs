//! Built-in prompt templates.
//!
//! Templates use Handlebars syntax and are rendered with escaping disabled.

use crate::types::PromptKind;

/// Context text that signals "nothing was retrieved".
///
/// The context assembler produces it for an empty chunk list and the prompt
/// builder recognizes it, so the model is never asked to answer from empty
/// context.
pub const NO_CONTEXT_SENTINEL: &str = "No relevant information found in the knowledge base.";

/// Number of previous exchanges a follow-up prompt carries.
pub const MAX_HISTORY: usize = 3;

/// Separator between context blocks and between summary excerpts.
pub const BLOCK_SEPARATOR: &str = "\n\n---\n\n";

pub const SYSTEM_PROMPT: &str = r#"You are a Clinical Decision Support Assistant specialized in genetic variant interpretation and clinical guidelines.

CRITICAL RULES:
1. ONLY use information from the provided context. Do NOT use prior knowledge.
2. If the context doesn't contain relevant information, say "I don't have information about this in my knowledge base."
3. Always cite your sources using [Source X] format.
4. Be precise and medically accurate.
5. When uncertain, acknowledge the uncertainty.
6. This is decision SUPPORT - always recommend consulting with qualified healthcare professionals.

RESPONSE FORMAT:
- Provide clear, structured answers
- Use bullet points for multiple items
- Include source citations inline
- End with any relevant caveats or recommendations for further consultation"#;

pub const RAG_TEMPLATE: &str = r#"Based on the following clinical guidelines and evidence, answer the user's question.

CONTEXT FROM KNOWLEDGE BASE:
{{context}}

---

USER QUESTION: {{query}}

Provide a comprehensive answer based ONLY on the context above. Cite sources using [Source X] format."#;

pub const NO_CONTEXT_TEMPLATE: &str = r#"I apologize, but I couldn't find relevant information in my knowledge base to answer your question about: "{{query}}"

This could mean:
1. The topic isn't covered in the currently loaded clinical guidelines
2. The question may need to be rephrased
3. Additional guidelines may need to be ingested

Please consult with a qualified healthcare professional or try rephrasing your question."#;

pub const FOLLOWUP_TEMPLATE: &str = r#"{{#if history}}PREVIOUS CONVERSATION:
{{history}}

---

{{/if}}Based on the following context, answer the follow-up question.

CONTEXT:
{{context}}

---

FOLLOW-UP QUESTION: {{query}}

Answer based on the context. Reference previous answers if relevant."#;

pub const SUMMARY_TEMPLATE: &str = r#"Summarize the following clinical guideline excerpts into a concise overview.

EXCERPTS:
{{excerpts}}

---

Provide a structured summary of the key points."#;

/// Built-in template text for a prompt kind.
pub fn builtin(kind: PromptKind) -> &'static str {
    match kind {
        PromptKind::System => SYSTEM_PROMPT,
        PromptKind::Rag => RAG_TEMPLATE,
        PromptKind::NoContext => NO_CONTEXT_TEMPLATE,
        PromptKind::Followup => FOLLOWUP_TEMPLATE,
        PromptKind::Summary => SUMMARY_TEMPLATE,
    }
}
