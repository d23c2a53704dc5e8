//! Prompt builder for rendering templates and injecting retrieved context.

use crate::loader::load_overrides;
use crate::templates::{builtin, BLOCK_SEPARATOR, MAX_HISTORY, NO_CONTEXT_SENTINEL};
use crate::types::{BuiltPrompt, Exchange, PromptKind};
use cdss_core::{AppError, AppResult};
use handlebars::Handlebars;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Template variables, keyed by placeholder name.
pub type PromptVars<'a> = BTreeMap<&'static str, &'a str>;

/// The set of templates the pipeline renders, compiled once.
///
/// Built-ins are used unless the workspace overrides them.
pub struct PromptSet {
    registry: Handlebars<'static>,
    overridden: Vec<PromptKind>,
}

impl std::fmt::Debug for PromptSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PromptSet")
            .field("overridden", &self.overridden)
            .finish()
    }
}

impl PromptSet {
    /// Built-in templates only.
    pub fn builtin() -> AppResult<Self> {
        Self::with_overrides(HashMap::new())
    }

    /// Built-in templates overridden by `<prompts_dir>/<name>.yaml` files.
    ///
    /// # Example
    /// ```no_run
    /// use cdss_prompt::PromptSet;
    /// use std::path::Path;
    ///
    /// # fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let prompts = PromptSet::load(Path::new(".cdss/prompts"))?;
    /// let built = prompts.build_rag_prompt("What is PVS1?", "[Source 1: acmg.txt (relevance: 0.91)]\n...")?;
    /// println!("{}", built.user);
    /// # Ok(())
    /// # }
    /// ```
    pub fn load(prompts_dir: &Path) -> AppResult<Self> {
        Self::with_overrides(load_overrides(prompts_dir)?)
    }

    fn with_overrides(overrides: HashMap<PromptKind, String>) -> AppResult<Self> {
        let mut registry = Handlebars::new();

        // Disable HTML escaping for plain text
        registry.register_escape_fn(handlebars::no_escape);

        let mut overridden = Vec::new();
        for kind in PromptKind::ALL {
            let template = match overrides.get(&kind) {
                Some(template) => {
                    overridden.push(kind);
                    template.as_str()
                }
                None => builtin(kind),
            };
            registry
                .register_template_string(kind.name(), template)
                .map_err(|e| {
                    AppError::Prompt(format!("Failed to register template '{}': {}", kind, e))
                })?;
        }

        Ok(Self {
            registry,
            overridden,
        })
    }

    /// Kinds whose template came from the workspace.
    pub fn overridden(&self) -> &[PromptKind] {
        &self.overridden
    }

    /// Render one template. Missing variables render as empty strings.
    pub fn render(&self, kind: PromptKind, vars: &PromptVars<'_>) -> AppResult<String> {
        self.registry
            .render(kind.name(), vars)
            .map_err(|e| AppError::Prompt(format!("Failed to render template '{}': {}", kind, e)))
    }

    /// The system prompt sent with every completion.
    pub fn system_prompt(&self) -> AppResult<String> {
        self.render(PromptKind::System, &PromptVars::new())
    }

    /// Combine assembled context and the question into a grounded prompt.
    ///
    /// Empty context or the no-context sentinel selects the canned
    /// no-information prompt instead of the grounding template.
    pub fn build_rag_prompt(&self, query: &str, context: &str) -> AppResult<BuiltPrompt> {
        let mut vars = PromptVars::new();
        vars.insert("query", query);

        let kind = if is_empty_context(context) {
            tracing::debug!("No context available, using no-context prompt");
            PromptKind::NoContext
        } else {
            vars.insert("context", context);
            PromptKind::Rag
        };

        self.build(kind, &vars)
    }

    /// Prompt for a follow-up question carrying the last few exchanges.
    pub fn build_followup_prompt(
        &self,
        query: &str,
        context: &str,
        history: &[Exchange],
    ) -> AppResult<BuiltPrompt> {
        let history = format_history(history);

        let mut vars = PromptVars::new();
        vars.insert("query", query);
        vars.insert("context", context);
        vars.insert("history", &history);

        self.build(PromptKind::Followup, &vars)
    }

    /// Prompt summarizing a set of excerpts.
    pub fn build_summary_prompt<S: AsRef<str>>(&self, excerpts: &[S]) -> AppResult<BuiltPrompt> {
        let combined = excerpts
            .iter()
            .map(|e| e.as_ref())
            .collect::<Vec<_>>()
            .join(BLOCK_SEPARATOR);

        let mut vars = PromptVars::new();
        vars.insert("excerpts", &combined);

        self.build(PromptKind::Summary, &vars)
    }

    fn build(&self, kind: PromptKind, vars: &PromptVars<'_>) -> AppResult<BuiltPrompt> {
        tracing::debug!("Building prompt: {}", kind);
        Ok(BuiltPrompt {
            system: Some(self.system_prompt()?),
            user: self.render(kind, vars)?,
            kind,
        })
    }
}

/// Whether `context` means "nothing was retrieved".
pub fn is_empty_context(context: &str) -> bool {
    context.trim().is_empty() || context == NO_CONTEXT_SENTINEL
}

/// Render the most recent exchanges as `Q:`/`A:` pairs, oldest first.
fn format_history(history: &[Exchange]) -> String {
    let start = history.len().saturating_sub(MAX_HISTORY);
    history[start..]
        .iter()
        .map(|e| format!("Q: {}\nA: {}", e.question, e.answer))
        .collect::<Vec<_>>()
        .join("\n\n")
}
