//! Loader for prompt template overrides.
//!
//! A workspace may replace any built-in template by dropping a YAML file
//! named after the template into `.cdss/prompts/`:
//!
//! ```yaml
//! name: rag
//! template: |
//!   Context:
//!   {{context}}
//!
//!   Question: {{query}}
//! ```

use crate::types::{PromptKind, PromptOverride};
use cdss_core::{AppError, AppResult};
use std::collections::HashMap;
use std::path::Path;

/// Load every override in `prompts_dir`.
///
/// A missing directory means no overrides. Files must be `.yaml` or `.yml`
/// and name one of the built-in templates.
pub fn load_overrides(prompts_dir: &Path) -> AppResult<HashMap<PromptKind, String>> {
    let mut overrides = HashMap::new();

    if !prompts_dir.exists() {
        return Ok(overrides);
    }

    for entry in walkdir::WalkDir::new(prompts_dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        let is_yaml = matches!(
            path.extension().and_then(|s| s.to_str()),
            Some("yaml") | Some("yml")
        );
        if !path.is_file() || !is_yaml {
            continue;
        }

        let (kind, template) = load_override(path)?;
        tracing::info!("Loaded prompt override '{}' from {:?}", kind, path);
        overrides.insert(kind, template);
    }

    Ok(overrides)
}

/// Load and validate a single override file.
fn load_override(path: &Path) -> AppResult<(PromptKind, String)> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        AppError::Prompt(format!("Failed to read prompt file {:?}: {}", path, e))
    })?;

    let definition: PromptOverride = serde_yaml::from_str(&contents).map_err(|e| {
        AppError::Prompt(format!("Failed to parse prompt YAML {:?}: {}", path, e))
    })?;

    let kind = PromptKind::from_name(&definition.name).ok_or_else(|| {
        AppError::Prompt(format!(
            "Unknown prompt '{}' in {:?}. Expected one of: {}",
            definition.name,
            path,
            PromptKind::ALL
                .iter()
                .map(|k| k.name())
                .collect::<Vec<_>>()
                .join(", ")
        ))
    })?;

    if definition.template.trim().is_empty() {
        return Err(AppError::Prompt(format!(
            "Prompt template cannot be empty: {:?}",
            path
        )));
    }

    Ok((kind, definition.template))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_override(dir: &Path, file: &str, content: &str) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join(file), content).unwrap();
    }

    #[test]
    fn test_missing_dir_has_no_overrides() {
        let temp_dir = TempDir::new().unwrap();
        let overrides = load_overrides(&temp_dir.path().join("prompts")).unwrap();
        assert!(overrides.is_empty());
    }

    #[test]
    fn test_load_valid_overrides() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("prompts");
        write_override(&dir, "rag.yaml", "name: rag\ntemplate: \"Q: {{query}}\"\n");
        write_override(&dir, "summary.yml", "name: summary\ntemplate: \"S: {{excerpts}}\"\n");
        write_override(&dir, "notes.txt", "ignored");

        let overrides = load_overrides(&dir).unwrap();
        assert_eq!(overrides.len(), 2);
        assert_eq!(overrides[&PromptKind::Rag], "Q: {{query}}");
        assert_eq!(overrides[&PromptKind::Summary], "S: {{excerpts}}");
    }

    #[test]
    fn test_unknown_name_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("prompts");
        write_override(&dir, "agent.yaml", "name: agent.ask\ntemplate: \"x\"\n");

        let result = load_overrides(&dir);
        assert!(matches!(result, Err(AppError::Prompt(_))));
    }

    #[test]
    fn test_invalid_yaml_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("prompts");
        write_override(&dir, "rag.yaml", "invalid: yaml: content:");

        assert!(load_overrides(&dir).is_err());
    }
}
