//! Source file reading and text extraction.
//!
//! Only text formats are read here. Anything else is rejected so the
//! ingestor can count it as a failed file and move on.

use cdss_core::{AppError, AppResult};
use std::fs;
use std::path::Path;

/// Text formats the plain extractor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Markdown,
    PlainText,
}

impl DocumentFormat {
    /// Detect format from file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "md" | "markdown" => Some(Self::Markdown),
            "txt" | "text" => Some(Self::PlainText),
            _ => None,
        }
    }

    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Markdown => "markdown",
            Self::PlainText => "text",
        }
    }
}

/// Turns a source document into raw text.
pub trait TextExtractor: Send + Sync {
    /// Whether this extractor handles `path`.
    fn supports(&self, path: &Path) -> bool;

    /// Read `path` and return its text content.
    fn extract(&self, path: &Path) -> AppResult<String>;
}

/// Extractor for `.txt`, `.text`, `.md` and `.markdown` files.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn supports(&self, path: &Path) -> bool {
        DocumentFormat::from_path(path).is_some()
    }

    fn extract(&self, path: &Path) -> AppResult<String> {
        let format = DocumentFormat::from_path(path).ok_or_else(|| {
            AppError::Knowledge(format!("Unsupported file type: {:?}", path))
        })?;

        let bytes = fs::read(path)
            .map_err(|e| AppError::Knowledge(format!("Failed to read {:?}: {}", path, e)))?;

        let raw = String::from_utf8(bytes)
            .map_err(|_| AppError::Knowledge(format!("Not a UTF-8 text file: {:?}", path)))?;

        if !is_likely_text(&raw) {
            tracing::warn!("Skipping likely binary file: {:?}", path);
            return Err(AppError::Knowledge(format!(
                "Binary file not supported: {:?}",
                path
            )));
        }

        tracing::debug!("Extracted {} as {}", path.display(), format.as_str());

        Ok(match format {
            DocumentFormat::Markdown => flatten_markdown(&raw),
            DocumentFormat::PlainText => raw,
        })
    }
}

/// Strip Markdown structure, keeping paragraph breaks.
///
/// Heading markers are removed; horizontal rules and code fences are dropped
/// (the fenced content itself is kept).
fn flatten_markdown(text: &str) -> String {
    let mut paragraphs: Vec<String> = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in text.lines() {
        let trimmed = line.trim_start_matches('#').trim();

        if trimmed.starts_with("---") || trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            continue;
        }

        if trimmed.is_empty() {
            if !current.is_empty() {
                paragraphs.push(current.join("\n"));
                current.clear();
            }
        } else {
            current.push(trimmed);
        }
    }
    if !current.is_empty() {
        paragraphs.push(current.join("\n"));
    }

    paragraphs.join("\n\n")
}

/// Check if text is likely text (not binary).
fn is_likely_text(data: &str) -> bool {
    !data.contains('\0')
}
