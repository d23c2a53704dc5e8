//! Text normalization applied before chunking.
//!
//! Extracted guideline text is full of layout noise: typographic quotes,
//! words hyphenated across lines, runs of blank lines, page numbers.

use regex::Regex;
use std::sync::LazyLock;

static HYPHENATED_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\w+)-\n(\w+)").expect("static regex"));
static WRAPPED_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\w{3,})\n(\w{3,})").expect("static regex"));
static SPACE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r" +").expect("static regex"));
static BLANK_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("static regex"));
static TRAILING_SPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r" +\n").expect("static regex"));
static LEADING_SPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n +").expect("static regex"));
static PAGE_NUMBER_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\d{1,4}\n").expect("static regex"));
static PAGE_OF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[Pp]age\s+\d+\s*(of\s+\d+)?").expect("static regex"));

/// Clean raw extracted text.
///
/// `aggressive` also strips page markers, which can remove real content
/// such as a line holding only a number.
pub fn clean_text(text: &str, aggressive: bool) -> String {
    if text.is_empty() {
        return String::new();
    }

    let mut cleaned = normalize_unicode(text);
    cleaned = fix_pdf_artifacts(&cleaned);
    cleaned = normalize_whitespace(&cleaned);
    if aggressive {
        cleaned = remove_page_markers(&cleaned);
    }
    let cleaned = cleaned.trim().to_string();

    tracing::debug!(
        "Cleaned text: {} -> {} chars",
        text.chars().count(),
        cleaned.chars().count()
    );

    cleaned
}

/// Replace typographic characters with ASCII equivalents.
pub fn normalize_unicode(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\u{2018}' | '\u{2019}' => out.push('\''),
            '\u{201c}' | '\u{201d}' => out.push('"'),
            '\u{2013}' | '\u{2014}' => out.push('-'),
            '\u{2026}' => out.push_str("..."),
            '\u{00a0}' => out.push(' '),
            // middle dot and private-use bullets
            '\u{00b7}' | '\u{f0b7}' | '\u{f0a7}' => out.push('-'),
            other => out.push(other),
        }
    }
    out
}

fn fix_pdf_artifacts(text: &str) -> String {
    let text = HYPHENATED_BREAK.replace_all(text, "${1}${2}");
    let text = WRAPPED_LINE.replace_all(&text, "${1} ${2}");
    let text = text.replace('\u{000c}', "\n\n");
    SPACE_RUN.replace_all(&text, " ").into_owned()
}

fn normalize_whitespace(text: &str) -> String {
    let text = BLANK_LINES.replace_all(text, "\n\n");
    let text = TRAILING_SPACE.replace_all(&text, "\n");
    LEADING_SPACE.replace_all(&text, "\n").into_owned()
}

fn remove_page_markers(text: &str) -> String {
    let text = PAGE_NUMBER_LINE.replace_all(text, "\n");
    PAGE_OF.replace_all(&text, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty() {
        assert_eq!(clean_text("", true), "");
    }

    #[test]
    fn test_unicode_normalized() {
        let cleaned = clean_text("\u{201c}Likely\u{201d} \u{2013} it\u{2019}s fine\u{2026}", false);
        assert_eq!(cleaned, "\"Likely\" - it's fine...");
    }

    #[test]
    fn test_hyphenated_line_break_joined() {
        assert_eq!(clean_text("Clinical guide-\nlines", false), "Clinical guidelines");
    }

    #[test]
    fn test_wrapped_line_joined_with_space() {
        assert_eq!(clean_text("variant\ninterpretation", false), "variant interpretation");
    }

    #[test]
    fn test_whitespace_collapsed() {
        let cleaned = clean_text("  This   document  \n\n\n\n   provides guidance  ", false);
        assert_eq!(cleaned, "This document\n\nprovides guidance");
    }

    #[test]
    fn test_form_feed_becomes_paragraph_break() {
        assert_eq!(clean_text("end.\u{000c}Next", false), "end.\n\nNext");
    }

    #[test]
    fn test_page_markers_only_removed_when_aggressive() {
        let text = "Intro text.\n12\nMore text. Page 3 of 10";
        assert_eq!(clean_text(text, false), text);
        assert_eq!(clean_text(text, true), "Intro text.\nMore text.");
    }
}
