//! Word-counted text chunking with sentence-aware overlap.
//!
//! Two modes:
//! - sentence-aware (default): sentences are packed greedily up to the target
//!   size, and each new chunk starts with whole sentences carried over from
//!   the end of the previous one
//! - word windows: a fixed window of `chunk_size` words sliding by
//!   `chunk_size - chunk_overlap`
//!
//! Sizes are in words.

use crate::types::Chunk;
use cdss_core::config::ChunkingSettings;

/// Chunking parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkOptions {
    /// Target words per chunk
    pub chunk_size: usize,

    /// Words shared between neighbouring chunks
    pub chunk_overlap: usize,

    /// Pack whole sentences instead of sliding a word window
    pub respect_sentences: bool,
}

impl Default for ChunkOptions {
    fn default() -> Self {
        Self::from(&ChunkingSettings::default())
    }
}

impl From<&ChunkingSettings> for ChunkOptions {
    fn from(settings: &ChunkingSettings) -> Self {
        Self {
            chunk_size: settings.chunk_size,
            chunk_overlap: settings.chunk_overlap,
            respect_sentences: settings.respect_sentences,
        }
    }
}

/// Split text into ordered, non-empty chunks.
///
/// Empty or whitespace-only input yields no chunks.
pub fn chunk(text: &str, options: &ChunkOptions) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let size = options.chunk_size.max(1);
    let chunks = if options.respect_sentences {
        chunk_by_sentences(text, size, options.chunk_overlap)
    } else {
        chunk_by_words(text, size, options.chunk_overlap)
    };

    tracing::debug!(
        "Chunked text into {} chunks (size: {}, overlap: {}, sentences: {})",
        chunks.len(),
        size,
        options.chunk_overlap,
        options.respect_sentences
    );

    chunks
}

/// Chunk `text` and attach source, position and size metadata.
pub fn chunk_with_metadata(source_id: &str, text: &str, options: &ChunkOptions) -> Vec<Chunk> {
    chunk(text, options)
        .into_iter()
        .enumerate()
        .map(|(position, content)| Chunk::new(source_id, position as u32, content))
        .collect()
}

/// Rough number of chunks `text` will produce.
pub fn estimate_chunks(text: &str, chunk_size: usize) -> usize {
    let words = text.split_whitespace().count();
    let per_chunk = (chunk_size / 2).max(1);
    (words / per_chunk).max(1)
}

/// Split on terminal punctuation followed by whitespace and a capital letter.
///
/// Abbreviations such as "Dr. Smith" are split too. Text without any boundary
/// is a single sentence.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((idx, c)) = chars.next() {
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        let end = idx + c.len_utf8();

        let mut next_start = end;
        while let Some(&(ws_idx, ws)) = chars.peek() {
            if !ws.is_whitespace() {
                break;
            }
            next_start = ws_idx + ws.len_utf8();
            chars.next();
        }
        if next_start == end {
            continue;
        }

        if matches!(chars.peek(), Some(&(_, next)) if next.is_uppercase()) {
            push_trimmed(&mut sentences, &text[start..end]);
            start = next_start;
        }
    }
    push_trimmed(&mut sentences, &text[start..]);

    sentences
}

fn push_trimmed<'a>(out: &mut Vec<&'a str>, s: &'a str) {
    let s = s.trim();
    if !s.is_empty() {
        out.push(s);
    }
}

fn word_count(s: &str) -> usize {
    s.split_whitespace().count()
}

fn chunk_by_sentences(text: &str, size: usize, overlap: usize) -> Vec<String> {
    // A carry as large as the target would leave no room for new text
    let budget = if overlap >= size {
        tracing::warn!(
            "Chunk overlap {} is not smaller than chunk size {}, carrying at most {} words",
            overlap,
            size,
            size - 1
        );
        size - 1
    } else {
        overlap
    };

    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_words = 0;

    for sentence in split_sentences(text) {
        let words = word_count(sentence);

        if current_words + words > size && !current.is_empty() {
            chunks.push(current.join(" "));

            // Longest run of whole trailing sentences within the budget
            let mut carried = 0;
            let mut keep_from = current.len();
            for (i, s) in current.iter().enumerate().rev() {
                let n = word_count(s);
                if carried + n > budget {
                    break;
                }
                carried += n;
                keep_from = i;
            }
            current.drain(..keep_from);
            current_words = carried;
        }

        current.push(sentence);
        current_words += words;
    }

    if !current.is_empty() {
        chunks.push(current.join(" "));
    }

    chunks
}

fn chunk_by_words(text: &str, size: usize, overlap: usize) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < words.len() {
        let end = (start + size).min(words.len());
        chunks.push(words[start..end].join(" "));

        if end == words.len() {
            break;
        }

        let next = end.saturating_sub(overlap);
        if next <= start {
            tracing::warn!(
                "Chunk overlap {} does not let the window advance past word {}, emitting the rest as one chunk",
                overlap,
                start
            );
            chunks.push(words[end..].join(" "));
            break;
        }
        start = next;
    }

    chunks
}
