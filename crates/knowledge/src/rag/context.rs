//! Context assembly: turn retrieved chunks into prompt text and citations.

use crate::rag::types::SourceCitation;
use crate::types::RetrievedChunk;
use cdss_prompt::{BLOCK_SEPARATOR, NO_CONTEXT_SENTINEL};

/// Characters of chunk content shown in a citation preview.
pub const PREVIEW_CHARS: usize = 100;

/// Render chunks as numbered, citation-annotated blocks.
///
/// An empty slice renders as [`NO_CONTEXT_SENTINEL`], which the generator
/// recognizes.
pub fn format_context(chunks: &[RetrievedChunk]) -> String {
    if chunks.is_empty() {
        return NO_CONTEXT_SENTINEL.to_string();
    }

    chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            format!(
                "[Source {}: {} (relevance: {:.2})]\n{}",
                i + 1,
                chunk.source_id,
                chunk.similarity,
                chunk.content
            )
        })
        .collect::<Vec<_>>()
        .join(BLOCK_SEPARATOR)
}

/// One citation per chunk, in the same order.
pub fn get_sources(chunks: &[RetrievedChunk]) -> Vec<SourceCitation> {
    chunks
        .iter()
        .map(|chunk| SourceCitation {
            source_id: chunk.source_id.clone(),
            position: chunk.position,
            similarity: round3(chunk.similarity),
            preview: preview(&chunk.content),
        })
        .collect()
}

fn preview(content: &str) -> String {
    let mut preview: String = content.chars().take(PREVIEW_CHARS).collect();
    preview.push_str("...");
    preview
}

fn round3(value: f32) -> f32 {
    (value * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn retrieved(source: &str, position: u32, content: &str, similarity: f32) -> RetrievedChunk {
        RetrievedChunk {
            content: content.to_string(),
            source_id: source.to_string(),
            position,
            similarity,
        }
    }

    #[test]
    fn test_empty_context_is_sentinel() {
        assert_eq!(
            format_context(&[]),
            "No relevant information found in the knowledge base."
        );
    }

    #[test]
    fn test_format_context_blocks() {
        let chunks = vec![
            retrieved("acmg.txt", 3, "PVS1 is very strong evidence.", 0.9123),
            retrieved("clingen.md", 0, "Gene-disease validity.", 0.5),
        ];

        assert_eq!(
            format_context(&chunks),
            "[Source 1: acmg.txt (relevance: 0.91)]\nPVS1 is very strong evidence.\
             \n\n---\n\n\
             [Source 2: clingen.md (relevance: 0.50)]\nGene-disease validity."
        );
    }

    #[test]
    fn test_get_sources_preserves_order_and_count() {
        let chunks = vec![
            retrieved("b.txt", 1, "second", 0.2),
            retrieved("a.txt", 0, "first", 0.8),
            retrieved("b.txt", 0, "third", 0.2),
        ];

        let sources = get_sources(&chunks);
        assert_eq!(sources.len(), chunks.len());
        for (source, chunk) in sources.iter().zip(&chunks) {
            assert_eq!(source.source_id, chunk.source_id);
            assert_eq!(source.position, chunk.position);
        }
    }

    #[test]
    fn test_citation_rounding_and_preview() {
        let long = "x".repeat(250);
        let sources = get_sources(&[
            retrieved("a.txt", 0, &long, 0.87654),
            retrieved("b.txt", 0, "short", -0.12345),
        ]);

        assert!((sources[0].similarity - 0.877).abs() < 1e-6);
        assert_eq!(sources[0].preview, format!("{}...", "x".repeat(100)));
        assert!((sources[1].similarity + 0.123).abs() < 1e-6);
        assert_eq!(sources[1].preview, "short...");
    }

    #[test]
    fn test_preview_counts_characters() {
        let text = "é".repeat(120);
        let sources = get_sources(&[retrieved("a.txt", 0, &text, 0.5)]);
        assert_eq!(sources[0].preview.chars().count(), 103);
    }
}
