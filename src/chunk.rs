//! Paragraph-boundary text segmenter.
//!
//! Splits extracted document text into retrieval chunks of at most
//! `max_chars` characters. Each step takes the next window of `max_chars`
//! characters and cuts at the last blank line (`\n\n`) inside it, or at the
//! window edge when there is none. Chunks are trimmed and the scan resumes
//! after the cut with leading whitespace skipped.
//!
//! Sizes are counted in `char`s so a cut never lands inside a UTF-8 sequence.
//! The output is a pure function of the input.

use crate::models::Chunk;

/// Default chunk size in characters.
pub const DEFAULT_MAX_CHUNK_CHARS: usize = 1000;

const PARAGRAPH_BREAK: &str = "\n\n";

/// Split text into trimmed chunks, in order. Empty or whitespace-only input
/// yields no chunks.
pub fn segment(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut rest = text.trim_start();

    while !rest.is_empty() {
        let window_end = rest
            .char_indices()
            .nth(max_chars)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        let window = &rest[..window_end];

        let cut = match window.rfind(PARAGRAPH_BREAK) {
            Some(pos) if pos > 0 => pos,
            _ => window_end,
        };

        let piece = rest[..cut].trim();
        if !piece.is_empty() {
            chunks.push(piece.to_string());
        }
        rest = rest[cut..].trim_start();
    }

    chunks
}

/// Segment text into [`Chunk`]s with contiguous indices starting at 0.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<Chunk> {
    segment(text, max_chars)
        .into_iter()
        .enumerate()
        .map(|(i, text)| Chunk::new(i, text))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn without_whitespace(s: &str) -> String {
        s.chars().filter(|c| !c.is_whitespace()).collect()
    }

    #[test]
    fn test_empty_text() {
        assert!(segment("", 1000).is_empty());
        assert!(segment("  \n\n \t", 1000).is_empty());
    }

    #[test]
    fn test_small_text_single_chunk() {
        let chunks = segment("  Hello, world!\n", 1000);
        assert_eq!(chunks, vec!["Hello, world!".to_string()]);
    }

    #[test]
    fn test_cuts_at_last_paragraph_break_in_window() {
        // window of 20 chars: "aaaa\n\nbbbb\n\ncccccccc" -> last break at 10
        let text = "aaaa\n\nbbbb\n\ncccccccccccccccc";
        let chunks = segment(text, 20);
        assert_eq!(chunks[0], "aaaa\n\nbbbb");
        assert_eq!(chunks[1], "cccccccccccccccc");
    }

    #[test]
    fn test_hard_cut_without_paragraph_break() {
        let text = "x".repeat(25);
        let chunks = segment(&text, 10);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 10);
        assert_eq!(chunks[1].len(), 10);
        assert_eq!(chunks[2].len(), 5);
    }

    #[test]
    fn test_page_markers_act_as_boundaries() {
        let text = "\n=== Page 1 ===\nfirst page text\n\n=== Page 2 ===\nsecond page text\n";
        let chunks = segment(text, 40);
        assert_eq!(chunks[0], "=== Page 1 ===\nfirst page text");
        assert_eq!(chunks[1], "=== Page 2 ===\nsecond page text");
    }

    #[test]
    fn test_multibyte_text_is_cut_on_char_boundaries() {
        let text = "é".repeat(15);
        let chunks = segment(&text, 4);
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[0].chars().count(), 4);
        assert_eq!(chunks[3].chars().count(), 3);
    }

    #[test]
    fn test_lossless_modulo_cut_whitespace() {
        let text = (0..120)
            .map(|i| format!("Paragraph {} talks about momentum and energy.", i))
            .collect::<Vec<_>>()
            .join("\n\n");
        let chunks = segment(&text, 300);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.chars().count() <= 300));
        assert_eq!(
            without_whitespace(&chunks.concat()),
            without_whitespace(&text)
        );

        // Chunks appear in the source in order.
        let mut from = 0;
        for c in &chunks {
            let pos = text[from..].find(c.as_str()).expect("chunk not in source");
            from += pos + c.len();
        }
    }

    #[test]
    fn test_deterministic() {
        let text = "Alpha\n\nBeta\n\nGamma\n\nDelta ".repeat(40);
        assert_eq!(segment(&text, 50), segment(&text, 50));
    }

    #[test]
    fn test_chunk_ids_contiguous() {
        let text = (0..50)
            .map(|i| format!("Paragraph number {}.", i))
            .collect::<Vec<_>>()
            .join("\n\n");
        let chunks = chunk_text(&text, 40);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.chunk_index, i, "Index mismatch at position {}", i);
            assert_eq!(c.id, format!("chunk_{}", i));
        }
    }
}
