//! Word-window text chunker.
//!
//! Splits normalized document text into overlapping, fixed-size windows of
//! whitespace-delimited words. Window `i` starts at word `i * (size - overlap)`;
//! the last window may be shorter than `size`. Chunking is a pure function of
//! its inputs.
//!
//! # Example
//!
//! ```rust
//! use docqa::chunk::split_words;
//!
//! let chunks = split_words("a b c d e f g", 4, 2).unwrap();
//! assert_eq!(chunks.len(), 3);
//! assert_eq!(chunks[1].text, "c d e f");
//! assert_eq!(chunks[2].word_count, 3);
//! ```

use crate::error::{RagError, Result};
use crate::models::Chunk;

/// Trim each line, drop blank lines, and collapse runs of blank lines.
pub fn normalize_text(text: &str) -> String {
    let mut cleaned = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    while cleaned.contains("\n\n\n") {
        cleaned = cleaned.replace("\n\n\n", "\n\n");
    }

    cleaned
}

/// Split `text` into overlapping windows of `chunk_size` words.
///
/// Returns an empty vector for text with no words.
///
/// # Errors
///
/// [`RagError::Configuration`] unless `chunk_size > 0` and `overlap < chunk_size`;
/// a zero stride would never advance.
pub fn split_words(text: &str, chunk_size: usize, overlap: usize) -> Result<Vec<Chunk>> {
    if chunk_size == 0 {
        return Err(RagError::Configuration(
            "chunk_size must be > 0".to_string(),
        ));
    }
    if overlap >= chunk_size {
        return Err(RagError::Configuration(format!(
            "overlap ({}) must be < chunk_size ({})",
            overlap, chunk_size
        )));
    }

    let words: Vec<&str> = text.split_whitespace().collect();
    let stride = chunk_size - overlap;
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < words.len() {
        let end = (start + chunk_size).min(words.len());
        chunks.push(Chunk {
            id: chunks.len(),
            text: words[start..end].join(" "),
            start_word: start,
            end_word: end,
            word_count: end - start,
        });

        if start + chunk_size >= words.len() {
            break;
        }
        start += stride;
    }

    tracing::debug!(chunks = chunks.len(), words = words.len(), "split text into chunks");
    Ok(chunks)
}
