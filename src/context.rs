//! Turns retrieved chunks into the context string handed to the answerer.

use crate::error::Result;
use crate::index::VectorIndex;
use crate::models::{Chunk, RankedResult};

#[derive(Debug, Clone)]
pub struct ContextAssembler {
    similarity_threshold: f32,
}

impl ContextAssembler {
    pub fn new(similarity_threshold: f32) -> Self {
        Self {
            similarity_threshold,
        }
    }

    /// Build a context from the best `max_chunks` results at or above the
    /// similarity threshold.
    ///
    /// An empty string means nothing survived filtering; callers fall back
    /// to [`fallback_context`].
    pub fn assemble(&self, query: &[f32], index: &VectorIndex, max_chunks: usize) -> Result<String> {
        let relevant: Vec<RankedResult> = index
            .search(query, max_chunks)?
            .into_iter()
            .filter(|r| r.similarity_score >= self.similarity_threshold)
            .collect();

        if relevant.is_empty() {
            tracing::warn!(threshold = self.similarity_threshold, "no chunks above threshold");
            return Ok(String::new());
        }

        let context = relevant
            .iter()
            .map(format_block)
            .collect::<Vec<_>>()
            .join("\n\n");

        tracing::info!(
            chunks = relevant.len(),
            chars = context.len(),
            "assembled context"
        );
        Ok(context)
    }
}

fn format_block(result: &RankedResult) -> String {
    format!(
        "[Chunk {} - Similarity: {:.3}]\n{}",
        result.rank, result.similarity_score, result.chunk.text
    )
}

/// The first `count` chunks in document order, separated by blank lines.
pub fn fallback_context(chunks: &[Chunk], count: usize) -> String {
    chunks
        .iter()
        .take(count)
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunks(n: usize) -> Vec<Chunk> {
        (0..n)
            .map(|i| Chunk {
                id: i,
                text: format!("text of chunk {}", i),
                start_word: i * 4,
                end_word: i * 4 + 4,
                word_count: 4,
            })
            .collect()
    }

    fn index(vectors: Vec<Vec<f32>>) -> VectorIndex {
        let mut index = VectorIndex::new();
        index
            .insert_all(chunks(vectors.len()), vectors, 2)
            .unwrap();
        index
    }

    #[test]
    fn test_blocks_in_rank_order() {
        let idx = index(vec![vec![0.0, 1.0], vec![1.0, 0.0], vec![0.6, 0.8]]);
        let context = ContextAssembler::new(0.3).assemble(&[1.0, 0.0], &idx, 8).unwrap();
        assert_eq!(
            context,
            "[Chunk 1 - Similarity: 1.000]\ntext of chunk 1\n\n\
             [Chunk 2 - Similarity: 0.600]\ntext of chunk 2"
        );
    }

    #[test]
    fn test_max_chunks_bounds_context() {
        let idx = index(vec![vec![1.0, 0.0]; 5]);
        let context = ContextAssembler::new(0.3).assemble(&[1.0, 0.0], &idx, 2).unwrap();
        assert_eq!(context.matches("[Chunk").count(), 2);
    }

    #[test]
    fn test_empty_when_nothing_relevant() {
        let idx = index(vec![vec![0.0, 1.0], vec![-1.0, 0.0]]);
        let context = ContextAssembler::new(0.3).assemble(&[1.0, 0.0], &idx, 8).unwrap();
        assert_eq!(context, "");
    }

    #[test]
    fn test_unbuilt_index_is_error() {
        let result = ContextAssembler::new(0.3).assemble(&[1.0, 0.0], &VectorIndex::new(), 8);
        assert!(result.is_err());
    }

    #[test]
    fn test_fallback_takes_first_chunks_in_order() {
        let all = chunks(7);
        let context = fallback_context(&all, 5);
        assert!(context.starts_with("text of chunk 0\n\ntext of chunk 1"));
        assert!(context.ends_with("text of chunk 4"));
        assert!(!context.contains("chunk 5"));
        assert_eq!(fallback_context(&all[..2], 5), "text of chunk 0\n\ntext of chunk 1");
    }
}
