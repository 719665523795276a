//! Retrieval-quality analysis for a single question.
//!
//! The analysis is advisory: any failure is folded into a low-confidence
//! summary that carries the error text, and never reaches the caller as an
//! `Err`.

use crate::index::VectorIndex;
use crate::models::{Confidence, RelevanceSummary};

/// Chunks kept in [`RelevanceSummary::top_chunks`].
const TOP_CHUNKS_KEPT: usize = 3;

const HIGH_MIN_SIMILARITY: f32 = 0.8;
const HIGH_MIN_RELEVANT: usize = 3;
const MEDIUM_MIN_SIMILARITY: f32 = 0.6;
const MEDIUM_MIN_RELEVANT: usize = 2;

/// Map the best score and the number of chunks above threshold to a tier.
///
/// First match wins: high, then medium, else low.
pub fn confidence_for(max_similarity: f32, relevant_chunk_count: usize) -> Confidence {
    if max_similarity >= HIGH_MIN_SIMILARITY && relevant_chunk_count >= HIGH_MIN_RELEVANT {
        Confidence::High
    } else if max_similarity >= MEDIUM_MIN_SIMILARITY && relevant_chunk_count >= MEDIUM_MIN_RELEVANT
    {
        Confidence::Medium
    } else {
        Confidence::Low
    }
}

#[derive(Debug, Clone)]
pub struct RelevanceAnalyzer {
    similarity_threshold: f32,
    top_k: usize,
}

impl RelevanceAnalyzer {
    pub fn new(similarity_threshold: f32, top_k: usize) -> Self {
        Self {
            similarity_threshold,
            top_k,
        }
    }

    /// Summarize how well `query` (a normalized embedding) matches `index`.
    pub fn analyze(&self, query: &[f32], index: &VectorIndex) -> RelevanceSummary {
        let results = match index.search(query, self.top_k) {
            Ok(results) => results,
            Err(e) => {
                tracing::error!(error = %e, "relevance analysis failed");
                return RelevanceSummary::failed(e.to_string());
            }
        };

        if results.is_empty() {
            return RelevanceSummary::empty();
        }

        let scores: Vec<f32> = results.iter().map(|r| r.similarity_score).collect();
        let max_similarity = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let avg_similarity = scores.iter().sum::<f32>() / scores.len() as f32;
        let relevant_chunk_count = scores
            .iter()
            .filter(|s| **s >= self.similarity_threshold)
            .count();
        let confidence = confidence_for(max_similarity, relevant_chunk_count);

        tracing::debug!(
            max_similarity,
            avg_similarity,
            relevant_chunk_count,
            %confidence,
            "analyzed query relevance"
        );

        RelevanceSummary {
            has_relevant_content: relevant_chunk_count > 0,
            max_similarity,
            avg_similarity,
            relevant_chunk_count,
            confidence,
            top_chunks: results.into_iter().take(TOP_CHUNKS_KEPT).collect(),
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Chunk;

    fn unit_at(score: f32) -> Vec<f32> {
        vec![score, (1.0 - score * score).max(0.0).sqrt()]
    }

    fn index_with_scores(scores: &[f32]) -> VectorIndex {
        let chunks = (0..scores.len())
            .map(|i| Chunk {
                id: i,
                text: format!("chunk {}", i),
                start_word: i,
                end_word: i + 1,
                word_count: 1,
            })
            .collect();
        let mut index = VectorIndex::new();
        index
            .insert_all(chunks, scores.iter().map(|s| unit_at(*s)).collect(), 2)
            .unwrap();
        index
    }

    #[test]
    fn test_tier_boundaries() {
        assert_eq!(confidence_for(0.8, 3), Confidence::High);
        assert_eq!(confidence_for(0.79, 3), Confidence::Medium);
        assert_eq!(confidence_for(0.8, 2), Confidence::Medium);
        assert_eq!(confidence_for(0.6, 2), Confidence::Medium);
        assert_eq!(confidence_for(0.59, 2), Confidence::Low);
        assert_eq!(confidence_for(0.6, 1), Confidence::Low);
        assert_eq!(confidence_for(0.95, 1), Confidence::Low);
        assert_eq!(confidence_for(0.0, 0), Confidence::Low);
    }

    #[test]
    fn test_summary_statistics() {
        let index = index_with_scores(&[0.9, 0.5, 0.1, 0.35]);
        let analyzer = RelevanceAnalyzer::new(0.3, 10);
        let summary = analyzer.analyze(&[1.0, 0.0], &index);

        assert!((summary.max_similarity - 0.9).abs() < 1e-5);
        assert!((summary.avg_similarity - 0.4625).abs() < 1e-5);
        assert_eq!(summary.relevant_chunk_count, 3);
        assert_eq!(summary.confidence, Confidence::High);
        assert!(summary.has_relevant_content);
        assert_eq!(summary.top_chunks.len(), 3);
        assert_eq!(summary.top_chunks[0].chunk.id, 0);
    }

    #[test]
    fn test_nothing_above_threshold() {
        let index = index_with_scores(&[0.2, 0.1]);
        let summary = RelevanceAnalyzer::new(0.3, 10).analyze(&[1.0, 0.0], &index);
        assert!(!summary.has_relevant_content);
        assert_eq!(summary.relevant_chunk_count, 0);
        assert_eq!(summary.confidence, Confidence::Low);
    }

    #[test]
    fn test_only_top_k_considered() {
        let index = index_with_scores(&[0.9, 0.85, 0.84, 0.83]);
        let summary = RelevanceAnalyzer::new(0.3, 2).analyze(&[1.0, 0.0], &index);
        assert_eq!(summary.relevant_chunk_count, 2);
        assert_eq!(summary.confidence, Confidence::Medium);
    }

    #[test]
    fn test_empty_index() {
        let index = index_with_scores(&[]);
        let summary = RelevanceAnalyzer::new(0.3, 10).analyze(&[1.0, 0.0], &index);
        assert_eq!(summary.max_similarity, 0.0);
        assert_eq!(summary.avg_similarity, 0.0);
        assert!(summary.error.is_none());
    }

    #[test]
    fn test_failure_is_swallowed() {
        let summary = RelevanceAnalyzer::new(0.3, 10).analyze(&[1.0, 0.0], &VectorIndex::new());
        assert_eq!(summary.confidence, Confidence::Low);
        assert!(!summary.has_relevant_content);
        assert!(summary.error.is_some());
    }
}
