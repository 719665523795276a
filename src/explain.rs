//! Explainable answers: which context sentences back an answer.

use std::collections::HashSet;

use crate::models::{AnswerMetadata, ExplainedAnswer, KeyClause, Reasoning, RelevanceSummary};

pub const PROCESSING_METHOD: &str = "semantic_search_with_llm";

const MIN_CLAUSE_CHARS: usize = 20;
const MIN_WORD_OVERLAP: usize = 2;
const MAX_KEY_CLAUSES: usize = 5;

/// Sentences of `context` sharing at least two words with `question`,
/// best first.
///
/// Words are compared lowercase and whitespace-split, punctuation included.
/// `clause_id` is the sentence's position in the `.`-split context.
pub fn extract_key_clauses(context: &str, question: &str) -> Vec<KeyClause> {
    let lowered = question.to_lowercase();
    let question_words: HashSet<&str> = lowered.split_whitespace().collect();
    if question_words.is_empty() {
        return Vec::new();
    }

    let mut clauses: Vec<KeyClause> = context
        .split('.')
        .enumerate()
        .filter_map(|(i, sentence)| {
            let sentence = sentence.trim();
            if sentence.chars().count() < MIN_CLAUSE_CHARS {
                return None;
            }
            let lowered = sentence.to_lowercase();
            let sentence_words: HashSet<&str> = lowered.split_whitespace().collect();
            let overlap = question_words.intersection(&sentence_words).count();
            (overlap >= MIN_WORD_OVERLAP).then(|| KeyClause {
                clause_id: i,
                text: sentence.to_string(),
                relevance_score: overlap as f64 / question_words.len() as f64,
                word_overlap: overlap,
            })
        })
        .collect();

    // Stable: equal scores keep document order.
    clauses.sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));
    clauses.truncate(MAX_KEY_CLAUSES);
    clauses
}

/// Wrap an answer with its supporting evidence.
pub fn explain_answer(
    question: &str,
    answer: String,
    context: &str,
    summary: &RelevanceSummary,
    model_used: &str,
) -> ExplainedAnswer {
    let key_clauses = extract_key_clauses(context, question);
    ExplainedAnswer {
        question: question.to_string(),
        answer,
        confidence: summary.confidence,
        reasoning: Reasoning {
            semantic_similarity: summary.max_similarity,
            relevant_chunks: summary.relevant_chunk_count,
            has_supporting_evidence: !key_clauses.is_empty(),
        },
        key_clauses,
        metadata: AnswerMetadata {
            timestamp: chrono::Utc::now().to_rfc3339(),
            model_used: model_used.to_string(),
            processing_method: PROCESSING_METHOD.to_string(),
        },
        error: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Confidence;

    const CONTEXT: &str = "The grace period for premium payment is thirty days. \
        Short one. \
        Maternity expenses are covered after a waiting period of two years. \
        The premium must be paid before the grace period ends or the policy lapses";

    #[test]
    fn test_clauses_ranked_by_overlap() {
        let clauses = extract_key_clauses(CONTEXT, "What is the grace period for premium payment?");
        assert_eq!(clauses.len(), 2);
        assert_eq!(clauses[0].clause_id, 0);
        assert_eq!(clauses[0].word_overlap, 6);
        // "payment?" keeps its punctuation, so eight question words.
        assert!((clauses[0].relevance_score - 0.75).abs() < 1e-9);
        assert_eq!(clauses[1].clause_id, 3);
        assert_eq!(clauses[1].word_overlap, 4);
        assert!(clauses[0].relevance_score >= clauses[1].relevance_score);
    }

    #[test]
    fn test_short_sentences_skipped() {
        let clauses = extract_key_clauses("Short one. Tiny bit.", "short one tiny bit");
        assert!(clauses.is_empty());
    }

    #[test]
    fn test_at_most_five_clauses() {
        let context = "alpha beta gamma delta sentence number. ".repeat(8);
        let clauses = extract_key_clauses(&context, "alpha beta");
        assert_eq!(clauses.len(), 5);
        let ids: Vec<usize> = clauses.iter().map(|c| c.clause_id).collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_explained_answer_fields() {
        let summary = RelevanceSummary {
            has_relevant_content: true,
            max_similarity: 0.82,
            relevant_chunk_count: 4,
            confidence: Confidence::High,
            ..RelevanceSummary::empty()
        };
        let explained = explain_answer(
            "What is the grace period for premium payment?",
            "Thirty days.".to_string(),
            CONTEXT,
            &summary,
            "test-model",
        );
        assert_eq!(explained.confidence, Confidence::High);
        assert_eq!(explained.reasoning.relevant_chunks, 4);
        assert!(explained.reasoning.has_supporting_evidence);
        assert_eq!(explained.metadata.model_used, "test-model");
        assert_eq!(explained.metadata.processing_method, "semantic_search_with_llm");
        assert!(chrono::DateTime::parse_from_rfc3339(&explained.metadata.timestamp).is_ok());
    }
}
