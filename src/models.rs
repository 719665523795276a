//! Core data models used throughout docqa.
//!
//! These types represent the chunks, search results, and relevance summaries
//! that flow through the build and query phases of the pipeline.

use serde::Serialize;

/// A contiguous, overlapping word window of a document.
///
/// `end_word - start_word == word_count` always holds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chunk {
    /// Position in the document's chunk sequence, starting at 0.
    pub id: usize,
    pub text: String,
    pub start_word: usize,
    pub end_word: usize,
    pub word_count: usize,
}

/// Plain text produced by a document source, plus the format it was decoded from.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub text: String,
    /// Extension-style tag, e.g. `".pdf"` or `".docx"`.
    pub file_type: String,
}

/// A chunk returned by a similarity search.
#[derive(Debug, Clone, Serialize)]
pub struct RankedResult {
    pub chunk: Chunk,
    /// Cosine similarity in `[-1, 1]`.
    pub similarity_score: f32,
    /// 1-based rank within one search.
    pub rank: usize,
}

/// Discrete retrieval-quality bucket for one question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::Low => "low",
            Confidence::Medium => "medium",
            Confidence::High => "high",
        }
    }
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summary statistics of how well a question matches the indexed document.
#[derive(Debug, Clone, Serialize)]
pub struct RelevanceSummary {
    pub has_relevant_content: bool,
    pub max_similarity: f32,
    pub avg_similarity: f32,
    pub relevant_chunk_count: usize,
    pub confidence: Confidence,
    /// The best few results, kept for explanations.
    pub top_chunks: Vec<RankedResult>,
    /// Set when the analysis itself failed and this summary is a placeholder.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RelevanceSummary {
    /// The summary reported when nothing was retrieved or analysis failed.
    pub fn empty() -> Self {
        Self {
            has_relevant_content: false,
            max_similarity: 0.0,
            avg_similarity: 0.0,
            relevant_chunk_count: 0,
            confidence: Confidence::Low,
            top_chunks: Vec::new(),
            error: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::empty()
        }
    }
}

/// A sentence from the context that shares vocabulary with the question.
#[derive(Debug, Clone, Serialize)]
pub struct KeyClause {
    pub clause_id: usize,
    pub text: String,
    pub relevance_score: f64,
    pub word_overlap: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Reasoning {
    pub semantic_similarity: f32,
    pub relevant_chunks: usize,
    pub has_supporting_evidence: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnswerMetadata {
    /// RFC 3339 timestamp of when the answer was produced.
    pub timestamp: String,
    pub model_used: String,
    pub processing_method: String,
}

/// An answer with the retrieval evidence behind it.
#[derive(Debug, Clone, Serialize)]
pub struct ExplainedAnswer {
    pub question: String,
    pub answer: String,
    pub confidence: Confidence,
    pub key_clauses: Vec<KeyClause>,
    pub reasoning: Reasoning,
    pub metadata: AnswerMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
