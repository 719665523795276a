//! In-memory fakes shared by the integration tests.
//!
//! Embeddings are two-dimensional: questions embed to `[1, 0]` and each
//! chunk to a unit vector whose first component is its scripted score, so
//! a chunk's similarity to any question is exactly that score.

#![allow(dead_code)]

use async_trait::async_trait;
use docqa::answer::Answerer;
use docqa::embedding::Embedder;
use docqa::error::{RagError, Result};
use docqa::models::{Confidence, RelevanceSummary, SourceDocument};
use docqa::pipeline::{PipelineSettings, QueryPipeline};
use docqa::source::DocumentSource;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const DOC_URL: &str = "https://example.com/policy.pdf";

/// A document of `n` four-word chunks: chunk `i` reads
/// `alpha{i} beta{i} gamma{i} delta{i}`.
pub fn chunked_document(n: usize) -> String {
    (0..n)
        .map(chunk_text)
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn chunk_text(i: usize) -> String {
    format!("alpha{i} beta{i} gamma{i} delta{i}")
}

/// Chunk size 4, no overlap: one chunk per `chunk_text`.
pub fn settings() -> PipelineSettings {
    PipelineSettings {
        chunk_size: 4,
        overlap: 0,
        ..PipelineSettings::default()
    }
}

// ─── Embedder ───────────────────────────────────────────────────────

pub struct ScriptedEmbedder {
    /// Chunk index → similarity to every question. Missing chunks score 0.1.
    scores: HashMap<usize, f32>,
    /// Questions whose embedding call fails.
    failing: Vec<String>,
    pub batches: AtomicUsize,
}

impl ScriptedEmbedder {
    pub fn new(scores: &[(usize, f32)]) -> Self {
        Self {
            scores: scores.iter().copied().collect(),
            failing: Vec::new(),
            batches: AtomicUsize::new(0),
        }
    }

    pub fn failing_on(mut self, question: &str) -> Self {
        self.failing.push(question.to_string());
        self
    }

    fn score_for(&self, text: &str) -> f32 {
        text.split_whitespace()
            .next()
            .and_then(|w| w.strip_prefix("alpha"))
            .and_then(|n| n.parse::<usize>().ok())
            .and_then(|i| self.scores.get(&i).copied())
            .unwrap_or(0.1)
    }
}

#[async_trait]
impl Embedder for ScriptedEmbedder {
    fn model_name(&self) -> &str {
        "scripted-embedder"
    }

    fn dims(&self) -> usize {
        2
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.batches.fetch_add(1, Ordering::SeqCst);
        texts
            .iter()
            .map(|t| {
                if self.failing.contains(t) {
                    return Err(RagError::Embedding("scripted failure".to_string()));
                }
                if t.ends_with('?') {
                    return Ok(vec![1.0, 0.0]);
                }
                let s = self.score_for(t);
                Ok(vec![s, (1.0 - s * s).max(0.0).sqrt()])
            })
            .collect()
    }
}

// ─── Source ─────────────────────────────────────────────────────────

pub struct MemorySource {
    docs: HashMap<String, String>,
    delay: Option<Duration>,
    /// Number of leading fetches that fail with a download error.
    failures_left: AtomicUsize,
    pub fetches: AtomicUsize,
}

impl MemorySource {
    pub fn new(docs: &[(&str, String)]) -> Self {
        Self {
            docs: docs
                .iter()
                .map(|(url, text)| (url.to_string(), text.clone()))
                .collect(),
            delay: None,
            failures_left: AtomicUsize::new(0),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn failing_first(self, n: usize) -> Self {
        self.failures_left.store(n, Ordering::SeqCst);
        self
    }
}

#[async_trait]
impl DocumentSource for MemorySource {
    async fn fetch(&self, identifier: &str) -> Result<SourceDocument> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(RagError::Download("HTTP 503".to_string()));
        }
        if identifier.ends_with(".xlsx") {
            return Err(RagError::UnsupportedFormat(".xlsx".to_string()));
        }
        self.docs
            .get(identifier)
            .map(|text| SourceDocument {
                text: text.clone(),
                file_type: ".pdf".to_string(),
            })
            .ok_or_else(|| RagError::Download(format!("HTTP 404 for {}", identifier)))
    }
}

// ─── Answerer ───────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct AnswerCall {
    pub question: String,
    pub context: String,
    pub confidence: Confidence,
    pub relevant_chunk_count: usize,
}

/// Answers `"answer: <question>"`; fails for questions containing `explode`.
#[derive(Default)]
pub struct RecordingAnswerer {
    pub calls: Mutex<Vec<AnswerCall>>,
}

impl RecordingAnswerer {
    pub fn calls(&self) -> Vec<AnswerCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Answerer for RecordingAnswerer {
    async fn answer(
        &self,
        context: &str,
        question: &str,
        summary: &RelevanceSummary,
    ) -> Result<String> {
        self.calls.lock().unwrap().push(AnswerCall {
            question: question.to_string(),
            context: context.to_string(),
            confidence: summary.confidence,
            relevant_chunk_count: summary.relevant_chunk_count,
        });
        if question.contains("explode") {
            return Err(RagError::AnswerGeneration("model unavailable".to_string()));
        }
        Ok(format!("answer: {}", question))
    }

    fn model_name(&self) -> &str {
        "recording-answerer"
    }
}

pub struct Harness {
    pub pipeline: Arc<QueryPipeline>,
    pub source: Arc<MemorySource>,
    pub embedder: Arc<ScriptedEmbedder>,
    pub answerer: Arc<RecordingAnswerer>,
}

pub fn harness(source: MemorySource, embedder: ScriptedEmbedder) -> Harness {
    let source = Arc::new(source);
    let embedder = Arc::new(embedder);
    let answerer = Arc::new(RecordingAnswerer::default());
    let pipeline = Arc::new(QueryPipeline::new(
        source.clone(),
        embedder.clone(),
        answerer.clone(),
        settings(),
    ));
    Harness {
        pipeline,
        source,
        embedder,
        answerer,
    }
}

pub fn questions(qs: &[&str]) -> Vec<String> {
    qs.iter().map(|q| q.to_string()).collect()
}
