//! Query orchestration: document build on first use, then per-question
//! retrieval and answering.
//!
//! # Build phase
//!
//! ```text
//! URL ──▶ DocumentSource ──▶ split_words ──▶ VectorIndex::build ──▶ cache
//! ```
//!
//! Runs once per URL on a task of its own (see [`crate::cache`]). Any
//! failure here aborts the whole batch.
//!
//! # Query phase
//!
//! For each question, in input order:
//!
//! 1. embed the question once;
//! 2. [`RelevanceAnalyzer::analyze`] over the top-k results;
//! 3. [`ContextAssembler::assemble`] from results above the threshold;
//! 4. if the context is empty or confidence is low, use the first
//!    `fallback_chunks` chunks of the document instead;
//! 5. hand context, question and summary to the [`Answerer`].
//!
//! A failing question becomes an `"Error processing question: ..."` answer
//! in its slot; the remaining questions still run.

use serde::Serialize;
use std::sync::Arc;

use crate::answer::{Answerer, ChatAnswerer};
use crate::cache::{DocumentCache, DocumentEntry};
use crate::chunk::split_words;
use crate::config::Config;
use crate::context::{fallback_context, ContextAssembler};
use crate::embedding::{create_embedder, embed_query, Embedder};
use crate::error::Result;
use crate::explain::{explain_answer, PROCESSING_METHOD};
use crate::index::VectorIndex;
use crate::models::{
    AnswerMetadata, Confidence, ExplainedAnswer, Reasoning, RelevanceSummary,
};
use crate::relevance::RelevanceAnalyzer;
use crate::source::{DocumentSource, HttpDocumentSource};

/// Tuning knobs for chunking and retrieval.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub chunk_size: usize,
    pub overlap: usize,
    pub similarity_threshold: f32,
    pub max_chunks_per_query: usize,
    pub analysis_top_k: usize,
    pub fallback_chunks: usize,
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            chunk_size: config.chunking.chunk_size,
            overlap: config.chunking.overlap,
            similarity_threshold: config.retrieval.similarity_threshold,
            max_chunks_per_query: config.retrieval.max_chunks_per_query,
            analysis_top_k: config.retrieval.analysis_top_k,
            fallback_chunks: config.retrieval.fallback_chunks,
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CachedDocument {
    pub url: String,
    pub chunk_count: usize,
    pub text_length: usize,
    pub file_type: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineStats {
    pub documents_cached: usize,
    pub indexed_chunks: usize,
    pub embedding_model: String,
    pub llm_model: String,
    pub cached_documents: Vec<CachedDocument>,
}

/// Context and relevance evidence prepared for one question.
struct Retrieval {
    context: String,
    summary: RelevanceSummary,
}

pub struct QueryPipeline {
    source: Arc<dyn DocumentSource>,
    embedder: Arc<dyn Embedder>,
    answerer: Arc<dyn Answerer>,
    settings: PipelineSettings,
    analyzer: RelevanceAnalyzer,
    assembler: ContextAssembler,
    cache: DocumentCache,
}

impl QueryPipeline {
    pub fn new(
        source: Arc<dyn DocumentSource>,
        embedder: Arc<dyn Embedder>,
        answerer: Arc<dyn Answerer>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            analyzer: RelevanceAnalyzer::new(settings.similarity_threshold, settings.analysis_top_k),
            assembler: ContextAssembler::new(settings.similarity_threshold),
            source,
            embedder,
            answerer,
            settings,
            cache: DocumentCache::new(),
        }
    }

    /// Wire the HTTP source, configured embedder and chat answerer.
    pub fn from_config(config: &Config) -> Result<Self> {
        let source = Arc::new(HttpDocumentSource::new(&config.source)?);
        let embedder = create_embedder(&config.embedding)?;
        let answerer = Arc::new(ChatAnswerer::new(&config.llm)?);
        Ok(Self::new(
            source,
            embedder,
            answerer,
            PipelineSettings::from_config(config),
        ))
    }

    pub fn cache(&self) -> &DocumentCache {
        &self.cache
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// The ready entry for `url`, building it on first use.
    pub async fn document(&self, url: &str) -> Result<Arc<DocumentEntry>> {
        let source = self.source.clone();
        let embedder = self.embedder.clone();
        let settings = self.settings.clone();
        let owned_url = url.to_string();
        self.cache
            .get_or_build(url, move || build_document(source, embedder, settings, owned_url))
            .await
    }

    async fn retrieve(&self, entry: &DocumentEntry, question: &str) -> Result<Retrieval> {
        let query = embed_query(self.embedder.as_ref(), question).await?;
        let summary = self.analyzer.analyze(&query, &entry.index);
        let mut context =
            self.assembler
                .assemble(&query, &entry.index, self.settings.max_chunks_per_query)?;

        if context.is_empty() || summary.confidence == Confidence::Low {
            tracing::warn!(
                empty_context = context.is_empty(),
                confidence = %summary.confidence,
                "using leading chunks as context"
            );
            context = fallback_context(entry.index.chunks()?, self.settings.fallback_chunks);
        }

        Ok(Retrieval { context, summary })
    }

    async fn answer_one(&self, entry: &DocumentEntry, question: &str) -> Result<(String, Retrieval)> {
        let retrieval = self.retrieve(entry, question).await?;
        let answer = self
            .answerer
            .answer(&retrieval.context, question, &retrieval.summary)
            .await?;
        Ok((answer, retrieval))
    }

    /// Answer every question against the document at `url`.
    ///
    /// Returns one answer per question in input order. Only build-phase
    /// errors are returned as `Err`.
    pub async fn process_queries(&self, url: &str, questions: &[String]) -> Result<Vec<String>> {
        let entry = self.document(url).await?;
        tracing::info!(url, questions = questions.len(), "processing questions");

        let mut answers = Vec::with_capacity(questions.len());
        for (i, question) in questions.iter().enumerate() {
            tracing::info!(question = i + 1, total = questions.len(), "answering");
            let answer = match self.answer_one(&entry, question).await {
                Ok((answer, _)) => answer,
                Err(e) => {
                    tracing::error!(question = i + 1, error = %e, "question failed");
                    error_answer(&e)
                }
            };
            answers.push(answer);
        }
        Ok(answers)
    }

    /// Like [`process_queries`](Self::process_queries), with the evidence
    /// behind each answer.
    pub async fn process_queries_with_explanations(
        &self,
        url: &str,
        questions: &[String],
    ) -> Result<Vec<ExplainedAnswer>> {
        let entry = self.document(url).await?;
        let model = self.answerer.model_name();

        let mut explained = Vec::with_capacity(questions.len());
        for (i, question) in questions.iter().enumerate() {
            let item = match self.answer_one(&entry, question).await {
                Ok((answer, retrieval)) => explain_answer(
                    question,
                    answer,
                    &retrieval.context,
                    &retrieval.summary,
                    model,
                ),
                Err(e) => {
                    tracing::error!(question = i + 1, error = %e, "question failed");
                    failed_explanation(question, &e, model)
                }
            };
            explained.push(item);
        }
        Ok(explained)
    }

    /// Counts over ready documents only.
    pub fn statistics(&self) -> PipelineStats {
        let cached_documents: Vec<CachedDocument> = self
            .cache
            .ready_entries()
            .iter()
            .map(|e| CachedDocument {
                url: e.url.clone(),
                chunk_count: e.chunk_count(),
                text_length: e.text_length,
                file_type: e.file_type.clone(),
            })
            .collect();

        PipelineStats {
            documents_cached: cached_documents.len(),
            indexed_chunks: cached_documents.iter().map(|d| d.chunk_count).sum(),
            embedding_model: self.embedder.model_name().to_string(),
            llm_model: self.answerer.model_name().to_string(),
            cached_documents,
        }
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }
}

async fn build_document(
    source: Arc<dyn DocumentSource>,
    embedder: Arc<dyn Embedder>,
    settings: PipelineSettings,
    url: String,
) -> Result<DocumentEntry> {
    let doc = source.fetch(&url).await?;
    let chunks = split_words(&doc.text, settings.chunk_size, settings.overlap)?;
    tracing::info!(url = %url, chunks = chunks.len(), "document chunked");

    let mut index = VectorIndex::new();
    index.build(chunks, embedder.as_ref()).await?;

    Ok(DocumentEntry {
        text_length: doc.text.chars().count(),
        file_type: doc.file_type,
        url,
        index,
    })
}

fn error_answer(err: &crate::error::RagError) -> String {
    format!("Error processing question: {}", err)
}

fn failed_explanation(question: &str, err: &crate::error::RagError, model: &str) -> ExplainedAnswer {
    ExplainedAnswer {
        question: question.to_string(),
        answer: error_answer(err),
        confidence: Confidence::Low,
        key_clauses: Vec::new(),
        reasoning: Reasoning {
            semantic_similarity: 0.0,
            relevant_chunks: 0,
            has_supporting_evidence: false,
        },
        metadata: AnswerMetadata {
            timestamp: chrono::Utc::now().to_rfc3339(),
            model_used: model.to_string(),
            processing_method: PROCESSING_METHOD.to_string(),
        },
        error: Some(err.to_string()),
    }
}
