//! Error taxonomy for the retrieval pipeline.
//!
//! Build-phase errors (download, format, extraction, embedding) are fatal
//! for the batch that triggered them. Query-phase errors are caught by the
//! pipeline and rendered into the answer slot of the failing question.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RagError {
    /// The document could not be fetched (transport error, non-2xx, unreadable file).
    #[error("Failed to download document: {0}")]
    Download(String),

    /// The document's format is not one the extractors understand.
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// A decoder rejected bytes of a supported format.
    #[error("Failed to extract document text: {0}")]
    Extraction(String),

    /// Invalid chunking, retrieval or provider settings.
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// The embedding backend failed or returned malformed output.
    #[error("Failed to create embeddings: {0}")]
    Embedding(String),

    #[error("Vector index not built")]
    IndexNotBuilt,

    #[error("Vector index already built; construct a new index for a new document")]
    IndexAlreadyBuilt,

    /// The answering function failed.
    #[error("Failed to generate answer: {0}")]
    AnswerGeneration(String),

    /// The background task building a document stopped without a result.
    #[error("Document build task failed: {0}")]
    BuildTask(String),
}

impl RagError {
    /// Machine-readable code used in HTTP error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            RagError::Download(_) => "download_error",
            RagError::UnsupportedFormat(_) => "unsupported_format",
            RagError::Extraction(_) => "extraction_error",
            RagError::Configuration(_) => "configuration_error",
            RagError::Embedding(_) => "embedding_error",
            RagError::IndexNotBuilt => "index_not_built",
            RagError::IndexAlreadyBuilt => "index_already_built",
            RagError::AnswerGeneration(_) => "answer_generation_error",
            RagError::BuildTask(_) => "build_task_error",
        }
    }
}

pub type Result<T> = std::result::Result<T, RagError>;
