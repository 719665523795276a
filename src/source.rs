//! Document sources: identifier → normalized plain text.
//!
//! [`HttpDocumentSource`] downloads `http(s)://` URLs and reads `file://`
//! URLs or bare filesystem paths from disk. The format is detected from the
//! last path segment; the bytes are decoded by [`crate::extract`] and
//! normalized with [`normalize_text`].

use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;

use crate::chunk::normalize_text;
use crate::config::SourceConfig;
use crate::error::{RagError, Result};
use crate::extract::{extract_text, SUPPORTED_FORMATS};
use crate::models::SourceDocument;

/// Resolves a document identifier to normalized text.
///
/// Failures are [`RagError::Download`] (fetching) or
/// [`RagError::UnsupportedFormat`] / [`RagError::Extraction`] (decoding).
#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn fetch(&self, identifier: &str) -> Result<SourceDocument>;
}

/// Detect the format tag of `identifier` from its last path segment.
///
/// A segment without an extension is assumed to be a PDF.
pub fn detect_file_type(identifier: &str) -> Result<String> {
    let path = match reqwest::Url::parse(identifier) {
        Ok(url) => url.path().to_string(),
        Err(_) => identifier.to_string(),
    };
    let segment = path
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .to_lowercase();

    match segment.rsplit_once('.') {
        None => Ok(".pdf".to_string()),
        Some((_, ext)) => {
            let tag = format!(".{}", ext);
            if SUPPORTED_FORMATS.contains(&tag.as_str()) {
                Ok(tag)
            } else {
                Err(RagError::UnsupportedFormat(tag))
            }
        }
    }
}

pub struct HttpDocumentSource {
    client: reqwest::Client,
}

impl HttpDocumentSource {
    pub fn new(config: &SourceConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.download_timeout_secs))
            .build()
            .map_err(|e| RagError::Download(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        tracing::info!(url, "downloading document");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| RagError::Download(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RagError::Download(format!("HTTP {} for {}", status, url)));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| RagError::Download(e.to_string()))?;
        tracing::info!(bytes = bytes.len(), "downloaded document");
        Ok(bytes.to_vec())
    }

    async fn read_local(&self, path: PathBuf) -> Result<Vec<u8>> {
        tracing::info!(path = %path.display(), "reading local document");
        tokio::fs::read(&path)
            .await
            .map_err(|e| RagError::Download(format!("{}: {}", path.display(), e)))
    }
}

#[async_trait]
impl DocumentSource for HttpDocumentSource {
    async fn fetch(&self, identifier: &str) -> Result<SourceDocument> {
        let bytes = match reqwest::Url::parse(identifier) {
            Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {
                self.download(identifier).await?
            }
            Ok(url) if url.scheme() == "file" => {
                let path = url
                    .to_file_path()
                    .map_err(|_| RagError::Download(format!("invalid file URL: {}", identifier)))?;
                self.read_local(path).await?
            }
            Ok(url) if url.scheme().len() > 1 => {
                return Err(RagError::Download(format!(
                    "unsupported URL scheme: {}",
                    url.scheme()
                )))
            }
            // Bare paths, including Windows drive letters parsed as a scheme.
            _ => self.read_local(PathBuf::from(identifier)).await?,
        };

        let file_type = detect_file_type(identifier)?;
        let raw = tokio::task::spawn_blocking({
            let file_type = file_type.clone();
            move || extract_text(&bytes, &file_type)
        })
        .await
        .map_err(|e| RagError::Extraction(format!("extraction task failed: {}", e)))??;

        Ok(SourceDocument {
            text: normalize_text(&raw),
            file_type,
        })
    }
}
