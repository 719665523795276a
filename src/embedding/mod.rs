//! Embedding provider abstraction and implementations.
//!
//! Defines the [`Embedder`] trait and concrete implementations:
//! - **[`DisabledEmbedder`]**: returns errors; used when embeddings are not configured.
//! - **[`OpenAIEmbedder`]**: calls the OpenAI embeddings API with retry and backoff.
//! - **[`OllamaEmbedder`]**: calls a local Ollama instance's `/api/embed` endpoint.
//! - **`LocalEmbedder`**: runs models in-process via fastembed; no network calls after model download.
//!
//! Also provides the vector helpers the index relies on:
//! - [`l2_normalize`]: scale a vector to unit length in place
//! - [`dot`]: inner product (cosine similarity for unit vectors)
//! - [`cosine_similarity`]: similarity of two arbitrary vectors
//!
//! # Provider Selection
//!
//! ```rust
//! use docqa::config::EmbeddingConfig;
//! use docqa::embedding::create_embedder;
//!
//! let config = EmbeddingConfig {
//!     provider: "disabled".to_string(),
//!     ..EmbeddingConfig::default()
//! };
//! let embedder = create_embedder(&config).unwrap();
//! assert_eq!(embedder.model_name(), "disabled");
//! ```
//!
//! # Retry Strategy
//!
//! The OpenAI and Ollama embedders use exponential backoff for transient errors:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)
//!
//! Every embedder checks that it returned one vector per input and that
//! each vector has [`Embedder::dims`] components.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::config::EmbeddingConfig;
use crate::error::{RagError, Result};

/// Maps text to fixed-dimension dense vectors.
///
/// Implementations must be deterministic for a fixed model and must return
/// exactly one vector per input, in input order. A failure aborts the whole
/// batch; there are no partial results.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns the model identifier (e.g. `"all-minilm-l6-v2"`).
    fn model_name(&self) -> &str;
    /// Returns the embedding vector dimensionality (e.g. `384`).
    fn dims(&self) -> usize;
    /// Embed a batch of texts.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Embed a single query text and L2-normalize the result.
pub async fn embed_query(embedder: &dyn Embedder, text: &str) -> Result<Vec<f32>> {
    let mut vectors = embedder.embed(&[text.to_string()]).await?;
    let mut vector = vectors
        .pop()
        .ok_or_else(|| RagError::Embedding("Empty embedding response".to_string()))?;
    l2_normalize(&mut vector);
    Ok(vector)
}

/// Check a provider response against the request it answers.
pub fn check_batch(
    vectors: Vec<Vec<f32>>,
    expected_count: usize,
    dims: usize,
) -> Result<Vec<Vec<f32>>> {
    if vectors.len() != expected_count {
        return Err(RagError::Embedding(format!(
            "expected {} embeddings, got {}",
            expected_count,
            vectors.len()
        )));
    }
    if let Some(bad) = vectors.iter().find(|v| v.len() != dims) {
        return Err(RagError::Embedding(format!(
            "expected dimension {}, got {}",
            dims,
            bad.len()
        )));
    }
    Ok(vectors)
}

// ============ Disabled Embedder ============

/// An embedder that always fails.
///
/// Used when `embedding.provider = "disabled"` in the configuration.
pub struct DisabledEmbedder;

#[async_trait]
impl Embedder for DisabledEmbedder {
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        0
    }
    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(RagError::Embedding(
            "Embedding provider is disabled".to_string(),
        ))
    }
}

// ============ Shared HTTP retry loop ============

/// POST `body` to `url`, retrying rate limits, server errors and network
/// failures with exponential backoff. Returns the parsed JSON body.
async fn post_json_with_retry(
    client: &reqwest::Client,
    url: &str,
    bearer: Option<&str>,
    body: &serde_json::Value,
    max_retries: u32,
    label: &str,
) -> Result<serde_json::Value> {
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tracing::warn!(attempt, ?delay, "{} embedding request retrying", label);
            tokio::time::sleep(delay).await;
        }

        let mut request = client
            .post(url)
            .header("Content-Type", "application/json")
            .json(body);
        if let Some(token) = bearer {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        match request.send().await {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    return response.json().await.map_err(|e| {
                        RagError::Embedding(format!("{} response was not JSON: {}", label, e))
                    });
                }

                let body_text = response.text().await.unwrap_or_default();
                let err = RagError::Embedding(format!(
                    "{} API error {}: {}",
                    label, status, body_text
                ));

                // Rate limited or server error: retry
                if status.as_u16() == 429 || status.is_server_error() {
                    last_err = Some(err);
                    continue;
                }

                return Err(err);
            }
            Err(e) => {
                last_err = Some(RagError::Embedding(format!(
                    "{} connection error ({}): {}",
                    label, url, e
                )));
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| {
        RagError::Embedding(format!("{} embedding failed after retries", label))
    }))
}

fn build_client(timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| RagError::Embedding(format!("Failed to build HTTP client: {}", e)))
}

fn float_array(value: &serde_json::Value, what: &str) -> Result<Vec<f32>> {
    value
        .as_array()
        .ok_or_else(|| RagError::Embedding(format!("Invalid response: {} is not an array", what)))?
        .iter()
        .map(|v| {
            v.as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| RagError::Embedding(format!("Invalid response: non-numeric {}", what)))
        })
        .collect()
}

// ============ OpenAI Embedder ============

/// Embedder using the OpenAI API.
///
/// Calls `POST /v1/embeddings` with the configured model, `batch_size`
/// texts per request. Requires the `OPENAI_API_KEY` environment variable to be set.
pub struct OpenAIEmbedder {
    model: String,
    dims: usize,
    api_key: String,
    batch_size: usize,
    max_retries: u32,
    client: reqwest::Client,
}

impl OpenAIEmbedder {
    /// Create a new OpenAI embedder from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Configuration`] if `model` or `dims` is not set,
    /// or if `OPENAI_API_KEY` is not in the environment.
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config.model.clone().ok_or_else(|| {
            RagError::Configuration("embedding.model required for OpenAI provider".to_string())
        })?;
        let dims = config.dims.ok_or_else(|| {
            RagError::Configuration("embedding.dims required for OpenAI provider".to_string())
        })?;
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            RagError::Configuration("OPENAI_API_KEY environment variable not set".to_string())
        })?;

        Ok(Self {
            model,
            dims,
            api_key,
            batch_size: config.batch_size.max(1),
            max_retries: config.max_retries,
            client: build_client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let body = serde_json::json!({
                "model": self.model,
                "input": batch,
            });
            let json = post_json_with_retry(
                &self.client,
                "https://api.openai.com/v1/embeddings",
                Some(&self.api_key),
                &body,
                self.max_retries,
                "OpenAI",
            )
            .await?;
            vectors.extend(check_batch(parse_openai_response(&json)?, batch.len(), self.dims)?);
        }
        Ok(vectors)
    }
}

/// Parse the OpenAI embeddings API response JSON.
///
/// Extracts the `data[].embedding` arrays, ordered by `data[].index`.
fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| {
            RagError::Embedding("Invalid OpenAI response: missing data array".to_string())
        })?;

    let mut indexed = Vec::with_capacity(data.len());
    for (pos, item) in data.iter().enumerate() {
        let embedding = item.get("embedding").ok_or_else(|| {
            RagError::Embedding("Invalid OpenAI response: missing embedding".to_string())
        })?;
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(pos);
        indexed.push((index, float_array(embedding, "embedding")?));
    }

    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

// ============ Ollama Embedder ============

/// Embedder using a local Ollama instance.
///
/// Calls `POST /api/embed` on the configured Ollama URL (default: `http://localhost:11434`).
pub struct OllamaEmbedder {
    model: String,
    dims: usize,
    url: String,
    batch_size: usize,
    max_retries: u32,
    client: reqwest::Client,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config.model.clone().ok_or_else(|| {
            RagError::Configuration("embedding.model required for Ollama provider".to_string())
        })?;
        let dims = config.dims.ok_or_else(|| {
            RagError::Configuration("embedding.dims required for Ollama provider".to_string())
        })?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| "http://localhost:11434".to_string());

        Ok(Self {
            model,
            dims,
            url,
            batch_size: config.batch_size.max(1),
            max_retries: config.max_retries,
            client: build_client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!("{}/api/embed", self.url.trim_end_matches('/'));
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let body = serde_json::json!({
                "model": self.model,
                "input": batch,
            });
            let json =
                post_json_with_retry(&self.client, &url, None, &body, self.max_retries, "Ollama")
                    .await?;
            vectors.extend(check_batch(parse_ollama_response(&json)?, batch.len(), self.dims)?);
        }
        Ok(vectors)
    }
}

fn parse_ollama_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    json.get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| {
            RagError::Embedding("Invalid Ollama response: missing embeddings array".to_string())
        })?
        .iter()
        .map(|e| float_array(e, "embedding"))
        .collect()
}

// ============ Local Embedder (fastembed) ============

/// Embedder for in-process inference via fastembed.
///
/// The model is downloaded from Hugging Face on first use, cached, and kept
/// loaded for the lifetime of the embedder. Inference runs on the blocking
/// thread pool.
#[cfg(feature = "local-embeddings-fastembed")]
pub struct LocalEmbedder {
    model_name: String,
    dims: usize,
    batch_size: usize,
    model: Arc<std::sync::Mutex<Option<fastembed::TextEmbedding>>>,
}

#[cfg(feature = "local-embeddings-fastembed")]
impl LocalEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model_name = config
            .model
            .clone()
            .unwrap_or_else(|| "all-minilm-l6-v2".to_string());
        // Reject unknown names up front rather than on first embed.
        config_to_fastembed_model(&model_name)?;
        let dims = config.dims.unwrap_or_else(|| default_local_dims(&model_name));

        Ok(Self {
            model_name,
            dims,
            batch_size: config.batch_size,
            model: Arc::new(std::sync::Mutex::new(None)),
        })
    }
}

#[cfg(feature = "local-embeddings-fastembed")]
#[async_trait]
impl Embedder for LocalEmbedder {
    fn model_name(&self) -> &str {
        &self.model_name
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let fastembed_model = config_to_fastembed_model(&self.model_name)?;
        let slot = Arc::clone(&self.model);
        let batch_size = self.batch_size;
        let texts = texts.to_vec();
        let count = texts.len();

        let vectors = tokio::task::spawn_blocking(move || -> Result<Vec<Vec<f32>>> {
            let mut guard = slot
                .lock()
                .map_err(|_| RagError::Embedding("local model lock poisoned".to_string()))?;
            if guard.is_none() {
                tracing::info!("loading local embedding model");
                let loaded = fastembed::TextEmbedding::try_new(
                    fastembed::InitOptions::new(fastembed_model)
                        .with_show_download_progress(false),
                )
                .map_err(|e| {
                    RagError::Embedding(format!(
                        "Failed to initialize local embedding model: {}",
                        e
                    ))
                })?;
                *guard = Some(loaded);
            }
            let model = guard
                .as_mut()
                .ok_or_else(|| RagError::Embedding("local model not loaded".to_string()))?;
            model
                .embed(texts, Some(batch_size))
                .map_err(|e| RagError::Embedding(format!("Local embedding failed: {}", e)))
        })
        .await
        .map_err(|e| RagError::Embedding(format!("embedding task failed: {}", e)))??;

        check_batch(vectors, count, self.dims)
    }
}

#[cfg(feature = "local-embeddings-fastembed")]
fn default_local_dims(model_name: &str) -> usize {
    let short = model_name.rsplit('/').next().unwrap_or(model_name).to_lowercase();
    match short.as_str() {
        "bge-base-en-v1.5" | "nomic-embed-text-v1" | "nomic-embed-text-v1.5" => 768,
        "bge-large-en-v1.5" => 1024,
        _ => 384,
    }
}

#[cfg(feature = "local-embeddings-fastembed")]
fn config_to_fastembed_model(name: &str) -> Result<fastembed::EmbeddingModel> {
    // Accept Hugging Face repo ids such as `sentence-transformers/all-MiniLM-L6-v2`.
    let short = name.rsplit('/').next().unwrap_or(name).to_lowercase();
    match short.as_str() {
        "all-minilm-l6-v2" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2),
        "bge-small-en-v1.5" => Ok(fastembed::EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" => Ok(fastembed::EmbeddingModel::BGEBaseENV15),
        "bge-large-en-v1.5" => Ok(fastembed::EmbeddingModel::BGELargeENV15),
        "nomic-embed-text-v1" => Ok(fastembed::EmbeddingModel::NomicEmbedTextV1),
        "nomic-embed-text-v1.5" => Ok(fastembed::EmbeddingModel::NomicEmbedTextV15),
        other => Err(RagError::Configuration(format!(
            "Unknown local embedding model: '{}'. Supported models: \
             all-minilm-l6-v2, bge-small-en-v1.5, bge-base-en-v1.5, bge-large-en-v1.5, \
             nomic-embed-text-v1, nomic-embed-text-v1.5",
            other
        ))),
    }
}

/// Create the appropriate [`Embedder`] based on configuration.
///
/// | Config Value | Embedder |
/// |-------------|----------|
/// | `"disabled"` | [`DisabledEmbedder`] |
/// | `"openai"` | [`OpenAIEmbedder`] |
/// | `"ollama"` | [`OllamaEmbedder`] |
/// | `"local"` | `LocalEmbedder` (requires the `local-embeddings-fastembed` feature) |
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledEmbedder)),
        "openai" => Ok(Arc::new(OpenAIEmbedder::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaEmbedder::new(config)?)),
        #[cfg(feature = "local-embeddings-fastembed")]
        "local" => Ok(Arc::new(LocalEmbedder::new(config)?)),
        #[cfg(not(feature = "local-embeddings-fastembed"))]
        "local" => Err(RagError::Configuration(
            "Local embedding provider requires --features local-embeddings-fastembed".to_string(),
        )),
        other => Err(RagError::Configuration(format!(
            "Unknown embedding provider: {}",
            other
        ))),
    }
}

/// Scale `v` to unit L2 norm in place. Zero vectors are left unchanged.
pub fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        v.iter_mut().for_each(|x| *x /= norm);
    }
}

/// Inner product. Equals cosine similarity when both inputs are unit vectors.
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`, or `0.0` for empty vectors or vectors
/// of different lengths.
///
/// ```text
///            a · b
/// cos(θ) = ─────────
///          ‖a‖ × ‖b‖
/// ```
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}
