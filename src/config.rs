//! TOML configuration with environment overrides.
//!
//! Every section has defaults, so a missing config file yields a usable
//! [`Config`]. After parsing, a small set of environment variables can
//! override individual settings (see [`Config::apply_env_overrides`]).
//! Secrets are never stored in the file: the config only names the
//! environment variables that hold them.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

use crate::error::RagError;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    /// Window size in words.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Words shared by consecutive windows. Must be `< chunk_size`.
    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap: default_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    1000
}
fn default_overlap() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,
    #[serde(default = "default_max_chunks_per_query")]
    pub max_chunks_per_query: usize,
    #[serde(default = "default_analysis_top_k")]
    pub analysis_top_k: usize,
    #[serde(default = "default_fallback_chunks")]
    pub fallback_chunks: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            max_chunks_per_query: default_max_chunks_per_query(),
            analysis_top_k: default_analysis_top_k(),
            fallback_chunks: default_fallback_chunks(),
        }
    }
}

fn default_similarity_threshold() -> f32 {
    0.3
}
fn default_max_chunks_per_query() -> usize {
    8
}
fn default_analysis_top_k() -> usize {
    10
}
fn default_fallback_chunks() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_embedding_model")]
    pub model: Option<String>,
    #[serde(default = "default_dims")]
    pub dims: Option<usize>,
    /// Base URL for the Ollama provider.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_embedding_model(),
            dims: default_dims(),
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_provider() -> String {
    "local".to_string()
}
fn default_embedding_model() -> Option<String> {
    Some("all-minilm-l6-v2".to_string())
}
fn default_dims() -> Option<usize> {
    Some(384)
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    /// OpenAI-compatible API root; `/chat/completions` is appended.
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
    /// Name of the environment variable holding the API key.
    #[serde(default = "default_llm_api_key_env")]
    pub api_key_env: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_llm_timeout_secs(),
            api_key_env: default_llm_api_key_env(),
        }
    }
}

fn default_llm_base_url() -> String {
    "https://router.huggingface.co/v1".to_string()
}
fn default_llm_model() -> String {
    "meta-llama/Llama-3.2-1B-Instruct:novita".to_string()
}
fn default_max_tokens() -> u32 {
    2000
}
fn default_temperature() -> f32 {
    0.1
}
fn default_llm_timeout_secs() -> u64 {
    60
}
fn default_llm_api_key_env() -> String {
    "HF_TOKEN".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    #[serde(default = "default_download_timeout_secs")]
    pub download_timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            download_timeout_secs: default_download_timeout_secs(),
        }
    }
}

fn default_download_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Name of the environment variable holding the bearer token.
    #[serde(default = "default_server_api_key_env")]
    pub api_key_env: String,
    /// Log filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            api_key_env: default_server_api_key_env(),
            log_level: default_log_level(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:8000".to_string()
}
fn default_server_api_key_env() -> String {
    "API_KEY".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}

/// Result of [`Config::validate`]: every problem found, fatal or not.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub issues: Vec<String>,
    pub summary: ConfigSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfigSummary {
    pub bind: String,
    pub llm_model: String,
    pub embedding_provider: String,
    pub embedding_model: Option<String>,
    pub vector_dimension: Option<usize>,
    pub similarity_threshold: f32,
    pub chunk_size: usize,
    pub overlap: usize,
}

impl Config {
    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|name| std::env::var(name).ok());
    }

    /// Apply overrides from an arbitrary lookup. Unparseable values are ignored.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let parse = |name: &str| lookup(name).map(|v| v.trim().to_string());

        let host = parse("HOST");
        let port = parse("PORT");
        if host.is_some() || port.is_some() {
            let (cur_host, cur_port) = self
                .server
                .bind
                .rsplit_once(':')
                .map(|(h, p)| (h.to_string(), p.to_string()))
                .unwrap_or_else(|| (self.server.bind.clone(), "8000".to_string()));
            self.server.bind = format!(
                "{}:{}",
                host.unwrap_or(cur_host),
                port.unwrap_or(cur_port)
            );
        }

        if let Some(v) = parsed(parse("SIMILARITY_THRESHOLD")) {
            self.retrieval.similarity_threshold = v;
        }
        if let Some(v) = parsed(parse("CHUNK_SIZE")) {
            self.chunking.chunk_size = v;
        }
        if let Some(v) = parsed(parse("CHUNK_OVERLAP")) {
            self.chunking.overlap = v;
        }
        if let Some(v) = parsed(parse("MAX_CHUNKS_PER_QUERY")) {
            self.retrieval.max_chunks_per_query = v;
        }
        if let Some(v) = parse("EMBEDDING_MODEL") {
            self.embedding.model = Some(v);
        }
        if let Some(v) = parsed(parse("VECTOR_DIMENSION")) {
            self.embedding.dims = Some(v);
        }
        if let Some(v) = parse("LLM_MODEL") {
            self.llm.model = v;
        }
        if let Some(v) = parsed(parse("MAX_TOKENS")) {
            self.llm.max_tokens = v;
        }
        if let Some(v) = parsed(parse("TEMPERATURE")) {
            self.llm.temperature = v;
        }
    }

    /// Check the rules the pipeline cannot run without.
    pub fn check(&self) -> std::result::Result<(), RagError> {
        match self.rule_violations().into_iter().next() {
            Some(problem) => Err(RagError::Configuration(problem)),
            None => Ok(()),
        }
    }

    /// Every broken pipeline rule, in section order.
    fn rule_violations(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.chunking.chunk_size == 0 {
            problems.push("chunking.chunk_size must be > 0".to_string());
        } else if self.chunking.overlap >= self.chunking.chunk_size {
            problems.push(format!(
                "chunking.overlap ({}) must be < chunking.chunk_size ({})",
                self.chunking.overlap, self.chunking.chunk_size
            ));
        }
        if !(0.0..=1.0).contains(&self.retrieval.similarity_threshold) {
            problems.push("retrieval.similarity_threshold must be in [0.0, 1.0]".to_string());
        }
        if self.retrieval.max_chunks_per_query == 0 {
            problems.push("retrieval.max_chunks_per_query must be >= 1".to_string());
        }
        if self.embedding.is_enabled() && matches!(self.embedding.dims, None | Some(0)) {
            problems.push(format!(
                "embedding.dims must be > 0 when provider is '{}'",
                self.embedding.provider
            ));
        }
        if !matches!(
            self.embedding.provider.as_str(),
            "disabled" | "openai" | "ollama" | "local"
        ) {
            problems.push(format!(
                "Unknown embedding provider: '{}'. Must be disabled, openai, ollama, or local.",
                self.embedding.provider
            ));
        }

        problems
    }

    /// Collect every configuration problem, including warnings such as a
    /// missing answering API key.
    pub fn validate(&self) -> ValidationReport {
        let mut issues = self.rule_violations();

        if !(0.0..=2.0).contains(&self.llm.temperature) {
            issues.push("llm.temperature must be in [0.0, 2.0]".to_string());
        }
        if std::env::var(&self.llm.api_key_env).is_err() {
            issues.push(format!("{} is required", self.llm.api_key_env));
        }

        ValidationReport {
            valid: issues.is_empty(),
            issues,
            summary: ConfigSummary {
                bind: self.server.bind.clone(),
                llm_model: self.llm.model.clone(),
                embedding_provider: self.embedding.provider.clone(),
                embedding_model: self.embedding.model.clone(),
                vector_dimension: self.embedding.dims,
                similarity_threshold: self.retrieval.similarity_threshold,
                chunk_size: self.chunking.chunk_size,
                overlap: self.chunking.overlap,
            },
        }
    }
}

fn parsed<T: FromStr>(value: Option<String>) -> Option<T> {
    value.and_then(|v| v.parse().ok())
}

/// Where a loaded [`Config`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigOrigin {
    File,
    /// The file did not exist; built-in defaults were used.
    Defaults,
}

/// Load configuration from `path`, falling back to defaults when the file
/// does not exist, then apply environment overrides and check it.
pub fn load_config(path: &Path) -> Result<(Config, ConfigOrigin)> {
    let (config, origin) = read_config(path)?;
    config.check()?;
    Ok((config, origin))
}

/// Parse `path` (or defaults) and apply environment overrides without
/// checking the result. Used by `docqa check` to report every issue.
pub fn read_config(path: &Path) -> Result<(Config, ConfigOrigin)> {
    let (mut config, origin) = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config =
            toml::from_str(&content).with_context(|| "Failed to parse config file")?;
        (config, ConfigOrigin::File)
    } else {
        (Config::default(), ConfigOrigin::Defaults)
    };

    config.apply_env_overrides();
    Ok((config, origin))
}
