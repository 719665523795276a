//! Answer generation from a retrieved context.
//!
//! The pipeline hands each question, its context and the relevance summary
//! to an [`Answerer`]. [`ChatAnswerer`] talks to any OpenAI-compatible
//! `/chat/completions` endpoint.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::LlmConfig;
use crate::error::{RagError, Result};
use crate::models::{Confidence, RelevanceSummary};

/// Returned without a model call when retrieval found nothing relevant.
pub const NOT_FOUND_ANSWER: &str = "Information not found in the document. The question does not appear to be covered in the provided document content.";

const SYSTEM_PROMPT: &str = "You are an expert document analysis assistant specializing in insurance, legal, HR, and compliance domains. Your task is to analyze document content and provide accurate, detailed answers to specific questions.

INSTRUCTIONS:
1. Analyze the provided document context carefully
2. Answer questions based ONLY on the information present in the document
3. Provide specific details, numbers, timeframes, and conditions when available
4. If information is not found in the document, clearly state \"Information not found in the document\"
5. Be precise and avoid speculation or assumptions
6. Include relevant clause references or section details when applicable
7. For complex conditions, break them down clearly
8. Use professional, clear language appropriate for the domain

RESPONSE FORMAT:
- Provide direct, factual answers
- Include specific details (amounts, timeframes, percentages, etc.)
- Mention conditions or limitations when they apply
- Be concise but comprehensive
- Ensure accuracy over brevity";

const LOW_CONFIDENCE_NOTE: &str = "\n\nNOTE: The semantic search indicates limited relevant content for this question. Please be extra careful to only state what is explicitly mentioned in the document.";

/// Produces the final answer text for one question.
#[async_trait]
pub trait Answerer: Send + Sync {
    async fn answer(
        &self,
        context: &str,
        question: &str,
        summary: &RelevanceSummary,
    ) -> Result<String>;

    /// Model identifier reported in statistics and explanations.
    fn model_name(&self) -> &str;
}

/// The user turn sent to the model.
pub fn build_user_prompt(context: &str, question: &str, confidence: Confidence) -> String {
    let mut prompt = format!(
        "DOCUMENT CONTEXT:\n{}\n\nQUESTION:\n{}\n\nPlease analyze the document context and provide a detailed, accurate answer to the question. Base your response strictly on the information provided in the document context above.",
        context, question
    );
    if confidence == Confidence::Low {
        prompt.push_str(LOW_CONFIDENCE_NOTE);
    }
    prompt
}

pub struct ChatAnswerer {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl ChatAnswerer {
    /// Reads the API key from the environment variable named by
    /// `config.api_key_env`.
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            RagError::Configuration(format!(
                "{} environment variable is required",
                config.api_key_env
            ))
        })?;
        Self::with_api_key(config, api_key)
    }

    pub fn with_api_key(config: &LlmConfig, api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RagError::Configuration(format!("failed to build HTTP client: {}", e)))?;

        tracing::info!(model = %config.model, base_url = %config.base_url, "initialized chat answerer");

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl Answerer for ChatAnswerer {
    async fn answer(
        &self,
        context: &str,
        question: &str,
        summary: &RelevanceSummary,
    ) -> Result<String> {
        if !summary.has_relevant_content {
            return Ok(NOT_FOUND_ANSWER.to_string());
        }

        let preview: String = question.chars().take(100).collect();
        tracing::info!(question = %preview, "generating answer");

        let user_prompt = build_user_prompt(context, question, summary.confidence);
        let body = ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &user_prompt,
                },
            ],
        };

        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", self.api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth)
                .map_err(|_| RagError::Configuration("invalid LLM API key".to_string()))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let resp = self
            .client
            .post(&self.endpoint)
            .headers(headers)
            .json(&body)
            .send()
            .await
            .map_err(|e| RagError::AnswerGeneration(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(RagError::AnswerGeneration(format!(
                "chat API returned {}: {}",
                status, text
            )));
        }

        let parsed: ChatResponse = resp
            .json()
            .await
            .map_err(|e| RagError::AnswerGeneration(format!("invalid chat response: {}", e)))?;

        let answer = parsed
            .choices
            .into_iter()
            .find_map(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| RagError::AnswerGeneration("response contained no choices".to_string()))?;

        let total_tokens = parsed.usage.and_then(|u| u.total_tokens);
        tracing::info!(?total_tokens, "generated answer");

        Ok(answer)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: u32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    total_tokens: Option<u64>,
}
