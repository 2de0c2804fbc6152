//! LLM client for catalog answer generation and validation.
//!
//! Supports OpenAI-compatible chat completions (JSON mode) and the Ollama
//! generate API (`format: "json"`).

mod config;
mod prompts;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

pub use config::{LlmConfig, LlmProvider};

use super::{AiResponses, InferenceOracle};
use crate::models::{CatalogRow, CellValue, ValidationResult};

/// Errors that can occur during LLM operations.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// Failed to connect to LLM service
    #[error("Connection error: {0}")]
    Connection(String),
    /// API returned an error
    #[error("API error: {0}")]
    Api(String),
    /// Failed to parse response
    #[error("Parse error: {0}")]
    Parse(String),
    /// OpenAI-compatible provider selected without a key
    #[error("No API key configured (set LLM_API_KEY or OPENAI_API_KEY)")]
    MissingApiKey,
}

/// LLM client used as the catalog inference oracle.
pub struct LlmClient {
    config: LlmConfig,
    client: Client,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    error: Option<ChatError>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatError {
    message: String,
}

/// Ollama API request format.
#[derive(Debug, Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    system: &'a str,
    prompt: &'a str,
    stream: bool,
    format: &'static str,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

/// Ollama API response format.
#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
}

impl LlmClient {
    /// Create a new LLM client with the given configuration.
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(300)) // 5 min timeout for slow models
            .build()
            .map_err(|e| LlmError::Connection(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    /// Truncate content to configured maximum (UTF-8 safe).
    fn truncate_content<'a>(&self, text: &'a str) -> &'a str {
        if text.len() <= self.config.max_content_chars {
            return text;
        }
        let mut end = self.config.max_content_chars;
        while end > 0 && !text.is_char_boundary(end) {
            end -= 1;
        }
        &text[..end]
    }

    /// Send one system + user exchange and return the raw JSON text.
    async fn complete_json(&self, system: &str, prompt: &str) -> Result<String, LlmError> {
        match self.config.provider {
            LlmProvider::OpenAI => self.call_openai(system, prompt).await,
            LlmProvider::Ollama => self.call_ollama(system, prompt).await,
        }
    }

    async fn call_openai(&self, system: &str, prompt: &str) -> Result<String, LlmError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or(LlmError::MissingApiKey)?;

        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let url = format!(
            "{}/v1/chat/completions",
            self.config.endpoint.trim_end_matches('/')
        );
        let resp = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::Connection(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::Api(format!("HTTP {}: {}", status, body)));
        }

        let chat: ChatResponse = resp
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        if let Some(err) = chat.error {
            return Err(LlmError::Api(err.message));
        }

        chat.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| LlmError::Parse("Response contained no message content".to_string()))
    }

    async fn call_ollama(&self, system: &str, prompt: &str) -> Result<String, LlmError> {
        let request = OllamaRequest {
            model: &self.config.model,
            system,
            prompt,
            stream: false,
            format: "json",
            options: OllamaOptions {
                temperature: self.config.temperature,
                num_predict: self.config.max_tokens,
            },
        };

        let url = format!("{}/api/generate", self.config.endpoint.trim_end_matches('/'));
        let resp = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::Connection(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::Api(format!("HTTP {}: {}", status, body)));
        }

        let ollama_resp: OllamaResponse = resp
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        Ok(ollama_resp.response)
    }
}

/// Parse model output as a JSON object, tolerating a surrounding code fence.
fn parse_json_object(raw: &str) -> Result<serde_json::Map<String, serde_json::Value>, LlmError> {
    let trimmed = raw.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|s| s.strip_suffix("```"))
        .unwrap_or(trimmed);

    match serde_json::from_str::<serde_json::Value>(body.trim()) {
        Ok(serde_json::Value::Object(map)) => Ok(map),
        Ok(other) => Err(LlmError::Parse(format!(
            "expected a JSON object, got {}",
            json_kind(&other)
        ))),
        Err(e) => Err(LlmError::Parse(format!("invalid JSON: {}", e))),
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

/// Convert one generated answer into a cell. Only scalars are accepted.
fn cell_from_json(field: &str, value: serde_json::Value) -> Result<CellValue, LlmError> {
    match value {
        serde_json::Value::Null => Ok(CellValue::Null),
        serde_json::Value::Bool(b) => Ok(CellValue::Text(b.to_string())),
        serde_json::Value::String(s) => Ok(CellValue::Text(s)),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Ok(CellValue::Integer(i)),
            None => n
                .as_f64()
                .map(CellValue::Float)
                .ok_or_else(|| LlmError::Parse(format!("answer for '{}' is out of range", field))),
        },
        other => Err(LlmError::Parse(format!(
            "answer for '{}' is {}, expected a scalar",
            field,
            json_kind(&other)
        ))),
    }
}

#[async_trait]
impl InferenceOracle for LlmClient {
    async fn generate(
        &self,
        existing_rows: &[CatalogRow],
        scraped_text: &str,
        question_fields: &[String],
    ) -> Result<AiResponses, LlmError> {
        let historical = serde_json::to_string_pretty(existing_rows)
            .map_err(|e| LlmError::Parse(format!("failed to serialize rows: {}", e)))?;
        let content = self.truncate_content(scraped_text);
        if content.len() < scraped_text.len() {
            debug!(
                "Truncated scraped content from {} to {} bytes",
                scraped_text.len(),
                content.len()
            );
        }

        let prompt = prompts::generation_prompt(&historical, content, question_fields);
        info!(
            "Generating answers for {} fields with {}",
            question_fields.len(),
            self.config.model
        );

        let raw = self
            .complete_json(prompts::ANALYST_SYSTEM_PROMPT, &prompt)
            .await?;
        let object = parse_json_object(&raw)?;

        let mut responses = AiResponses::new();
        for (field, value) in object {
            let cell = cell_from_json(&field, value)?;
            responses.insert(field, cell);
        }
        if responses.is_empty() {
            warn!("Model returned an empty answer set");
        }
        Ok(responses)
    }

    async fn validate(
        &self,
        responses: &AiResponses,
        question_fields: &[String],
    ) -> Result<ValidationResult, LlmError> {
        let answers = serde_json::to_string_pretty(responses)
            .map_err(|e| LlmError::Parse(format!("failed to serialize answers: {}", e)))?;
        let prompt = prompts::validation_prompt(&answers, question_fields);

        debug!("Validating {} generated answers", responses.len());
        let raw = self
            .complete_json(prompts::VALIDATOR_SYSTEM_PROMPT, &prompt)
            .await?;
        let object = parse_json_object(&raw)?;

        serde_json::from_value(serde_json::Value::Object(object))
            .map_err(|e| LlmError::Parse(format!("malformed validation result: {}", e)))
    }
}
