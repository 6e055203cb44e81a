//! Language model client
//!
//! Single-turn completion: the full context travels in the prompt, nothing is
//! remembered server-side.

use crate::config::{resolve_api_key, LlmConfig};
use crate::errors::{AppError, Result};
use crate::metrics;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Generation parameters sent with every request
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    /// Temperature (0.0 - 2.0)
    pub temperature: f32,

    /// Maximum output tokens
    pub max_tokens: Option<u32>,

    /// System prompt
    pub system_prompt: String,
}

impl From<&LlmConfig> for GenerationParams {
    fn from(config: &LlmConfig) -> Self {
        Self {
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            system_prompt: config.system_prompt.clone(),
        }
    }
}

/// Text-in, text-out language model
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, prompt: &str, params: &GenerationParams) -> Result<String>;

    fn model_name(&self) -> &str;
}

/// OpenAI-compatible chat completions client
pub struct OpenAIChatModel {
    client: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

impl OpenAIChatModel {
    pub fn new(api_key: String, model: String, api_base: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            api_key,
            model,
            endpoint: format!("{}/chat/completions", api_base.trim_end_matches('/')),
        })
    }

    async fn call_llm(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &params.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: params.temperature,
            max_tokens: params.max_tokens,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::generation(format!("LLM API request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::generation(format!("LLM API error {}: {}", status, body)));
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| AppError::generation(format!("Failed to parse LLM response: {}", e)))?;

        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AppError::generation("Empty response from LLM"))
    }
}

#[async_trait]
impl LanguageModel for OpenAIChatModel {
    async fn complete(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        let started = Instant::now();
        let result = self.call_llm(prompt, params).await;
        metrics::record_generation(started.elapsed().as_secs_f64(), &self.model, result.is_ok());
        result
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Offline model that answers with the question and the opening of the context
pub struct EchoModel;

impl EchoModel {
    pub const MODEL_NAME: &'static str = "echo";

    fn respond(prompt: &str) -> String {
        let question = prompt
            .lines()
            .find_map(|l| l.strip_prefix("Query:"))
            .map(str::trim)
            .unwrap_or("your question");

        let context: String = prompt
            .split("---------------------")
            .nth(1)
            .map(str::trim)
            .unwrap_or_default()
            .chars()
            .take(200)
            .collect();

        if context.is_empty() {
            format!("I found no context in the document for \"{}\".", question)
        } else {
            format!("About \"{}\", the document says: {}", question, context)
        }
    }
}

#[async_trait]
impl LanguageModel for EchoModel {
    async fn complete(&self, prompt: &str, _params: &GenerationParams) -> Result<String> {
        Ok(Self::respond(prompt))
    }

    fn model_name(&self) -> &str {
        Self::MODEL_NAME
    }
}

/// Create a language model based on configuration
pub fn create_language_model(config: &LlmConfig) -> Result<Arc<dyn LanguageModel>> {
    match config.provider.as_str() {
        "openai" => {
            let key = resolve_api_key(&config.api_key).ok_or_else(|| {
                AppError::config("OpenAI API key required (llm.api_key or OPENAI_API_KEY)")
            })?;
            Ok(Arc::new(OpenAIChatModel::new(
                key,
                config.model.clone(),
                &config.api_base,
                Duration::from_secs(config.timeout_secs),
            )?))
        }
        "echo" => Ok(Arc::new(EchoModel)),
        other => Err(AppError::config(format!("Unknown LLM provider: {}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_from_config() {
        let params = GenerationParams::from(&LlmConfig::default());
        assert!((params.temperature - 0.1).abs() < f32::EPSILON);
        assert_eq!(params.max_tokens, None);
    }

    #[test]
    fn test_echo_model_quotes_question_and_context() {
        let prompt = "Context information is below.\n---------------------\nRust is fast.\n---------------------\nQuery: Is Rust fast?\nAnswer: ";
        let params = GenerationParams::from(&LlmConfig::default());
        let answer = tokio_test::block_on(EchoModel.complete(prompt, &params)).unwrap();
        assert!(answer.contains("Is Rust fast?"));
        assert!(answer.contains("Rust is fast."));
    }

    #[test]
    fn test_echo_model_without_context() {
        let answer = EchoModel::respond("Query: anything\n");
        assert!(answer.contains("no context"));
    }

    #[test]
    fn test_chat_request_omits_unset_max_tokens() {
        let request = ChatRequest {
            model: "gpt-3.5-turbo",
            messages: vec![ChatMessage { role: "user", content: "hi" }],
            temperature: 0.1,
            max_tokens: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("max_tokens").is_none());
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[test]
    fn test_unknown_provider() {
        let config = LlmConfig {
            provider: "nope".to_string(),
            ..LlmConfig::default()
        };
        assert!(create_language_model(&config).is_err());
    }
}
