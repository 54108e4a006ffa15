//! Answer synthesis through a hosted LLM.
//!
//! [`GenerationProvider`] is the seam the query pipeline calls; concrete
//! backends are [`CohereGenerator`], [`OpenAIGenerator`] and
//! [`DisabledGenerator`]. Providers are created once from
//! [`GenerationConfig`] by [`create_generator`].

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::GenerationConfig;

/// One completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub max_tokens: usize,
    pub temperature: f32,
}

#[async_trait]
pub trait GenerationProvider: Send + Sync {
    fn model_name(&self) -> &str;
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;
}

/// Always fails; the query pipeline reports the failure as the answer.
pub struct DisabledGenerator;

#[async_trait]
impl GenerationProvider for DisabledGenerator {
    fn model_name(&self) -> &str {
        "disabled"
    }
    async fn generate(&self, _request: &GenerationRequest) -> Result<String> {
        bail!("generation provider is disabled")
    }
}

fn credential(config: &GenerationConfig, env_var: &str) -> Result<String> {
    if let Some(key) = &config.api_key {
        return Ok(key.clone());
    }
    std::env::var(env_var).map_err(|_| anyhow::anyhow!("{} environment variable not set", env_var))
}

fn http_client(config: &GenerationConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .context("failed to build generation HTTP client")
}

// ============ Cohere ============

/// Cohere chat endpoint (`POST /v1/chat`), default model `command-r-plus`.
pub struct CohereGenerator {
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl CohereGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        Ok(Self {
            api_key: credential(config, "COHERE_API_KEY")?,
            model: config
                .model
                .clone()
                .unwrap_or_else(|| "command-r-plus".to_string()),
            client: http_client(config)?,
        })
    }
}

#[derive(Serialize)]
struct CohereChatRequest<'a> {
    model: &'a str,
    message: &'a str,
    max_tokens: usize,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct CohereChatResponse {
    text: String,
}

#[async_trait]
impl GenerationProvider for CohereGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let body = CohereChatRequest {
            model: &self.model,
            message: &request.prompt,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };
        let resp = self
            .client
            .post("https://api.cohere.com/v1/chat")
            .bearer_auth(self.api_key.trim())
            .json(&body)
            .send()
            .await
            .context("failed to call Cohere chat")?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            bail!("Cohere returned {}: {}", status, text);
        }
        let parsed: CohereChatResponse =
            resp.json().await.context("failed to parse Cohere response")?;
        Ok(parsed.text)
    }
}

// ============ OpenAI ============

/// OpenAI chat completions, default model `gpt-4o-mini`.
pub struct OpenAIGenerator {
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl OpenAIGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        Ok(Self {
            api_key: credential(config, "OPENAI_API_KEY")?,
            model: config
                .model
                .clone()
                .unwrap_or_else(|| "gpt-4o-mini".to_string()),
            client: http_client(config)?,
        })
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: usize,
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

#[async_trait]
impl GenerationProvider for OpenAIGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            messages: vec![ChatMessage {
                role: "user",
                content: &request.prompt,
            }],
        };
        let resp = self
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .bearer_auth(self.api_key.trim())
            .json(&body)
            .send()
            .await
            .context("failed to call OpenAI chat completions")?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            bail!("OpenAI returned {}: {}", status, text);
        }
        let parsed: ChatResponse = resp.json().await.context("failed to parse OpenAI response")?;
        parsed
            .choices
            .into_iter()
            .find_map(|choice| choice.message.content)
            .ok_or_else(|| anyhow::anyhow!("OpenAI response contained no message content"))
    }
}

/// Build the generator named by `generation.provider`.
pub fn create_generator(config: &GenerationConfig) -> Result<Box<dyn GenerationProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledGenerator)),
        "cohere" => Ok(Box::new(CohereGenerator::new(config)?)),
        "openai" => Ok(Box::new(OpenAIGenerator::new(config)?)),
        other => bail!("Unknown generation provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_generator_fails() {
        let req = GenerationRequest {
            prompt: "hi".into(),
            max_tokens: 10,
            temperature: 0.2,
        };
        assert!(DisabledGenerator.generate(&req).await.is_err());
    }

    #[test]
    fn cohere_uses_configured_key_and_default_model() {
        let cfg = GenerationConfig {
            provider: "cohere".into(),
            api_key: Some("k".into()),
            ..GenerationConfig::default()
        };
        let generator = create_generator(&cfg).unwrap();
        assert_eq!(generator.model_name(), "command-r-plus");
    }

    #[test]
    fn chat_response_without_content_parses() {
        let parsed: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"role":"assistant"}}]}"#).unwrap();
        assert!(parsed.choices[0].message.content.is_none());
    }
}
