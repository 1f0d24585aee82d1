use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::TranslateConfig;
use crate::error::{KasaneError, Result};
use super::common::{build_client, ensure_success};
use super::{RetryPolicy, Translator};

const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatContent,
}

#[derive(Debug, Deserialize)]
struct ChatContent {
    #[serde(default)]
    content: Option<String>,
}

/// Chat completions API
pub struct OpenAiTranslator {
    client: Client,
    config: TranslateConfig,
}

impl OpenAiTranslator {
    pub fn new(config: TranslateConfig) -> Result<Self> {
        Ok(Self {
            client: build_client()?,
            config,
        })
    }

    fn url(&self) -> String {
        let base = self.config.endpoint.as_deref().unwrap_or(DEFAULT_ENDPOINT);
        format!("{}/chat/completions", base.trim_end_matches('/'))
    }
}

#[async_trait]
impl Translator for OpenAiTranslator {
    fn name(&self) -> &'static str {
        "OpenAI"
    }

    async fn complete(&self, system_prompt: &str, text: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage { role: "system", content: system_prompt },
                ChatMessage { role: "user", content: text },
            ],
            temperature: self.config.temperature,
            response_format: self
                .config
                .force_json
                .then_some(ResponseFormat { kind: "json_object" }),
        };

        let url = self.url();
        debug!("Sending chat completion request to: {}", url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;
        let response: ChatResponse = ensure_success(response, self.name()).await?.json().await?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| KasaneError::Translation("OpenAI response had no content".to_string()))
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::with_attempts(self.config.max_retries)
    }
}
