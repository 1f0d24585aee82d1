use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::TranslateConfig;
use crate::error::{KasaneError, Result};
use super::common::{build_client, ensure_success};
use super::{RetryPolicy, Translator};

const DEFAULT_ENDPOINT: &str = "https://api.anthropic.com/v1";
const API_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 4096;

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

/// Messages API
pub struct AnthropicTranslator {
    client: Client,
    config: TranslateConfig,
}

impl AnthropicTranslator {
    pub fn new(config: TranslateConfig) -> Result<Self> {
        Ok(Self {
            client: build_client()?,
            config,
        })
    }
}

#[async_trait]
impl Translator for AnthropicTranslator {
    fn name(&self) -> &'static str {
        "Anthropic"
    }

    async fn complete(&self, system_prompt: &str, text: &str) -> Result<String> {
        let request = MessagesRequest {
            model: &self.config.model,
            max_tokens: MAX_TOKENS,
            system: system_prompt,
            messages: vec![Message { role: "user", content: text }],
            temperature: self.config.temperature,
        };

        let base = self.config.endpoint.as_deref().unwrap_or(DEFAULT_ENDPOINT);
        let url = format!("{}/messages", base.trim_end_matches('/'));
        debug!("Sending messages request to: {}", url);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&request)
            .send()
            .await?;
        let response: MessagesResponse = ensure_success(response, self.name()).await?.json().await?;

        response
            .content
            .into_iter()
            .find_map(|block| block.text)
            .map(|text| text.trim().to_string())
            .ok_or_else(|| KasaneError::Translation("Anthropic response had no text block".to_string()))
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::with_attempts(self.config.max_retries)
    }
}
