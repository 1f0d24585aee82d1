use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::TranslateConfig;
use crate::error::Result;
use super::common::{build_client, ensure_success};
use super::{RetryPolicy, Translator};

const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Returned when the response is empty or filtered, so the chunk keeps its originals
const EMPTY_RESPONSE: &str = "{}";

const HARM_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    safety_settings: Vec<SafetySetting>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct SafetySetting {
    category: &'static str,
    threshold: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    response_mime_type: &'static str,
}

#[derive(Debug, Default, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

impl GenerateResponse {
    fn text(&self) -> String {
        self.candidates
            .iter()
            .filter_map(|c| c.content.as_ref())
            .flat_map(|c| c.parts.iter())
            .filter_map(|p| p.text.as_deref())
            .collect::<String>()
    }
}

/// generateContent API with safety filters disabled
pub struct GeminiTranslator {
    client: Client,
    config: TranslateConfig,
}

impl GeminiTranslator {
    pub fn new(config: TranslateConfig) -> Result<Self> {
        Ok(Self {
            client: build_client()?,
            config,
        })
    }

    fn request_body<'a>(&self, prompt: &'a str) -> GenerateRequest<'a> {
        GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
            safety_settings: HARM_CATEGORIES
                .iter()
                .map(|&category| SafetySetting {
                    category,
                    threshold: "BLOCK_NONE",
                })
                .collect(),
            generation_config: GenerationConfig {
                temperature: self.config.temperature,
                response_mime_type: if self.config.force_json {
                    "application/json"
                } else {
                    "text/plain"
                },
            },
        }
    }
}

#[async_trait]
impl Translator for GeminiTranslator {
    fn name(&self) -> &'static str {
        "Gemini"
    }

    async fn complete(&self, system_prompt: &str, text: &str) -> Result<String> {
        let prompt = format!("{}\n\n[INPUT DATA]\n{}", system_prompt, text);
        let base = self.config.endpoint.as_deref().unwrap_or(DEFAULT_ENDPOINT);
        let url = format!(
            "{}/models/{}:generateContent",
            base.trim_end_matches('/'),
            self.config.model
        );
        debug!("Sending generateContent request to: {}", url);

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.config.api_key.as_str())])
            .json(&self.request_body(&prompt))
            .send()
            .await?;
        let response: GenerateResponse = ensure_success(response, self.name()).await?.json().await?;

        let text = response.text();
        if text.trim().is_empty() {
            warn!("Gemini returned an empty or filtered response, keeping originals");
            return Ok(EMPTY_RESPONSE.to_string());
        }
        Ok(text.trim().to_string())
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::with_attempts(self.config.max_retries).with_quota_waits()
    }
}
