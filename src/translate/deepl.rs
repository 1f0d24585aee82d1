use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::TranslateConfig;
use crate::error::{KasaneError, Result};
use super::common::{build_client, ensure_success};
use super::{RetryPolicy, Translator};

const FREE_ENDPOINT: &str = "https://api-free.deepl.com/v2";
const PRO_ENDPOINT: &str = "https://api.deepl.com/v2";

#[derive(Debug, Serialize)]
struct TranslateRequest<'a> {
    text: [&'a str; 1],
    target_lang: &'a str,
    preserve_formatting: bool,
}

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    translations: Vec<Translation>,
}

#[derive(Debug, Deserialize)]
struct Translation {
    text: String,
}

/// Character-based machine translation; the system prompt is not used
pub struct DeepLTranslator {
    client: Client,
    config: TranslateConfig,
}

impl DeepLTranslator {
    pub fn new(config: TranslateConfig) -> Result<Self> {
        Ok(Self {
            client: build_client()?,
            config,
        })
    }

    /// Free-plan keys end in `:fx`
    fn base_url(&self) -> &str {
        match self.config.endpoint.as_deref() {
            Some(endpoint) => endpoint,
            None if self.config.api_key.ends_with(":fx") => FREE_ENDPOINT,
            None => PRO_ENDPOINT,
        }
    }
}

#[async_trait]
impl Translator for DeepLTranslator {
    fn name(&self) -> &'static str {
        "DeepL"
    }

    async fn complete(&self, _system_prompt: &str, text: &str) -> Result<String> {
        let url = format!("{}/translate", self.base_url().trim_end_matches('/'));
        debug!("Sending DeepL request to: {}", url);

        let request = TranslateRequest {
            text: [text],
            target_lang: &self.config.target_lang,
            preserve_formatting: true,
        };

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("DeepL-Auth-Key {}", self.config.api_key))
            .json(&request)
            .send()
            .await?;
        let response: TranslateResponse = ensure_success(response, self.name()).await?.json().await?;

        response
            .translations
            .into_iter()
            .next()
            .map(|t| t.text)
            .ok_or_else(|| KasaneError::Translation("DeepL response had no translations".to_string()))
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::with_attempts(self.config.max_retries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_follows_key_plan() {
        let free = DeepLTranslator::new(TranslateConfig {
            api_key: "abc:fx".to_string(),
            ..TranslateConfig::default()
        })
        .unwrap();
        assert_eq!(free.base_url(), FREE_ENDPOINT);

        let pro = DeepLTranslator::new(TranslateConfig {
            api_key: "abc".to_string(),
            ..TranslateConfig::default()
        })
        .unwrap();
        assert_eq!(pro.base_url(), PRO_ENDPOINT);
    }
}
