// Machine translation providers
//
// Every provider implements one capability: send a system prompt and a text,
// get text back. Retry behaviour is described by the provider's RetryPolicy
// and applied by `translate`. The factory picks the provider from config.

pub mod anthropic;
pub mod common;
pub mod deepl;
pub mod gemini;
pub mod openai;
pub mod processor;

use async_trait::async_trait;

pub use common::{translate, RetryPolicy};
pub use processor::{TranslateReport, TranslationProcessor};

use crate::config::{ProviderKind, TranslateConfig};
use crate::error::{KasaneError, Result};

/// A translation provider
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Translator: Send + Sync {
    /// Provider name for log lines
    fn name(&self) -> &'static str;

    /// Single request, no retries
    async fn complete(&self, system_prompt: &str, text: &str) -> Result<String>;

    fn retry_policy(&self) -> RetryPolicy;
}

/// Factory for creating translator instances
pub struct TranslatorFactory;

impl TranslatorFactory {
    pub fn create(config: &TranslateConfig) -> Result<Box<dyn Translator>> {
        if config.api_key.trim().is_empty() {
            return Err(KasaneError::Config(format!(
                "translate.api_key is required for provider {:?}",
                config.provider
            )));
        }

        let translator: Box<dyn Translator> = match config.provider {
            ProviderKind::OpenAi => Box::new(openai::OpenAiTranslator::new(config.clone())?),
            ProviderKind::Anthropic => Box::new(anthropic::AnthropicTranslator::new(config.clone())?),
            ProviderKind::Gemini => Box::new(gemini::GeminiTranslator::new(config.clone())?),
            ProviderKind::DeepL => Box::new(deepl::DeepLTranslator::new(config.clone())?),
        };
        Ok(translator)
    }
}
