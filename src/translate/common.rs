use reqwest::{Client, Response};
use std::time::Duration;
use tracing::warn;

use crate::error::{KasaneError, Result};
use super::Translator;

/// Request timeout for every provider
const HTTP_TIMEOUT: Duration = Duration::from_secs(300);

pub fn build_client() -> Result<Client> {
    Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(KasaneError::from)
}

/// Turn a non-2xx response into a translation error carrying status and body
pub async fn ensure_success(response: Response, provider: &str) -> Result<Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(KasaneError::Translation(format!(
        "{} API error {}: {}",
        provider, status, body
    )))
}

/// Extra patience for quota errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub attempts: u32,
    pub base_wait: Duration,
    pub step: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts for ordinary failures
    pub max_attempts: u32,
    /// First back-off; doubled after every failure
    pub base_delay: Duration,
    pub rate_limit: Option<RateLimitPolicy>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            rate_limit: None,
        }
    }
}

impl RetryPolicy {
    pub fn with_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// 429 / RESOURCE_EXHAUSTED: wait 60s, 70s, 80s... up to ten times
    pub fn with_quota_waits(mut self) -> Self {
        self.rate_limit = Some(RateLimitPolicy {
            attempts: 10,
            base_wait: Duration::from_secs(60),
            step: Duration::from_secs(10),
        });
        self
    }

    /// No sleeping at all
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: Duration::ZERO,
            rate_limit: None,
        }
    }

    pub fn backoff(&self, failures: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(failures.saturating_sub(1))
    }
}

pub fn is_rate_limited(error: &KasaneError) -> bool {
    let message = error.to_string();
    message.contains("429") || message.contains("RESOURCE_EXHAUSTED")
}

/// `complete` wrapped in the translator's retry policy
pub async fn translate(translator: &dyn Translator, system_prompt: &str, text: &str) -> Result<String> {
    let policy = translator.retry_policy();
    let mut failures = 0u32;
    let mut quota_waits = 0u32;

    loop {
        let error = match translator.complete(system_prompt, text).await {
            Ok(response) => return Ok(response),
            Err(e) => e,
        };

        if let Some(limit) = policy.rate_limit {
            if is_rate_limited(&error) && quota_waits < limit.attempts {
                let wait = limit.base_wait + limit.step * quota_waits;
                quota_waits += 1;
                warn!(
                    "{} rate limited, waiting {}s ({}/{})",
                    translator.name(),
                    wait.as_secs(),
                    quota_waits,
                    limit.attempts
                );
                tokio::time::sleep(wait).await;
                continue;
            }
        }

        failures += 1;
        if failures >= policy.max_attempts {
            return Err(error);
        }
        let delay = policy.backoff(failures);
        warn!(
            "{} request failed (attempt {}/{}): {}",
            translator.name(),
            failures,
            policy.max_attempts,
            error
        );
        tokio::time::sleep(delay).await;
    }
}
