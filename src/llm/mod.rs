use anyhow::{anyhow, Result};
use std::time::Duration;
use tracing::{debug, warn};

use crate::core::config;

const ANTHROPIC_URL: &str = "https://api.anthropic.com/v1/messages";
const OPENAI_URL: &str = "https://api.openai.com/v1/chat/completions";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Minimal chat-completion client with a primary/secondary cascade.
///
/// Only two pipeline stages consume it (PAA fallback and causal extraction),
/// both optional: with no keys configured every call degrades to an error the
/// caller maps to empty output.
pub struct LlmClient {
    http: reqwest::Client,
    anthropic_key: Option<String>,
    openai_key: Option<String>,
    anthropic_model: String,
    openai_model: String,
}

impl LlmClient {
    pub fn from_env(http: reqwest::Client) -> Self {
        Self {
            http,
            anthropic_key: config::anthropic_api_key(),
            openai_key: config::openai_api_key(),
            anthropic_model: std::env::var("ANTHROPIC_MODEL")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| "claude-3-5-haiku-latest".to_string()),
            openai_model: std::env::var("OPENAI_MODEL")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| "gpt-4o-mini".to_string()),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.anthropic_key.is_some() || self.openai_key.is_some()
    }

    /// Run the prompt through the primary model, falling back to the
    /// secondary on error or empty output.
    pub async fn complete(
        &self,
        prompt: &str,
        max_tokens: u32,
        timeout: Duration,
    ) -> Result<String> {
        if let Some(key) = &self.anthropic_key {
            match tokio::time::timeout(
                timeout,
                self.complete_anthropic(key, prompt, max_tokens),
            )
            .await
            {
                Ok(Ok(text)) if !text.trim().is_empty() => return Ok(text),
                Ok(Ok(_)) => warn!("primary LLM returned empty output, trying secondary"),
                Ok(Err(e)) => warn!("primary LLM failed: {}", e),
                Err(_) => warn!("primary LLM timed out after {}s", timeout.as_secs()),
            }
        }

        if let Some(key) = &self.openai_key {
            match tokio::time::timeout(timeout, self.complete_openai(key, prompt, max_tokens))
                .await
            {
                Ok(Ok(text)) if !text.trim().is_empty() => return Ok(text),
                Ok(Ok(_)) => return Err(anyhow!("secondary LLM returned empty output")),
                Ok(Err(e)) => return Err(anyhow!("secondary LLM failed: {}", e)),
                Err(_) => {
                    return Err(anyhow!(
                        "secondary LLM timed out after {}s",
                        timeout.as_secs()
                    ))
                }
            }
        }

        Err(anyhow!("no LLM configured"))
    }

    async fn complete_anthropic(
        &self,
        api_key: &str,
        prompt: &str,
        max_tokens: u32,
    ) -> Result<String> {
        let body = serde_json::json!({
            "model": self.anthropic_model,
            "max_tokens": max_tokens,
            "messages": [{"role": "user", "content": prompt}],
        });
        let resp = self
            .http
            .post(ANTHROPIC_URL)
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        let payload: serde_json::Value = resp.json().await?;
        if !status.is_success() {
            return Err(anyhow!("anthropic http {}: {}", status, payload));
        }
        let text = payload["content"][0]["text"].as_str().unwrap_or_default();
        debug!("anthropic returned {} chars", text.len());
        Ok(text.to_string())
    }

    async fn complete_openai(
        &self,
        api_key: &str,
        prompt: &str,
        max_tokens: u32,
    ) -> Result<String> {
        let body = serde_json::json!({
            "model": self.openai_model,
            "max_tokens": max_tokens,
            "messages": [{"role": "user", "content": prompt}],
        });
        let resp = self
            .http
            .post(OPENAI_URL)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        let payload: serde_json::Value = resp.json().await?;
        if !status.is_success() {
            return Err(anyhow!("openai http {}: {}", status, payload));
        }
        let text = payload["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or_default();
        debug!("openai returned {} chars", text.len());
        Ok(text.to_string())
    }
}
