//! LLM adapter: the single place in the crate that speaks to the OpenAI
//! chat-completions API. Every phase in the orchestrator goes through
//! `chat()` — model selection, per-mode timeouts, and retry policy all
//! live here so callers never touch an HTTP client directly.

pub mod retry;

use anyhow::{anyhow, Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::config::Config;
use crate::models::{events::TokenUsage, Mode};
use retry::{robust_request, RetryConfig};

const CHAT_COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";

#[derive(Clone)]
pub struct LlmAdapter {
    client: reqwest::Client,
    api_key: Option<String>,
    economy_model: String,
    deep_model: String,
    timeouts: crate::config::LlmTimeouts,
}

pub struct ChatResult {
    pub content: String,
    pub tokens: TokenUsage,
}

impl LlmAdapter {
    pub fn new(config: &Config) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: config.openai_api_key.clone(),
            economy_model: config.economy_model.clone(),
            deep_model: config.deep_model.clone(),
            timeouts: config.llm_timeouts,
        }
    }

    fn model_for(&self, mode: Mode) -> &str {
        match mode {
            Mode::Quick | Mode::Standard => &self.economy_model,
            Mode::Deep => &self.deep_model,
        }
    }

    fn timeout_for(&self, mode: Mode) -> Duration {
        let ms = match mode {
            Mode::Quick => self.timeouts.quick_ms,
            Mode::Standard => self.timeouts.standard_ms,
            Mode::Deep => self.timeouts.deep_ms,
        };
        Duration::from_millis(ms)
    }

    /// Run a single chat completion. Retries transient upstream failures
    /// (429/500/502/503) with `min(1000 * 2^(attempt-1), 8000)` ms backoff,
    /// up to 3 attempts; cancellation and 400/401/403 are never retried.
    #[allow(clippy::too_many_arguments)]
    pub async fn chat(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        mode: Mode,
        max_tokens: u32,
        temperature: f32,
        json_mode: bool,
        cancel: &tokio_util::sync::CancellationToken,
    ) -> Result<ChatResult> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| anyhow!("OPENAI_API_KEY is not configured"))?;

        let mut body = json!({
            "model": self.model_for(mode),
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": user_prompt},
            ],
            "max_tokens": max_tokens,
            "temperature": temperature,
        });
        if json_mode {
            body["response_format"] = json!({"type": "json_object"});
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", api_key))
                .context("invalid API key header value")?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let payload = serde_json::to_vec(&body).context("failed to encode chat request body")?;
        let retry_config = RetryConfig::default();

        // The timeout is per attempt (each `send()` gets its own budget via
        // the request builder), not around the whole retry loop.
        let send = robust_request(
            &self.client,
            reqwest::Method::POST,
            CHAT_COMPLETIONS_URL,
            headers,
            payload.into(),
            &retry_config,
            self.timeout_for(mode),
        );

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(anyhow!("request cancelled")),
            result = send => result.context("LLM request failed")?,
        };

        let status = response.status();
        if status.as_u16() == 400 || status.as_u16() == 401 || status.as_u16() == 403 {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("non-retryable upstream error {}: {}", status, body));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("upstream error {}: {}", status, body));
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .context("failed to decode chat completion response")?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();

        let usage = parsed.usage.unwrap_or_default();

        Ok(ChatResult {
            content,
            tokens: TokenUsage {
                input: usage.prompt_tokens,
                output: usage.completion_tokens,
                total: usage.total_tokens,
            },
        })
    }
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: String,
}

#[derive(Deserialize, Default)]
struct Usage {
    prompt_tokens: i64,
    completion_tokens: i64,
    total_tokens: i64,
}
