//! Exponential backoff with jitter and `Retry-After` support, reused by
//! the LLM adapter's `chat()` call. The retry policy itself is generic;
//! the adapter supplies the status codes worth retrying and the backoff
//! bounds for the mode in play.

use anyhow::{Context, Result};
use bytes::Bytes;
use rand::Rng;
use reqwest::{Client, Method, RequestBuilder, Response};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub status_codes: Vec<u16>,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub jitter_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            // 1 initial attempt + 2 retries = 3 attempts total, per spec.
            max_retries: 2,
            status_codes: vec![429, 500, 502, 503],
            base_backoff_ms: 1000,
            max_backoff_ms: 8000,
            jitter_ms: 0,
        }
    }
}

/// Execute a request with configurable retries, backoff, jitter, and
/// Retry-After support. `attempt_timeout` is enforced per attempt (each
/// `send()` gets its own budget), not across the whole retry loop.
pub async fn robust_request(
    client: &Client,
    method: Method,
    url: &str,
    headers: reqwest::header::HeaderMap,
    body: Bytes,
    config: &RetryConfig,
    attempt_timeout: Duration,
) -> Result<Response> {
    let mut attempt = 0;

    loop {
        attempt += 1;

        let req_builder = client
            .request(method.clone(), url)
            .headers(headers.clone())
            .body(body.clone())
            .timeout(attempt_timeout);

        match execute_attempt(req_builder).await {
            Ok(response) => {
                let status = response.status();

                if !config.status_codes.contains(&status.as_u16()) {
                    return Ok(response);
                }

                if attempt > config.max_retries {
                    debug!(
                        "Exhausted {} retries for {} {}; last status: {}",
                        config.max_retries, method, url, status
                    );
                    return Ok(response);
                }

                let wait_duration = calculate_wait_time(&response, config, attempt);

                warn!(
                    "Attempt {}/{} failed with status {}. Retrying in {:?}...",
                    attempt,
                    config.max_retries + 1,
                    status,
                    wait_duration
                );

                sleep(wait_duration).await;
            }
            Err(e) => {
                if attempt > config.max_retries {
                    return Err(e).context(format!("Request failed after {} attempts", attempt));
                }

                let wait_duration = calculate_backoff(config, attempt);
                warn!(
                    "Attempt {}/{} failed with error: {}. Retrying in {:?}...",
                    attempt,
                    config.max_retries + 1,
                    e,
                    wait_duration
                );

                sleep(wait_duration).await;
            }
        }
    }
}

async fn execute_attempt(builder: RequestBuilder) -> Result<Response> {
    builder.send().await.map_err(|e| e.into())
}

fn calculate_wait_time(response: &Response, config: &RetryConfig, attempt: u32) -> Duration {
    if let Some(retry_after) = response.headers().get(reqwest::header::RETRY_AFTER) {
        if let Ok(retry_after_str) = retry_after.to_str() {
            if let Ok(seconds) = retry_after_str.parse::<u64>() {
                return Duration::from_secs(seconds);
            }
        }
    }

    calculate_backoff(config, attempt)
}

/// `min(base * 2^(attempt-1), max)`, plus up to `jitter_ms` of jitter.
fn calculate_backoff(config: &RetryConfig, attempt: u32) -> Duration {
    let base = config.base_backoff_ms as f64;
    let max = config.max_backoff_ms as f64;

    let raw_backoff = base * 2_f64.powi((attempt as i32) - 1);
    let capped_backoff = raw_backoff.min(max);

    let jitter = if config.jitter_ms == 0 {
        0
    } else {
        rand::thread_rng().gen_range(0..=config.jitter_ms)
    };

    Duration::from_millis((capped_backoff as u64) + jitter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn retry_on_500_eventually_succeeds() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(2)
            .mount(&mock_server)
            .await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"id":"ok"}"#))
            .mount(&mock_server)
            .await;

        let client = Client::new();
        let config = RetryConfig {
            base_backoff_ms: 5,
            max_backoff_ms: 20,
            ..RetryConfig::default()
        };

        let res = robust_request(
            &client,
            Method::POST,
            &format!("{}/v1/chat/completions", mock_server.uri()),
            reqwest::header::HeaderMap::new(),
            Bytes::new(),
            &config,
            Duration::from_secs(5),
        )
        .await
        .unwrap();

        assert_eq!(res.status(), 200);
    }

    /// Upstream returns 429 with `Retry-After: 1` twice, then 200.
    /// Elapsed time must be >= 1.8s, proving the header is honored.
    #[tokio::test]
    async fn retry_respects_429_retry_after_header() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(
                ResponseTemplate::new(429)
                    .insert_header("Retry-After", "1")
                    .set_body_string(r#"{"error":{"message":"Rate limit exceeded"}}"#),
            )
            .up_to_n_times(2)
            .expect(2)
            .mount(&mock_server)
            .await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"id":"chatcmpl-ok"}"#))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = Client::new();
        let config = RetryConfig {
            max_retries: 3,
            status_codes: vec![429, 500, 502, 503],
            base_backoff_ms: 100,
            max_backoff_ms: 5000,
            jitter_ms: 0,
        };

        let start = std::time::Instant::now();
        let resp = robust_request(
            &client,
            Method::POST,
            &format!("{}/v1/chat/completions", mock_server.uri()),
            reqwest::header::HeaderMap::new(),
            Bytes::from(r#"{"model":"gpt-4o"}"#),
            &config,
            Duration::from_secs(5),
        )
        .await
        .expect("request should succeed after retries");
        let elapsed = start.elapsed();

        assert_eq!(resp.status(), 200);
        assert!(
            elapsed.as_secs_f64() >= 1.8,
            "Elapsed {:.2}s should be >= 1.8s (two Retry-After: 1 waits)",
            elapsed.as_secs_f64()
        );
    }

    /// When all retries are exhausted, return the LAST response (not an error).
    #[tokio::test]
    async fn retry_exhausted_returns_last_response() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_string(r#"{"error":"rate limited"}"#))
            .expect(3)
            .mount(&mock_server)
            .await;

        let client = Client::new();
        let config = RetryConfig {
            max_retries: 2,
            status_codes: vec![429],
            base_backoff_ms: 5,
            max_backoff_ms: 20,
            jitter_ms: 0,
        };

        let resp = robust_request(
            &client,
            Method::POST,
            &format!("{}/v1/chat/completions", mock_server.uri()),
            reqwest::header::HeaderMap::new(),
            Bytes::from("{}"),
            &config,
            Duration::from_secs(5),
        )
        .await
        .expect("should return last response even on exhaustion");

        assert_eq!(resp.status(), 429, "should return last 429 after retries exhausted");
    }
}
