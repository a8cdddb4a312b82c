//! Search adapter: a thin client over a Tavily-shaped search API. Every
//! failure mode (timeout, non-2xx, network error) degrades to an empty
//! result list rather than propagating — the orchestrator treats zero
//! sources as a valid state, never a phase failure.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::Config;

const SEARCH_URL: &str = "https://api.tavily.com/search";
const SEARCH_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Depth {
    Basic,
    Advanced,
}

impl Depth {
    fn as_str(self) -> &'static str {
        match self {
            Depth::Basic => "basic",
            Depth::Advanced => "advanced",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
    pub score: f64,
}

#[derive(Clone)]
pub struct SearchAdapter {
    client: reqwest::Client,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: u32,
    search_depth: &'a str,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResultEntry>,
}

#[derive(Deserialize)]
struct SearchResultEntry {
    title: String,
    url: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    score: f64,
}

impl SearchAdapter {
    pub fn new(config: &Config) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: config.tavily_api_key.clone(),
        }
    }

    /// Run a single search. Never returns an error: any failure degrades
    /// to an empty result list.
    pub async fn search(
        &self,
        query: &str,
        depth: Depth,
        max_results: u32,
        cancel: &tokio_util::sync::CancellationToken,
    ) -> Vec<SourceResult> {
        let Some(api_key) = self.api_key.as_deref() else {
            tracing::debug!("search adapter has no API key configured, returning empty results");
            return Vec::new();
        };

        let request = SearchRequest {
            api_key,
            query,
            max_results,
            search_depth: depth.as_str(),
        };

        let send = self.client.post(SEARCH_URL).json(&request).send();

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!(query, "search cancelled");
                return Vec::new();
            }
            result = tokio::time::timeout(SEARCH_TIMEOUT, send) => result,
        };

        let response = match outcome {
            Ok(Ok(resp)) if resp.status().is_success() => resp,
            Ok(Ok(resp)) => {
                tracing::warn!(query, status = %resp.status(), "search adapter got non-2xx");
                return Vec::new();
            }
            Ok(Err(err)) => {
                tracing::warn!(query, error = %err, "search adapter request failed");
                return Vec::new();
            }
            Err(_) => {
                tracing::warn!(query, "search adapter timed out");
                return Vec::new();
            }
        };

        match response.json::<SearchResponse>().await {
            Ok(parsed) => parsed
                .results
                .into_iter()
                .map(|r| SourceResult {
                    title: r.title,
                    url: r.url,
                    snippet: r.content,
                    score: r.score,
                })
                .collect(),
            Err(err) => {
                tracing::warn!(query, error = %err, "search adapter response decode failed");
                Vec::new()
            }
        }
    }

    /// Run several searches concurrently; each query succeeds or degrades
    /// independently of the others.
    pub async fn search_many(
        &self,
        queries: &[String],
        depth: Depth,
        max_results: u32,
        cancel: &tokio_util::sync::CancellationToken,
    ) -> Vec<Vec<SourceResult>> {
        let futures = queries
            .iter()
            .map(|q| self.search(q, depth, max_results, cancel));
        futures::future::join_all(futures).await
    }
}

/// Deduplicate sources by URL, first occurrence wins, preserving order.
pub fn dedupe_by_url(sources: Vec<SourceResult>) -> Vec<SourceResult> {
    let mut seen = std::collections::HashSet::new();
    sources
        .into_iter()
        .filter(|s| seen.insert(s.url.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(url: &str) -> SourceResult {
        SourceResult {
            title: "t".into(),
            url: url.into(),
            snippet: "s".into(),
            score: 0.5,
        }
    }

    #[test]
    fn dedupe_keeps_first_occurrence() {
        let sources = vec![source("https://a"), source("https://b"), source("https://a")];
        let deduped = dedupe_by_url(sources);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].url, "https://a");
        assert_eq!(deduped[1].url, "https://b");
    }

    #[tokio::test]
    async fn search_without_api_key_returns_empty() {
        let config = Config {
            port: 3001,
            database_url: String::new(),
            openai_api_key: None,
            tavily_api_key: None,
            is_production: false,
            economy_model: "gpt-4o-mini".into(),
            deep_model: "gpt-4o".into(),
            llm_timeouts: Default::default(),
        };
        let adapter = SearchAdapter::new(&config);
        let cancel = tokio_util::sync::CancellationToken::new();
        let results = adapter.search("test", Depth::Basic, 5, &cancel).await;
        assert!(results.is_empty());
    }
}
