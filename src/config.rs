/// Per-mode timeout knobs for the LLM adapter, in milliseconds.
#[derive(Debug, Clone, Copy)]
pub struct LlmTimeouts {
    pub quick_ms: u64,
    pub standard_ms: u64,
    pub deep_ms: u64,
}

impl Default for LlmTimeouts {
    fn default() -> Self {
        LlmTimeouts {
            quick_ms: 30_000,
            standard_ms: 45_000,
            deep_ms: 60_000,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub openai_api_key: Option<String>,
    pub tavily_api_key: Option<String>,
    /// Controls whether stack traces are logged at all (dev) or suppressed
    /// entirely beyond a generic message (production).
    pub is_production: bool,

    /// Model selection is centralized here rather than hardcoded at call
    /// sites — quick/standard synthesis uses the economy model, the deep
    /// pipeline uses the high-capability one.
    pub economy_model: String,
    pub deep_model: String,

    pub llm_timeouts: LlmTimeouts,
}

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();

    let node_env = std::env::var("NODE_ENV").unwrap_or_default();
    let is_production = node_env == "production";

    let openai_api_key = std::env::var("OPENAI_API_KEY").ok();
    if openai_api_key.is_none() {
        tracing::warn!("OPENAI_API_KEY is not set — startup will proceed, but LLM calls will fail");
    }

    let tavily_api_key = std::env::var("TAVILY_API_KEY").ok();
    if tavily_api_key.is_none() {
        tracing::warn!("TAVILY_API_KEY is not set — search adapter will always return empty results");
    }

    Ok(Config {
        port: std::env::var("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(3001),
        database_url: std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgres://localhost/deep_research".into()),
        openai_api_key,
        tavily_api_key,
        is_production,
        economy_model: std::env::var("RESEARCH_ECONOMY_MODEL")
            .unwrap_or_else(|_| "gpt-4o-mini".into()),
        deep_model: std::env::var("RESEARCH_DEEP_MODEL").unwrap_or_else(|_| "gpt-4o".into()),
        llm_timeouts: LlmTimeouts::default(),
    })
}
