use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use clap::Parser;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod cache;
mod cli;
mod config;
mod errors;
mod jobs;
mod llm;
mod middleware;
mod models;
mod orchestrator;
mod prompts;
mod search;
mod store;

use cache::ResultCache;
use llm::LlmAdapter;
use middleware::rate_limit::RateLimiter;
use orchestrator::Orchestrator;
use search::SearchAdapter;
use store::postgres::PgStore;

/// Shared application state passed to every handler.
pub struct AppState {
    pub orchestrator: Orchestrator,
    pub research_rate_limiter: RateLimiter,
    pub history_rate_limiter: RateLimiter,
    pub config: config::Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "research=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = config::load()?;
    let args = cli::Cli::parse();

    match args.command {
        Some(cli::Commands::Serve { port }) | None => {
            let port = port_override(&args.command).or(port).unwrap_or(cfg.port);
            run_server(cfg, port).await
        }
    }
}

/// `Serve { port }` takes precedence; `None` (bare invocation) falls
/// back to config.
fn port_override(command: &Option<cli::Commands>) -> Option<u16> {
    match command {
        Some(cli::Commands::Serve { port }) => *port,
        None => None,
    }
}

async fn run_server(cfg: config::Config, port: u16) -> anyhow::Result<()> {
    tracing::info!("connecting to database");
    let db = PgStore::connect(&cfg.database_url).await?;

    tracing::info!("running migrations");
    db.migrate().await?;

    let cache = ResultCache::new();
    let llm = LlmAdapter::new(&cfg);
    let search = SearchAdapter::new(&cfg);
    let orchestrator = Orchestrator::new(db, cache.clone(), llm, search);

    let state = Arc::new(AppState {
        orchestrator,
        research_rate_limiter: RateLimiter::new(20, Duration::from_secs(60)),
        history_rate_limiter: RateLimiter::new(60, Duration::from_secs(60)),
        config: cfg,
    });

    jobs::sweep::spawn(cache);
    tracing::info!("cache sweep job started");

    let app = axum::Router::new()
        .merge(api::router(state.clone()))
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(CorsLayer::permissive())
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(axum::middleware::from_fn(security_headers_middleware));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("deep research service listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutting down gracefully");
}

/// Injects a unique X-Request-Id into every response so clients can
/// correlate errors with service logs.
async fn request_id_middleware(
    req: axum::extract::Request,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let req_id = uuid::Uuid::new_v4().to_string();
    let mut resp = next.run(req).await;
    if let Ok(val) = axum::http::HeaderValue::from_str(&req_id) {
        resp.headers_mut().insert("x-request-id", val);
    }
    resp
}

/// Injects security headers into every response.
async fn security_headers_middleware(
    req: axum::extract::Request,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let mut resp = next.run(req).await;
    let headers = resp.headers_mut();

    headers.insert("X-Content-Type-Options", "nosniff".parse().unwrap());
    headers.insert("X-Frame-Options", "DENY".parse().unwrap());
    headers.insert("Referrer-Policy", "no-referrer".parse().unwrap());
    headers.remove("Server");

    resp
}
