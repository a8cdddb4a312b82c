use axum::extract::{ConnectInfo, Path, Query, State};
use axum::response::{IntoResponse, Json};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{Citation, Mode};
use crate::orchestrator::StartOutcome;
use crate::AppState;

use super::stream::sse_response;
use super::validation::{clamp_paging, validate_query, validate_uuid};

#[derive(Debug, Deserialize)]
pub struct StartResearchRequest {
    pub query: String,
    #[serde(default)]
    pub mode: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CompletedPayload {
    #[serde(rename = "sessionId")]
    pub session_id: Uuid,
    pub mode: Mode,
    pub report: String,
    pub citations: Vec<Citation>,
    pub tokens: crate::models::events::TokenUsage,
    #[serde(rename = "latencyMs")]
    pub latency_ms: i64,
    #[serde(rename = "fromCache")]
    pub from_cache: bool,
}

#[derive(Debug, Serialize)]
pub struct DeepStartedPayload {
    #[serde(rename = "sessionId")]
    pub session_id: Uuid,
    pub mode: &'static str,
    pub status: &'static str,
}

pub async fn start_research(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(body): Json<StartResearchRequest>,
) -> Result<axum::response::Response, AppError> {
    if let Err(retry_after_secs) = state.research_rate_limiter.check(&addr.ip().to_string()) {
        return Err(AppError::RateLimited { retry_after_secs });
    }

    let query = validate_query(&body.query)?;
    let mode: Mode = body
        .mode
        .as_deref()
        .unwrap_or("standard")
        .parse()
        .map_err(|_| AppError::Validation("mode must be one of quick, standard, deep".into()))?;

    let outcome = state
        .orchestrator
        .start(query, mode)
        .await
        .map_err(AppError::Internal)?;

    Ok(match outcome {
        StartOutcome::CacheHit(result) => Json(CompletedPayload {
            session_id: result.session_id,
            mode: result.mode,
            report: result.report,
            citations: result.citations,
            tokens: result.tokens,
            latency_ms: result.latency_ms,
            from_cache: true,
        })
        .into_response(),
        StartOutcome::Completed(result) => Json(CompletedPayload {
            session_id: result.session_id,
            mode: result.mode,
            report: result.report,
            citations: result.citations,
            tokens: result.tokens,
            latency_ms: result.latency_ms,
            from_cache: false,
        })
        .into_response(),
        StartOutcome::DeepStarted { session_id } => Json(DeepStartedPayload {
            session_id,
            mode: "deep",
            status: "running",
        })
        .into_response(),
    })
}

#[derive(Debug, Serialize)]
pub struct SessionSnapshot {
    pub session: crate::models::Session,
    pub report: Option<crate::models::Report>,
    pub phases: Vec<crate::models::Phase>,
}

pub async fn get_research(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let session_id = validate_uuid(&id)?;
    let detail = state
        .orchestrator
        .db()
        .get_session_with_report(session_id)
        .await
        .map_err(AppError::Internal)?
        .ok_or(AppError::NotFound)?;

    Ok(Json(SessionSnapshot {
        session: detail.session,
        report: detail.report,
        phases: detail.phases,
    }))
}

pub async fn stream_research(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<axum::response::Response, AppError> {
    let session_id = validate_uuid(&id)?;

    let session = state
        .orchestrator
        .db()
        .get_session(session_id)
        .await
        .map_err(AppError::Internal)?
        .ok_or(AppError::NotFound)?;

    // Already terminal: respond with a single JSON payload instead of
    // opening a stream.
    if matches!(
        session.status,
        crate::models::session::Status::Completed | crate::models::session::Status::Failed
    ) {
        let detail = state
            .orchestrator
            .db()
            .get_session_with_report(session_id)
            .await
            .map_err(AppError::Internal)?
            .ok_or(AppError::NotFound)?;

        return Ok(Json(SessionSnapshot {
            session: detail.session,
            report: detail.report,
            phases: detail.phases,
        })
        .into_response());
    }

    let Some((backlog, rx)) = state.orchestrator.subscribe(session_id) else {
        // Session is `running` in the DB but this process has no live
        // job for it (e.g. a restart lost the in-flight job). Report it
        // back as a snapshot rather than hanging a stream forever.
        let detail = state
            .orchestrator
            .db()
            .get_session_with_report(session_id)
            .await
            .map_err(AppError::Internal)?
            .ok_or(AppError::NotFound)?;

        return Ok(Json(SessionSnapshot {
            session: detail.session,
            report: detail.report,
            phases: detail.phases,
        })
        .into_response());
    };

    Ok(sse_response(state.orchestrator.clone(), session_id, backlog, rx).into_response())
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub items: Vec<crate::models::Session>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

pub async fn list_history(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Query(params): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, AppError> {
    if let Err(retry_after_secs) = state.history_rate_limiter.check(&addr.ip().to_string()) {
        return Err(AppError::RateLimited { retry_after_secs });
    }

    let (limit, offset) = clamp_paging(params.limit, params.offset);
    let page = state
        .orchestrator
        .db()
        .list_history(limit, offset)
        .await
        .map_err(AppError::Internal)?;

    Ok(Json(HistoryResponse {
        items: page.items,
        total: page.total,
        limit,
        offset,
    }))
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub deleted: bool,
    pub id: Uuid,
}

pub async fn delete_history(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, AppError> {
    let session_id = validate_uuid(&id)?;
    let deleted = state
        .orchestrator
        .db()
        .delete_session(session_id)
        .await
        .map_err(AppError::Internal)?;

    if !deleted {
        return Err(AppError::NotFound);
    }

    Ok(Json(DeleteResponse {
        deleted: true,
        id: session_id,
    }))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: i64,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: chrono::Utc::now().timestamp_millis(),
    })
}
