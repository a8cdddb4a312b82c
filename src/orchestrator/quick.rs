use std::time::Instant;
use uuid::Uuid;

use crate::llm::LlmAdapter;
use crate::models::phase::simple_phase;
use crate::models::Mode;
use crate::prompts;
use crate::store::postgres::PgStore;

use super::RunResult;

/// One phase: `quick_synthesis`. A single LLM call, no sources.
pub async fn run(
    db: &PgStore,
    llm: &LlmAdapter,
    session_id: Uuid,
    query: &str,
) -> anyhow::Result<RunResult> {
    let started = Instant::now();
    let cancel = tokio_util::sync::CancellationToken::new();

    let chat = llm
        .chat(
            prompts::QUICK_SYNTHESIS_SYSTEM,
            query,
            Mode::Quick,
            1200,
            0.7,
            false,
            &cancel,
        )
        .await?;

    let phase_duration = started.elapsed().as_millis() as i64;
    db.append_phase(
        session_id,
        simple_phase::QUICK_SYNTHESIS,
        phase_duration,
        chat.tokens.total,
        serde_json::json!({}),
    )
    .await?;

    db.write_report(session_id, &chat.content, &[]).await?;

    let latency_ms = started.elapsed().as_millis() as i64;
    db.complete_session(session_id, latency_ms, chat.tokens.total)
        .await?;

    Ok(RunResult {
        session_id,
        mode: Mode::Quick,
        report: chat.content,
        citations: Vec::new(),
        tokens: chat.tokens,
        latency_ms,
    })
}
