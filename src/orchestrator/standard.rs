use std::fmt::Write as _;
use std::time::Instant;
use uuid::Uuid;

use crate::llm::LlmAdapter;
use crate::models::phase::simple_phase;
use crate::models::{Citation, Mode};
use crate::prompts;
use crate::search::{Depth, SearchAdapter};
use crate::store::postgres::PgStore;

use super::RunResult;

/// Two phases: `source_discovery` then `structured_synthesis`.
pub async fn run(
    db: &PgStore,
    llm: &LlmAdapter,
    search: &SearchAdapter,
    session_id: Uuid,
    query: &str,
) -> anyhow::Result<RunResult> {
    let total_started = Instant::now();
    let cancel = tokio_util::sync::CancellationToken::new();

    let phase_started = Instant::now();
    let sources = search.search(query, Depth::Basic, 5, &cancel).await;
    db.append_phase(
        session_id,
        simple_phase::SOURCE_DISCOVERY,
        phase_started.elapsed().as_millis() as i64,
        0,
        serde_json::json!({ "sourcesFound": sources.len() }),
    )
    .await?;

    let mut source_list = String::new();
    for (i, source) in sources.iter().enumerate() {
        let _ = writeln!(
            source_list,
            "[{}] {} ({})\n{}",
            i + 1,
            source.title,
            source.url,
            source.snippet
        );
    }

    let user_prompt = if source_list.is_empty() {
        query.to_string()
    } else {
        format!("Query: {query}\n\nSources:\n{source_list}")
    };

    let phase_started = Instant::now();
    let chat = llm
        .chat(
            prompts::STANDARD_SYNTHESIS_SYSTEM,
            &user_prompt,
            Mode::Standard,
            2000,
            0.7,
            false,
            &cancel,
        )
        .await?;
    db.append_phase(
        session_id,
        simple_phase::STRUCTURED_SYNTHESIS,
        phase_started.elapsed().as_millis() as i64,
        chat.tokens.total,
        serde_json::json!({}),
    )
    .await?;

    let citations: Vec<Citation> = sources
        .iter()
        .enumerate()
        .map(|(i, s)| Citation {
            id: (i + 1) as u32,
            title: s.title.clone(),
            url: s.url.clone(),
            relevance: s.score,
        })
        .collect();

    db.write_report(session_id, &chat.content, &citations)
        .await?;

    let latency_ms = total_started.elapsed().as_millis() as i64;
    db.complete_session(session_id, latency_ms, chat.tokens.total)
        .await?;

    Ok(RunResult {
        session_id,
        mode: Mode::Standard,
        report: chat.content,
        citations,
        tokens: chat.tokens,
        latency_ms,
    })
}
