use serde::Deserialize;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::llm::LlmAdapter;
use crate::models::events::PhasePayload;
use crate::models::phase::deep_phase;
use crate::models::{Citation, Mode, StreamEvent};
use crate::prompts;
use crate::search::{self, Depth, SearchAdapter, SourceResult};
use crate::store::postgres::PgStore;

use super::{EventSink, RunResult};

#[derive(Debug, Deserialize)]
struct QueryAnalysis {
    #[serde(rename = "coreQuestion")]
    core_question: String,
    #[serde(rename = "subQuestions")]
    sub_questions: Vec<String>,
    domain: String,
    #[serde(rename = "outputType")]
    output_type: String,
}

fn fallback_analysis(query: &str) -> QueryAnalysis {
    QueryAnalysis {
        core_question: query.to_string(),
        sub_questions: vec![query.to_string()],
        domain: "general".to_string(),
        output_type: "analysis".to_string(),
    }
}

fn emit(sink: &EventSink, phase: &str, progress: u8, message: &str) {
    sink.emit(StreamEvent::Phase(PhasePayload {
        phase: phase.to_string(),
        progress,
        message: message.to_string(),
        data: None,
        timestamp: chrono::Utc::now().timestamp_millis(),
    }));
}

/// The six-phase deep pipeline. Phases run strictly sequentially; phases
/// 3 and 4 are skipped when the preceding step yields no input. Returns
/// `Err` on an unrecoverable LLM failure or persistence failure; the
/// caller is responsible for marking the session failed.
pub async fn run(
    db: &PgStore,
    llm: &LlmAdapter,
    search: &SearchAdapter,
    session_id: Uuid,
    query: &str,
    sink: &EventSink,
    cancel: &CancellationToken,
) -> anyhow::Result<RunResult> {
    let total_started = Instant::now();
    let mut total_tokens: i64 = 0;
    let mut total_input: i64 = 0;
    let mut total_output: i64 = 0;

    macro_rules! bail_if_cancelled {
        () => {
            if cancel.is_cancelled() {
                anyhow::bail!("research session cancelled");
            }
        };
    }

    // Phase 1: query_analysis
    emit(sink, deep_phase::QUERY_ANALYSIS, 5, "Analyzing the research question");
    let phase_started = Instant::now();
    let analysis_chat = llm
        .chat(
            prompts::QUERY_ANALYSIS_SYSTEM,
            query,
            Mode::Deep,
            500,
            0.3,
            true,
            cancel,
        )
        .await?;
    let analysis: QueryAnalysis =
        serde_json::from_str(&analysis_chat.content).unwrap_or_else(|_| fallback_analysis(query));
    total_tokens += analysis_chat.tokens.total;
    total_input += analysis_chat.tokens.input;
    total_output += analysis_chat.tokens.output;
    db.append_phase(
        session_id,
        deep_phase::QUERY_ANALYSIS,
        phase_started.elapsed().as_millis() as i64,
        analysis_chat.tokens.total,
        serde_json::json!({
            "coreQuestion": analysis.core_question,
            "subQuestions": analysis.sub_questions,
            "domain": analysis.domain,
            "outputType": analysis.output_type,
        }),
    )
    .await?;
    emit(sink, deep_phase::QUERY_ANALYSIS, 15, "Query analysis complete");
    bail_if_cancelled!();

    // Phase 2: source_discovery
    emit(sink, deep_phase::SOURCE_DISCOVERY, 20, "Searching for sources");
    let phase_started = Instant::now();
    let mut sub_queries: Vec<String> = vec![query.to_string()];
    sub_queries.extend(analysis.sub_questions.iter().take(3).cloned());

    let result_sets = search
        .search_many(&sub_queries, Depth::Advanced, 4, cancel)
        .await;
    let all_sources: Vec<SourceResult> = result_sets.into_iter().flatten().collect();
    let sources = search::dedupe_by_url(all_sources);

    db.append_phase(
        session_id,
        deep_phase::SOURCE_DISCOVERY,
        phase_started.elapsed().as_millis() as i64,
        0,
        serde_json::json!({ "sourcesFound": sources.len() }),
    )
    .await?;
    emit(sink, deep_phase::SOURCE_DISCOVERY, 30, "Source discovery complete");
    bail_if_cancelled!();

    // Phase 3: content_extraction (skipped if no sources)
    let extraction = if sources.is_empty() {
        None
    } else {
        emit(sink, deep_phase::CONTENT_EXTRACTION, 35, "Extracting source content");
        let phase_started = Instant::now();
        let serialized = serialize_sources(&sources);
        let chat = llm
            .chat(
                prompts::EXTRACTION_SYSTEM,
                &format!("Query: {query}\n\nSources:\n{serialized}"),
                Mode::Deep,
                1200,
                0.3,
                false,
                cancel,
            )
            .await?;
        total_tokens += chat.tokens.total;
        total_input += chat.tokens.input;
        total_output += chat.tokens.output;
        db.append_phase(
            session_id,
            deep_phase::CONTENT_EXTRACTION,
            phase_started.elapsed().as_millis() as i64,
            chat.tokens.total,
            serde_json::json!({}),
        )
        .await?;
        emit(sink, deep_phase::CONTENT_EXTRACTION, 50, "Content extraction complete");
        Some(chat.content)
    };
    bail_if_cancelled!();

    // Phase 4: cross_validation (skipped if extraction produced no output)
    let validation = if let Some(extracted) = extraction.as_ref() {
        emit(sink, deep_phase::CROSS_VALIDATION, 55, "Cross-validating findings");
        let phase_started = Instant::now();
        let chat = llm
            .chat(
                prompts::VALIDATION_SYSTEM,
                extracted,
                Mode::Deep,
                800,
                0.3,
                false,
                cancel,
            )
            .await?;
        total_tokens += chat.tokens.total;
        total_input += chat.tokens.input;
        total_output += chat.tokens.output;
        db.append_phase(
            session_id,
            deep_phase::CROSS_VALIDATION,
            phase_started.elapsed().as_millis() as i64,
            chat.tokens.total,
            serde_json::json!({}),
        )
        .await?;
        emit(sink, deep_phase::CROSS_VALIDATION, 65, "Cross-validation complete");
        Some(chat.content)
    } else {
        None
    };
    bail_if_cancelled!();

    // Phase 5: structured_synthesis
    emit(sink, deep_phase::STRUCTURED_SYNTHESIS, 70, "Synthesizing the report");
    let phase_started = Instant::now();
    let synthesis_input = format!(
        "Query: {query}\n\nAnalysis: {}\n\nExtracted insights:\n{}\n\nValidation:\n{}\n\nSources:\n{}",
        serde_json::json!({
            "coreQuestion": analysis.core_question,
            "subQuestions": analysis.sub_questions,
            "domain": analysis.domain,
            "outputType": analysis.output_type,
        }),
        extraction.as_deref().unwrap_or("(none)"),
        validation.as_deref().unwrap_or("(none)"),
        serialize_sources(&sources),
    );
    let synthesis_chat = llm
        .chat(
            prompts::DEEP_SYNTHESIS_SYSTEM,
            &synthesis_input,
            Mode::Deep,
            3000,
            0.7,
            false,
            cancel,
        )
        .await?;
    total_tokens += synthesis_chat.tokens.total;
    total_input += synthesis_chat.tokens.input;
    total_output += synthesis_chat.tokens.output;
    db.append_phase(
        session_id,
        deep_phase::STRUCTURED_SYNTHESIS,
        phase_started.elapsed().as_millis() as i64,
        synthesis_chat.tokens.total,
        serde_json::json!({}),
    )
    .await?;
    emit(sink, deep_phase::STRUCTURED_SYNTHESIS, 85, "Synthesis complete");
    bail_if_cancelled!();

    // Phase 6: citation_linking — a pure transform, no LLM call.
    emit(sink, deep_phase::CITATION_LINKING, 90, "Linking citations");
    let phase_started = Instant::now();
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
    db.append_phase(
        session_id,
        deep_phase::CITATION_LINKING,
        phase_started.elapsed().as_millis() as i64,
        0,
        serde_json::json!({}),
    )
    .await?;
    emit(sink, deep_phase::CITATION_LINKING, 100, "Research complete");

    if cancel.is_cancelled() {
        anyhow::bail!("research session cancelled");
    }

    db.write_report(session_id, &synthesis_chat.content, &citations)
        .await?;

    let latency_ms = total_started.elapsed().as_millis() as i64;
    db.complete_session(session_id, latency_ms, total_tokens)
        .await?;

    Ok(RunResult {
        session_id,
        mode: Mode::Deep,
        report: synthesis_chat.content,
        citations,
        tokens: crate::models::events::TokenUsage {
            input: total_input,
            output: total_output,
            total: total_tokens,
        },
        latency_ms,
    })
}

fn serialize_sources(sources: &[SourceResult]) -> String {
    use std::fmt::Write as _;
    let mut out = String::new();
    for (i, s) in sources.iter().enumerate() {
        let truncated: String = s.snippet.chars().take(500).collect();
        let _ = writeln!(out, "[{}] {} ({})\n{}", i + 1, s.title, s.url, truncated);
    }
    out
}
