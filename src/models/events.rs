use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::report::Citation;

/// Token usage breakdown, reused across the `complete` event and the
/// synchronous quick/standard response payloads.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input: i64,
    pub output: i64,
    pub total: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhasePayload {
    pub phase: String,
    pub progress: u8,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletePayload {
    pub session_id: Uuid,
    pub report: String,
    pub citations: Vec<Citation>,
    pub tokens: TokenUsage,
    pub latency_ms: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
}

/// The three events the deep-mode stream can emit. Each variant's wire
/// event name is its snake_case tag below (`phase`, `complete`, `error`);
/// `complete`/`error` are terminal — the stream closes immediately after.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Phase(PhasePayload),
    Complete(CompletePayload),
    Error(ErrorPayload),
}

impl StreamEvent {
    /// The SSE `event:` field name for this variant.
    pub fn event_name(&self) -> &'static str {
        match self {
            StreamEvent::Phase(_) => "phase",
            StreamEvent::Complete(_) => "complete",
            StreamEvent::Error(_) => "error",
        }
    }

    /// The single-line JSON `data:` payload for this variant (excludes
    /// the `type` discriminator used internally — the wire format keys
    /// that off the `event:` field instead, per spec).
    pub fn data_json(&self) -> serde_json::Value {
        match self {
            StreamEvent::Phase(p) => serde_json::to_value(p).unwrap_or(serde_json::Value::Null),
            StreamEvent::Complete(c) => serde_json::to_value(c).unwrap_or(serde_json::Value::Null),
            StreamEvent::Error(e) => serde_json::to_value(e).unwrap_or(serde_json::Value::Null),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, StreamEvent::Phase(_))
    }
}
