use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One step of the orchestrator pipeline, appended for audit and progress
/// tracking. Phase rows are append-only and strictly ordered by insertion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Phase {
    pub id: i64,
    pub session_id: Uuid,
    pub name: String,
    pub duration_ms: i64,
    pub tokens_used: i64,
    pub metadata: serde_json::Value,
}

#[derive(Debug, sqlx::FromRow)]
pub struct PhaseRow {
    pub id: i64,
    pub session_id: Uuid,
    pub name: String,
    pub duration_ms: i64,
    pub tokens_used: i64,
    pub metadata: serde_json::Value,
}

impl From<PhaseRow> for Phase {
    fn from(row: PhaseRow) -> Self {
        Phase {
            id: row.id,
            session_id: row.session_id,
            name: row.name,
            duration_ms: row.duration_ms,
            tokens_used: row.tokens_used,
            metadata: row.metadata,
        }
    }
}

/// Canonical phase names for the deep six-phase pipeline, in pipeline order.
pub mod deep_phase {
    pub const QUERY_ANALYSIS: &str = "query_analysis";
    pub const SOURCE_DISCOVERY: &str = "source_discovery";
    pub const CONTENT_EXTRACTION: &str = "content_extraction";
    pub const CROSS_VALIDATION: &str = "cross_validation";
    pub const STRUCTURED_SYNTHESIS: &str = "structured_synthesis";
    pub const CITATION_LINKING: &str = "citation_linking";
}

/// Phase names shared by quick/standard modes.
pub mod simple_phase {
    pub const QUICK_SYNTHESIS: &str = "quick_synthesis";
    pub const SOURCE_DISCOVERY: &str = "source_discovery";
    pub const STRUCTURED_SYNTHESIS: &str = "structured_synthesis";
}
