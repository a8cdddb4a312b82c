use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An append-only error record. `session_id` is nulled (not deleted)
/// when the owning session is deleted, so the audit trail survives
/// cascade deletes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEntry {
    pub id: i64,
    pub session_id: Option<Uuid>,
    pub message: String,
    pub stack: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
pub struct ErrorEntryRow {
    pub id: i64,
    pub session_id: Option<Uuid>,
    pub message: String,
    pub stack: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<ErrorEntryRow> for ErrorEntry {
    fn from(row: ErrorEntryRow) -> Self {
        ErrorEntry {
            id: row.id,
            session_id: row.session_id,
            message: row.message,
            stack: row.stack,
            created_at: row.created_at,
        }
    }
}
