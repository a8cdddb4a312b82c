use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Orchestration strategy for a research session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Quick,
    Standard,
    Deep,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Quick => "quick",
            Mode::Standard => "standard",
            Mode::Deep => "deep",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "quick" => Ok(Mode::Quick),
            "standard" => Ok(Mode::Standard),
            "deep" => Ok(Mode::Deep),
            other => anyhow::bail!("unknown mode: {other}"),
        }
    }
}

/// Lifecycle state of a research session. Transitions monotonically
/// `pending -> running -> (completed|failed)`; terminal states are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Pending,
    Running,
    Completed,
    Failed,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::Running => "running",
            Status::Completed => "completed",
            Status::Failed => "failed",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Status::Pending),
            "running" => Ok(Status::Running),
            "completed" => Ok(Status::Completed),
            "failed" => Ok(Status::Failed),
            other => anyhow::bail!("unknown status: {other}"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub query: String,
    pub mode: Mode,
    pub status: Status,
    pub total_latency_ms: Option<i64>,
    pub total_tokens: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Raw row shape as it comes back from Postgres. `mode`/`status` are
/// plain text columns; `TryFrom` below does the one validating hop into
/// the domain enums so a corrupt row fails loudly instead of silently.
#[derive(Debug, sqlx::FromRow)]
pub struct SessionRow {
    pub id: Uuid,
    pub query: String,
    pub mode: String,
    pub status: String,
    pub total_latency_ms: Option<i64>,
    pub total_tokens: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<SessionRow> for Session {
    type Error = anyhow::Error;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        Ok(Session {
            id: row.id,
            query: row.query,
            mode: row.mode.parse()?,
            status: row.status.parse()?,
            total_latency_ms: row.total_latency_ms,
            total_tokens: row.total_tokens,
            created_at: row.created_at,
        })
    }
}
