//! Persistence adapter: typed reads/writes against the sessions /
//! phases / reports / error_logs schema. Every operation here is
//! parameterized — never a concatenated string — and anything that
//! takes longer than 1s is logged at warn level with the operation name.

use serde_json::Value as JsonValue;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::models::{
    phase::PhaseRow, report::ReportRow, session::SessionRow, Citation, Phase, Report, Session,
};

const SLOW_QUERY_THRESHOLD: Duration = Duration::from_millis(1000);

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

/// Session plus its at-most-one report and its phases, as returned by
/// `GET /research/:id`.
pub struct SessionDetail {
    pub session: Session,
    pub report: Option<Report>,
    pub phases: Vec<Phase>,
}

pub struct HistoryPage {
    pub items: Vec<Session>,
    pub total: i64,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .idle_timeout(Duration::from_secs(30))
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run pending migrations from the migrations/ directory. Idempotent.
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    fn log_if_slow(op: &str, started: Instant) {
        let elapsed = started.elapsed();
        if elapsed >= SLOW_QUERY_THRESHOLD {
            tracing::warn!(op, elapsed_ms = elapsed.as_millis() as u64, "slow persistence operation");
        }
    }

    /// Create a session in `running` status. Returns the new id.
    pub async fn create_session(&self, query: &str, mode: &str) -> anyhow::Result<Uuid> {
        let started = Instant::now();
        let id = sqlx::query_scalar::<_, Uuid>(
            "INSERT INTO sessions (query, mode, status) VALUES ($1, $2, 'running') RETURNING id",
        )
        .bind(query)
        .bind(mode)
        .fetch_one(&self.pool)
        .await?;
        Self::log_if_slow("create_session", started);
        Ok(id)
    }

    pub async fn append_phase(
        &self,
        session_id: Uuid,
        name: &str,
        duration_ms: i64,
        tokens_used: i64,
        metadata: JsonValue,
    ) -> anyhow::Result<()> {
        let started = Instant::now();
        sqlx::query(
            "INSERT INTO phases (session_id, name, duration_ms, tokens_used, metadata) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(session_id)
        .bind(name)
        .bind(duration_ms)
        .bind(tokens_used)
        .bind(metadata)
        .execute(&self.pool)
        .await?;
        Self::log_if_slow("append_phase", started);
        Ok(())
    }

    /// Idempotent per session: a second call for the same session is a
    /// caller bug, but the schema does not enforce it — callers write the
    /// report exactly once, on successful completion.
    pub async fn write_report(
        &self,
        session_id: Uuid,
        content: &str,
        citations: &[Citation],
    ) -> anyhow::Result<()> {
        let started = Instant::now();
        let citations_json = serde_json::to_value(citations)?;
        sqlx::query("INSERT INTO reports (session_id, content, citations) VALUES ($1, $2, $3)")
            .bind(session_id)
            .bind(content)
            .bind(citations_json)
            .execute(&self.pool)
            .await?;
        Self::log_if_slow("write_report", started);
        Ok(())
    }

    pub async fn complete_session(
        &self,
        session_id: Uuid,
        total_latency_ms: i64,
        total_tokens: i64,
    ) -> anyhow::Result<()> {
        let started = Instant::now();
        sqlx::query(
            "UPDATE sessions SET status = 'completed', total_latency_ms = $2, total_tokens = $3 \
             WHERE id = $1",
        )
        .bind(session_id)
        .bind(total_latency_ms)
        .bind(total_tokens)
        .execute(&self.pool)
        .await?;
        Self::log_if_slow("complete_session", started);
        Ok(())
    }

    pub async fn fail_session(&self, session_id: Uuid) -> anyhow::Result<()> {
        let started = Instant::now();
        sqlx::query("UPDATE sessions SET status = 'failed' WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Self::log_if_slow("fail_session", started);
        Ok(())
    }

    pub async fn get_session(&self, session_id: Uuid) -> anyhow::Result<Option<Session>> {
        let started = Instant::now();
        let row = sqlx::query_as::<_, SessionRow>(
            "SELECT id, query, mode, status, total_latency_ms, total_tokens, created_at \
             FROM sessions WHERE id = $1",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;
        Self::log_if_slow("get_session", started);
        row.map(Session::try_from).transpose()
    }

    pub async fn get_session_with_report(
        &self,
        session_id: Uuid,
    ) -> anyhow::Result<Option<SessionDetail>> {
        let Some(session) = self.get_session(session_id).await? else {
            return Ok(None);
        };

        let started = Instant::now();
        let report_row = sqlx::query_as::<_, ReportRow>(
            "SELECT id, session_id, content, citations FROM reports WHERE session_id = $1",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;
        Self::log_if_slow("get_report", started);
        let report = report_row.map(Report::try_from).transpose()?;

        let phases = self.list_phases(session_id).await?;

        Ok(Some(SessionDetail {
            session,
            report,
            phases,
        }))
    }

    /// Insertion order, per session.
    pub async fn list_phases(&self, session_id: Uuid) -> anyhow::Result<Vec<Phase>> {
        let started = Instant::now();
        let rows = sqlx::query_as::<_, PhaseRow>(
            "SELECT id, session_id, name, duration_ms, tokens_used, metadata \
             FROM phases WHERE session_id = $1 ORDER BY id ASC",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;
        Self::log_if_slow("list_phases", started);
        Ok(rows.into_iter().map(Phase::from).collect())
    }

    /// Newest-first, per the history endpoint's paging contract.
    pub async fn list_history(&self, limit: i64, offset: i64) -> anyhow::Result<HistoryPage> {
        let started = Instant::now();
        let rows = sqlx::query_as::<_, SessionRow>(
            "SELECT id, query, mode, status, total_latency_ms, total_tokens, created_at \
             FROM sessions ORDER BY created_at DESC LIMIT $1 OFFSET $2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Self::log_if_slow("list_history", started);

        let items = rows
            .into_iter()
            .map(Session::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        let total = self.count_history().await?;
        Ok(HistoryPage { items, total })
    }

    pub async fn count_history(&self) -> anyhow::Result<i64> {
        let started = Instant::now();
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM sessions")
            .fetch_one(&self.pool)
            .await?;
        Self::log_if_slow("count_history", started);
        Ok(total)
    }

    /// Cascades to phases and reports; error_logs referencing this
    /// session have their session_id set to null rather than deleted.
    pub async fn delete_session(&self, session_id: Uuid) -> anyhow::Result<bool> {
        let started = Instant::now();
        let result = sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Self::log_if_slow("delete_session", started);
        Ok(result.rows_affected() > 0)
    }

    /// Best-effort; swallow persistence failures rather than propagate
    /// them out of an already-failing path.
    pub async fn log_error(&self, session_id: Option<Uuid>, message: &str, stack: Option<&str>) {
        let started = Instant::now();
        let result = sqlx::query("INSERT INTO error_logs (session_id, message, stack) VALUES ($1, $2, $3)")
            .bind(session_id)
            .bind(message)
            .bind(stack)
            .execute(&self.pool)
            .await;
        Self::log_if_slow("log_error", started);
        if let Err(err) = result {
            tracing::error!(error = %err, "failed to persist error log entry");
        }
    }
}

