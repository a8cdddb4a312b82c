use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single citation entry referenced from a report. `id` values are
/// consecutive starting at 1 within a report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Citation {
    pub id: u32,
    pub title: String,
    pub url: String,
    pub relevance: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub id: i64,
    pub session_id: Uuid,
    pub content: String,
    pub citations: Vec<Citation>,
}

#[derive(Debug, sqlx::FromRow)]
pub struct ReportRow {
    pub id: i64,
    pub session_id: Uuid,
    pub content: String,
    pub citations: serde_json::Value,
}

impl TryFrom<ReportRow> for Report {
    type Error = serde_json::Error;

    fn try_from(row: ReportRow) -> Result<Self, Self::Error> {
        Ok(Report {
            id: row.id,
            session_id: row.session_id,
            content: row.content,
            citations: serde_json::from_value(row.citations)?,
        })
    }
}

/// Renumber an ordered list of `(title, url, relevance)` sources into a
/// citation sequence with consecutive ids starting at 1.
pub fn number_citations(sources: &[(String, String, f64)]) -> Vec<Citation> {
    sources
        .iter()
        .enumerate()
        .map(|(i, (title, url, relevance))| Citation {
            id: (i + 1) as u32,
            title: title.clone(),
            url: url.clone(),
            relevance: *relevance,
        })
        .collect()
}
