//! Admission-layer input validation: research queries, paging params,
//! and path UUIDs. Each check short-circuits before any work is done.

use crate::errors::AppError;

const XSS_MARKERS: &[&str] = &["<script", "javascript:"];

/// `query` must be present, trimmed length in [3, 2000], and must not
/// match a small set of obvious script-injection markers.
pub fn validate_query(query: &str) -> Result<String, AppError> {
    let trimmed = query.trim();
    let len = trimmed.chars().count();
    if len < 3 || len > 2000 {
        return Err(AppError::Validation(format!(
            "query must be between 3 and 2000 characters after trimming, got {len}"
        )));
    }

    let lower = trimmed.to_lowercase();
    if XSS_MARKERS.iter().any(|marker| lower.contains(marker)) || contains_event_handler(&lower) {
        return Err(AppError::Validation("query contains disallowed content".into()));
    }

    Ok(trimmed.to_string())
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Matches the `on\w+=` pattern (e.g. `onerror=`, `onclick=`) without
/// pulling in a regex dependency for a single shape.
fn contains_event_handler(lower: &str) -> bool {
    let bytes = lower.as_bytes();
    let mut search_from = 0;
    while let Some(pos) = lower[search_from..].find("on") {
        let start = search_from + pos;
        let mut j = start + 2;
        let mut saw_word_char = false;
        while j < bytes.len() && is_word_byte(bytes[j]) {
            saw_word_char = true;
            j += 1;
        }
        if saw_word_char && bytes.get(j) == Some(&b'=') {
            return true;
        }
        search_from = start + 2;
        if search_from >= bytes.len() {
            break;
        }
    }
    false
}

/// Canonical 8-4-4-4-12 hex UUID form.
pub fn validate_uuid(raw: &str) -> Result<uuid::Uuid, AppError> {
    uuid::Uuid::parse_str(raw).map_err(|_| AppError::Validation("invalid id".into()))
}

/// `limit ∈ [1,100]` default 50; `offset ≥ 0` default 0.
pub fn clamp_paging(limit: Option<i64>, offset: Option<i64>) -> (i64, i64) {
    let limit = limit.unwrap_or(50).clamp(1, 100);
    let offset = offset.unwrap_or(0).max(0);
    (limit, offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_query_at_boundaries() {
        assert!(validate_query("abc").is_ok());
        assert!(validate_query(&"a".repeat(2000)).is_ok());
    }

    #[test]
    fn rejects_too_short_or_too_long() {
        assert!(validate_query("ab").is_err());
        assert!(validate_query(&"a".repeat(2001)).is_err());
    }

    #[test]
    fn rejects_script_tag() {
        assert!(validate_query("<script>alert(1)</script>abc").is_err());
    }

    #[test]
    fn rejects_javascript_uri() {
        assert!(validate_query("javascript:alert(1) is bad").is_err());
    }

    #[test]
    fn rejects_event_handler() {
        assert!(validate_query("img onerror=alert(1) trigger").is_err());
    }

    #[test]
    fn paging_clamps_to_bounds() {
        assert_eq!(clamp_paging(Some(0), Some(-5)), (1, 0));
        assert_eq!(clamp_paging(Some(500), None), (100, 0));
        assert_eq!(clamp_paging(None, None), (50, 0));
    }
}
