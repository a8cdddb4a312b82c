//! Cross-module tests that don't need a live Postgres or upstream LLM.
//!
//! Anything that needs a real database is left to manual/CI testing
//! against `DATABASE_URL` — these tests exercise the pieces reachable
//! purely through the `research` library crate: model shapes, the
//! cache, rate limiting, and the streaming wire format.

mod stream_event_tests {
    use research::models::events::{CompletePayload, ErrorPayload, PhasePayload, TokenUsage};
    use research::models::{Citation, StreamEvent};

    #[test]
    fn phase_events_are_not_terminal() {
        let event = StreamEvent::Phase(PhasePayload {
            phase: "query_analysis".into(),
            progress: 10,
            message: "analyzing".into(),
            data: None,
            timestamp: 0,
        });
        assert_eq!(event.event_name(), "phase");
        assert!(!event.is_terminal());
    }

    #[test]
    fn complete_and_error_events_are_terminal() {
        let complete = StreamEvent::Complete(CompletePayload {
            session_id: uuid::Uuid::new_v4(),
            report: "done".into(),
            citations: vec![Citation {
                id: 1,
                title: "t".into(),
                url: "https://example.com".into(),
                relevance: 0.9,
            }],
            tokens: TokenUsage {
                input: 10,
                output: 20,
                total: 30,
            },
            latency_ms: 500,
        });
        assert_eq!(complete.event_name(), "complete");
        assert!(complete.is_terminal());

        let error = StreamEvent::Error(ErrorPayload {
            message: "boom".into(),
        });
        assert_eq!(error.event_name(), "error");
        assert!(error.is_terminal());
    }

    #[test]
    fn data_json_excludes_the_internal_type_discriminator() {
        let event = StreamEvent::Phase(PhasePayload {
            phase: "source_discovery".into(),
            progress: 25,
            message: "searching".into(),
            data: Some(serde_json::json!({"sourcesFound": 3})),
            timestamp: 1234,
        });
        let data = event.data_json();
        assert!(data.get("type").is_none());
        assert_eq!(data["phase"], "source_discovery");
        assert_eq!(data["data"]["sourcesFound"], 3);
    }
}

mod citation_tests {
    use research::models::report::number_citations;

    #[test]
    fn citations_are_numbered_consecutively_from_one() {
        let sources = vec![
            ("Title A".to_string(), "https://a".to_string(), 0.9),
            ("Title B".to_string(), "https://b".to_string(), 0.7),
            ("Title C".to_string(), "https://c".to_string(), 0.5),
        ];
        let citations = number_citations(&sources);
        let ids: Vec<u32> = citations.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(citations[1].title, "Title B");
        assert_eq!(citations[2].relevance, 0.5);
    }

    #[test]
    fn empty_source_list_yields_no_citations() {
        let citations = number_citations(&[]);
        assert!(citations.is_empty());
    }
}

mod mode_status_tests {
    use research::models::{Mode, Status};
    use std::str::FromStr;

    #[test]
    fn mode_round_trips_through_its_string_form() {
        for mode in [Mode::Quick, Mode::Standard, Mode::Deep] {
            let parsed = Mode::from_str(mode.as_str()).unwrap();
            assert_eq!(parsed.as_str(), mode.as_str());
        }
    }

    #[test]
    fn unknown_mode_string_is_rejected() {
        assert!(Mode::from_str("thorough").is_err());
    }

    #[test]
    fn status_round_trips_through_its_string_form() {
        for status in [Status::Pending, Status::Running, Status::Completed, Status::Failed] {
            let parsed = Status::from_str(status.as_str()).unwrap();
            assert_eq!(parsed.as_str(), status.as_str());
        }
    }
}

mod cache_tests {
    use research::cache::{fingerprint, ttl_for_mode, ResultCache};
    use research::models::Mode;
    use std::time::Duration;

    #[test]
    fn ttl_increases_with_research_depth() {
        assert!(ttl_for_mode(Mode::Quick) < ttl_for_mode(Mode::Standard));
        assert!(ttl_for_mode(Mode::Standard) < ttl_for_mode(Mode::Deep));
    }

    #[test]
    fn same_query_different_mode_is_a_cache_miss() {
        let cache = ResultCache::new();
        let quick_key = fingerprint("rust ownership", Mode::Quick);
        let deep_key = fingerprint("rust ownership", Mode::Deep);

        cache.set(&quick_key, &serde_json::json!({"report": "quick answer"}), Duration::from_secs(60));

        let hit: Option<serde_json::Value> = cache.get(&quick_key);
        let miss: Option<serde_json::Value> = cache.get(&deep_key);
        assert!(hit.is_some());
        assert!(miss.is_none());
    }
}

mod rate_limit_tests {
    use research::middleware::rate_limit::RateLimiter;
    use std::time::Duration;

    /// Mirrors `AppState`'s two independently-configured limiters: a
    /// client exhausting the research bucket must still be admitted
    /// into the history bucket.
    #[test]
    fn research_and_history_limiters_are_independent() {
        let research_limiter = RateLimiter::new(1, Duration::from_secs(60));
        let history_limiter = RateLimiter::new(20, Duration::from_secs(60));

        let client = "203.0.113.5";
        assert!(research_limiter.check(client).is_ok());
        assert!(research_limiter.check(client).is_err());
        assert!(history_limiter.check(client).is_ok());
    }
}

mod search_tests {
    use research::search::{dedupe_by_url, SourceResult};

    fn source(url: &str, score: f64) -> SourceResult {
        SourceResult {
            title: format!("title for {url}"),
            url: url.to_string(),
            snippet: "snippet".into(),
            score,
        }
    }

    #[test]
    fn dedupe_across_multiple_query_result_sets_keeps_first_score() {
        // Simulates merging `search_many`'s per-query result vectors
        // before citation_linking runs.
        let first_query_results = vec![source("https://a", 0.9), source("https://b", 0.6)];
        let second_query_results = vec![source("https://b", 0.3), source("https://c", 0.4)];

        let merged: Vec<SourceResult> = first_query_results
            .into_iter()
            .chain(second_query_results)
            .collect();
        let deduped = dedupe_by_url(merged);

        assert_eq!(deduped.len(), 3);
        let b = deduped.iter().find(|s| s.url == "https://b").unwrap();
        assert_eq!(b.score, 0.6, "first occurrence of a duplicate URL must win");
    }
}

mod run_result_tests {
    use research::models::events::TokenUsage;
    use research::models::Mode;
    use research::orchestrator::RunResult;

    #[test]
    fn run_result_serializes_with_camel_case_compatible_fields() {
        let result = RunResult {
            session_id: uuid::Uuid::new_v4(),
            mode: Mode::Standard,
            report: "a short report".into(),
            citations: vec![],
            tokens: TokenUsage {
                input: 100,
                output: 200,
                total: 300,
            },
            latency_ms: 1500,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["mode"], "standard");
        assert_eq!(json["tokens"]["total"], 300);

        let back: RunResult = serde_json::from_value(json).unwrap();
        assert_eq!(back.session_id, result.session_id);
        assert_eq!(back.latency_ms, 1500);
    }
}
