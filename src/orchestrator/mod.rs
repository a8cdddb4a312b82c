//! Orchestrator: owns session state transitions exclusively. The HTTP
//! surface only ever reads session state or asks the orchestrator to
//! start a run or cancel one in flight — it never writes to a session
//! directly.

mod deep;
mod quick;
mod standard;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::cache::{self, ResultCache};
use crate::llm::LlmAdapter;
use crate::models::{Citation, Mode, StreamEvent};
use crate::search::SearchAdapter;
use crate::store::postgres::PgStore;

/// The payload a completed quick/standard/deep run produces, cached
/// under (query, mode) and returned synchronously or via the `complete`
/// stream event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub session_id: Uuid,
    pub mode: Mode,
    pub report: String,
    pub citations: Vec<Citation>,
    pub tokens: crate::models::events::TokenUsage,
    pub latency_ms: i64,
}

pub enum StartOutcome {
    /// Cache hit: no session was created.
    CacheHit(RunResult),
    /// Quick/standard ran to completion synchronously.
    Completed(RunResult),
    /// Deep mode was kicked off in the background; the caller streams
    /// progress via `subscribe`.
    DeepStarted { session_id: Uuid },
}

/// Fans out deep-mode progress to a `broadcast` channel while retaining
/// every event emitted so far. A stream subscriber may arrive long after
/// the pipeline started (it's a separate `GET .../stream` request) — a
/// bare `broadcast::Receiver` would silently miss everything sent before
/// `subscribe()` was called, so `subscribe` replays the backlog first
/// and then hands back a receiver for what comes next.
#[derive(Clone)]
struct EventSink {
    tx: broadcast::Sender<StreamEvent>,
    log: Arc<Mutex<Vec<StreamEvent>>>,
}

impl EventSink {
    fn new() -> Self {
        let (tx, _rx) = broadcast::channel(64);
        Self {
            tx,
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Append then broadcast under a single lock, so a concurrent
    /// `subscribe` can't observe the event in neither or both places.
    fn emit(&self, event: StreamEvent) {
        let mut log = self.log.lock().expect("event log mutex poisoned");
        log.push(event.clone());
        let _ = self.tx.send(event);
    }

    /// A snapshot of every event emitted so far, plus a receiver that
    /// picks up everything emitted from this point on.
    fn subscribe(&self) -> (Vec<StreamEvent>, broadcast::Receiver<StreamEvent>) {
        let log = self.log.lock().expect("event log mutex poisoned");
        (log.clone(), self.tx.subscribe())
    }
}

struct Job {
    events: EventSink,
    cancel: CancellationToken,
}

#[derive(Clone)]
pub struct Orchestrator {
    db: PgStore,
    cache: ResultCache,
    llm: LlmAdapter,
    search: SearchAdapter,
    jobs: Arc<DashMap<Uuid, Job>>,
}

impl Orchestrator {
    pub fn new(db: PgStore, cache: ResultCache, llm: LlmAdapter, search: SearchAdapter) -> Self {
        Self {
            db,
            cache,
            llm,
            search,
            jobs: Arc::new(DashMap::new()),
        }
    }

    pub async fn start(&self, query: String, mode: Mode) -> anyhow::Result<StartOutcome> {
        let fingerprint = cache::fingerprint(&query, mode);

        if let Some(cached) = self.cache.get::<RunResult>(&fingerprint) {
            return Ok(StartOutcome::CacheHit(cached));
        }

        match mode {
            Mode::Quick | Mode::Standard => {
                let session_id = self.db.create_session(&query, mode.as_str()).await?;
                let result = match mode {
                    Mode::Quick => quick::run(&self.db, &self.llm, session_id, &query).await,
                    Mode::Standard => {
                        standard::run(&self.db, &self.llm, &self.search, session_id, &query).await
                    }
                    Mode::Deep => unreachable!(),
                };

                match result {
                    Ok(run_result) => {
                        self.cache
                            .set(&fingerprint, &run_result, cache::ttl_for_mode(mode));
                        Ok(StartOutcome::Completed(run_result))
                    }
                    Err(err) => {
                        self.db.fail_session(session_id).await.ok();
                        self.db
                            .log_error(Some(session_id), &err.to_string(), None)
                            .await;
                        Err(err)
                    }
                }
            }
            Mode::Deep => {
                let session_id = self.db.create_session(&query, mode.as_str()).await?;
                let sink = EventSink::new();
                let cancel = CancellationToken::new();

                self.jobs.insert(
                    session_id,
                    Job {
                        events: sink.clone(),
                        cancel: cancel.clone(),
                    },
                );

                let db = self.db.clone();
                let llm = self.llm.clone();
                let search = self.search.clone();
                let cache = self.cache.clone();
                let jobs = self.jobs.clone();
                let query_owned = query.clone();

                tokio::spawn(async move {
                    let started = Instant::now();
                    let outcome =
                        deep::run(&db, &llm, &search, session_id, &query_owned, &sink, &cancel)
                            .await;

                    if cancel.is_cancelled() {
                        // Client disconnected mid-run: leave the session
                        // `running`, write nothing further. See Open
                        // Questions — this is the documented behavior,
                        // not a bug.
                        jobs.remove(&session_id);
                        return;
                    }

                    match outcome {
                        Ok(run_result) => {
                            cache.set(
                                &cache::fingerprint(&query_owned, Mode::Deep),
                                &run_result,
                                cache::ttl_for_mode(Mode::Deep),
                            );
                            sink.emit(StreamEvent::Complete(
                                crate::models::events::CompletePayload {
                                    session_id,
                                    report: run_result.report.clone(),
                                    citations: run_result.citations.clone(),
                                    tokens: run_result.tokens,
                                    latency_ms: started.elapsed().as_millis() as i64,
                                },
                            ));
                        }
                        Err(err) => {
                            db.fail_session(session_id).await.ok();
                            db.log_error(Some(session_id), &err.to_string(), None).await;
                            sink.emit(StreamEvent::Error(
                                crate::models::events::ErrorPayload {
                                    message: err.to_string(),
                                },
                            ));
                        }
                    }

                    jobs.remove(&session_id);
                });

                Ok(StartOutcome::DeepStarted { session_id })
            }
        }
    }

    /// Subscribe to a deep session's progress stream. `None` if the
    /// session isn't (or is no longer) running in this process. Returns
    /// every event already emitted (the client may connect well after
    /// the pipeline started) alongside a receiver for what comes next.
    pub fn subscribe(
        &self,
        session_id: Uuid,
    ) -> Option<(Vec<StreamEvent>, broadcast::Receiver<StreamEvent>)> {
        self.jobs.get(&session_id).map(|job| job.events.subscribe())
    }

    /// Mark an in-flight deep session cancelled. Subsequent progress
    /// emissions are dropped and outstanding LLM/search calls abort.
    pub fn cancel(&self, session_id: Uuid) {
        if let Some(job) = self.jobs.get(&session_id) {
            job.cancel.cancel();
        }
    }

    pub fn db(&self) -> &PgStore {
        &self.db
    }
}
