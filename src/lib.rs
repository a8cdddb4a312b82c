//! Deep research orchestration service — library crate.
//!
//! Re-exports the modules integration tests need directly. `api` is not
//! re-exported here: its handlers take `AppState`, which is only defined
//! in the `deep-research-service` binary.

pub mod cache;
pub mod config;
pub mod errors;
pub mod jobs;
pub mod llm;
pub mod middleware;
pub mod models;
pub mod orchestrator;
pub mod prompts;
pub mod search;
pub mod store;
