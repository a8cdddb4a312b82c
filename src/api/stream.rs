//! Deep-mode SSE streaming. A running session's progress events are
//! multiplexed onto a `text/event-stream` response until a terminal
//! event; an already-completed session gets a single JSON payload
//! instead of a stream, per the protocol's framing rule.

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;

use crate::models::StreamEvent;
use crate::orchestrator::Orchestrator;

/// Cancels the orchestrator's in-flight job for this session when
/// dropped without having observed a terminal event — i.e. the client
/// closed the connection mid-stream.
struct CancelOnDrop {
    orchestrator: Orchestrator,
    session_id: uuid::Uuid,
    terminal_seen: bool,
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if !self.terminal_seen {
            self.orchestrator.cancel(self.session_id);
        }
    }
}

/// `backlog` is every event the orchestrator had already emitted before
/// this client subscribed — replayed first so a client connecting after
/// the pipeline is already underway still sees phase progress from the
/// start, then followed by whatever `rx` delivers live.
pub fn sse_stream(
    orchestrator: Orchestrator,
    session_id: uuid::Uuid,
    backlog: Vec<StreamEvent>,
    mut rx: tokio::sync::broadcast::Receiver<StreamEvent>,
) -> impl Stream<Item = Result<Event, std::convert::Infallible>> {
    async_stream::stream! {
        let mut guard = CancelOnDrop {
            orchestrator,
            session_id,
            terminal_seen: false,
        };

        for event in backlog {
            let is_terminal = event.is_terminal();
            let data = serde_json::to_string(&event.data_json()).unwrap_or_default();
            yield Ok(Event::default().event(event.event_name()).data(data));
            if is_terminal {
                guard.terminal_seen = true;
                return;
            }
        }

        loop {
            match rx.recv().await {
                Ok(event) => {
                    let is_terminal = event.is_terminal();
                    let data = serde_json::to_string(&event.data_json()).unwrap_or_default();
                    yield Ok(Event::default().event(event.event_name()).data(data));
                    if is_terminal {
                        guard.terminal_seen = true;
                        break;
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    }
}

pub fn sse_response(
    orchestrator: Orchestrator,
    session_id: uuid::Uuid,
    backlog: Vec<StreamEvent>,
    rx: tokio::sync::broadcast::Receiver<StreamEvent>,
) -> Sse<impl Stream<Item = Result<Event, std::convert::Infallible>>> {
    Sse::new(sse_stream(orchestrator, session_id, backlog, rx))
        .keep_alive(KeepAlive::default().text("keep-alive"))
}
