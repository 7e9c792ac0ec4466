//! Server-Sent Events transport for live thread sessions

use std::convert::Infallible;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    response::sse::{Event, Sse},
};
use futures::{Stream, StreamExt};
use tracing::{error, info};

use crate::session::frames;
use crate::state::AppState;

static NEXT_STREAM_ID: AtomicU64 = AtomicU64::new(1);

/// Logs the close when the response body is dropped.
struct StreamGuard {
    stream_id: u64,
    thread_id: String,
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        info!(
            component = "sse",
            event = "sse.stream.closed",
            stream_id = self.stream_id,
            thread_id = %self.thread_id,
            "SSE stream closed"
        );
    }
}

/// `GET /threads/{id}/stream`
pub async fn sse_handler(
    State(state): State<Arc<AppState>>,
    Path(thread_id): Path<String>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream_id = NEXT_STREAM_ID.fetch_add(1, Ordering::Relaxed);
    info!(
        component = "sse",
        event = "sse.stream.opened",
        stream_id,
        thread_id = %thread_id,
        "SSE stream opened"
    );

    let guard = StreamGuard {
        stream_id,
        thread_id: thread_id.clone(),
    };
    let subscription = state.bridge.subscribe_thread(&thread_id);
    let stream = frames(subscription, state.keepalive).map(move |frame| {
        let _held = &guard;
        let data = match serde_json::to_string(&frame) {
            Ok(json) => json,
            Err(e) => {
                error!(
                    component = "sse",
                    event = "sse.send.serialize_failed",
                    stream_id,
                    error = %e,
                    "Failed to serialize frame"
                );
                "{}".to_string()
            }
        };
        Ok(Event::default().event(frame.event_name()).data(data))
    });

    Sse::new(stream)
}
