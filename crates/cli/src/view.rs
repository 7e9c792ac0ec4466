//! Live thread view.
//!
//! One task owns the reconciler, so every merge (initial load, re-sync,
//! live notification) is serialized. While the stream is not connected the
//! view re-fetches snapshot and log every few seconds and swaps the
//! transcript only when it changed.

use std::time::Duration;

use console::Term;
use futures::StreamExt;
use serde_json::Value;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::{debug, info, warn};

use threadline_protocol::{StreamFrame, ThreadEvent};
use threadline_transcript::{Applied, Reconciler};

use crate::api::{ApiClient, ClientError};
use crate::connection::Connection;
use crate::render::{render_transcript, RenderOptions};
use crate::stream::{open_stream, FrameStream};

pub const RESYNC_INTERVAL: Duration = Duration::from_millis(2500);
/// No frame (not even a keepalive) for this long means the stream is dead.
pub const STALE_AFTER: Duration = Duration::from_secs(45);
pub const LOG_FETCH_LIMIT: usize = 5000;

enum StreamEnd {
    Dropped(ClientError),
    Stale,
    Interrupted,
}

pub struct ThreadView {
    thread_id: String,
    client: ApiClient,
    reconciler: Reconciler,
    connection: Connection,
    options: RenderOptions,
    term: Term,
    loaded: bool,
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

impl ThreadView {
    pub fn new(thread_id: String, client: ApiClient, options: RenderOptions) -> Self {
        Self {
            thread_id,
            client,
            reconciler: Reconciler::new(),
            connection: Connection::default(),
            options,
            term: Term::stdout(),
            loaded: false,
        }
    }

    async fn fetch(&self) -> Result<(Value, Vec<ThreadEvent>), ClientError> {
        let (snapshot, events) = tokio::join!(
            self.client.snapshot(&self.thread_id),
            self.client.events(&self.thread_id, LOG_FETCH_LIMIT)
        );
        let events = match events {
            Ok(events) => events,
            Err(ClientError::Unauthorized) => return Err(ClientError::Unauthorized),
            // Log is best effort; the snapshot alone still renders.
            Err(e) => {
                warn!(
                    component = "view",
                    event = "view.events.fetch_failed",
                    thread_id = %self.thread_id,
                    error = %e,
                    "Event log fetch failed"
                );
                Vec::new()
            }
        };
        Ok((snapshot?, events))
    }

    /// Re-fetch and re-merge. Only auth failures propagate.
    async fn resync(&mut self) -> Result<(), ClientError> {
        match self.fetch().await {
            Ok((snapshot, events)) => {
                let changed = if self.loaded {
                    self.reconciler.resync(&snapshot, &events)
                } else {
                    self.reconciler.load(&snapshot, &events);
                    self.loaded = true;
                    true
                };
                if changed {
                    self.redraw();
                }
                Ok(())
            }
            Err(ClientError::Unauthorized) => Err(ClientError::Unauthorized),
            Err(e) => {
                debug!(
                    component = "view",
                    event = "view.resync.failed",
                    thread_id = %self.thread_id,
                    error = %e,
                    "Re-sync failed"
                );
                Ok(())
            }
        }
    }

    fn redraw(&self) {
        let text = render_transcript(
            &self.reconciler.entries(),
            self.reconciler.is_thinking(),
            self.options,
        );
        let _ = self.term.clear_screen();
        let _ = self.term.write_line(&text);
    }

    async fn handle_frame(&mut self, frame: StreamFrame) -> Result<(), ClientError> {
        match frame {
            // Anything between our last fetch and the subscription is only
            // in the snapshot and log.
            StreamFrame::Ready { .. } | StreamFrame::Lagged { .. } => self.resync().await?,
            StreamFrame::Notification { method, params } => {
                let notification = threadline_protocol::Notification { method, params };
                if matches!(self.reconciler.apply(&notification, now_ms()), Applied::Changed) {
                    self.redraw();
                }
            }
            StreamFrame::Keepalive { .. } => {}
        }
        Ok(())
    }

    async fn pump(&mut self, mut frames: FrameStream) -> Result<StreamEnd, ClientError> {
        loop {
            tokio::select! {
                next = tokio::time::timeout(STALE_AFTER, frames.next()) => match next {
                    Ok(Some(Ok(frame))) => self.handle_frame(frame).await?,
                    Ok(Some(Err(e))) => return Ok(StreamEnd::Dropped(e)),
                    Ok(None) => return Ok(StreamEnd::Dropped(ClientError::Stream("stream ended".into()))),
                    Err(_) => return Ok(StreamEnd::Stale),
                },
                _ = tokio::signal::ctrl_c() => return Ok(StreamEnd::Interrupted),
            }
        }
    }

    /// Periodic re-sync, only while the live stream is not healthy. Returns
    /// whether a re-sync ran.
    async fn poll_tick(&mut self) -> Result<bool, ClientError> {
        if self.connection.is_healthy() {
            return Ok(false);
        }
        self.resync().await?;
        Ok(true)
    }

    /// Wait out a reconnect delay, re-syncing on a fixed cadence meanwhile.
    /// Returns false if interrupted.
    async fn wait_unhealthy(&mut self, delay: Duration) -> Result<bool, ClientError> {
        let deadline = sleep(delay);
        tokio::pin!(deadline);
        let mut ticker = interval(RESYNC_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = &mut deadline => return Ok(true),
                _ = ticker.tick() => {
                    self.poll_tick().await?;
                }
                _ = tokio::signal::ctrl_c() => return Ok(false),
            }
        }
    }

    pub async fn run(mut self) -> Result<(), ClientError> {
        self.resync().await?;

        loop {
            self.connection.connecting();
            match open_stream(&self.client, &self.thread_id).await {
                Ok((transport, frames)) => {
                    self.connection.connected();
                    info!(
                        component = "view",
                        event = "view.stream.connected",
                        thread_id = %self.thread_id,
                        transport = %transport,
                        "Live stream connected"
                    );
                    match self.pump(frames).await? {
                        StreamEnd::Interrupted => break,
                        StreamEnd::Stale => warn!(
                            component = "view",
                            event = "view.stream.stale",
                            thread_id = %self.thread_id,
                            "Live stream went quiet, reconnecting"
                        ),
                        StreamEnd::Dropped(e) => warn!(
                            component = "view",
                            event = "view.stream.dropped",
                            thread_id = %self.thread_id,
                            error = %e,
                            "Live stream dropped"
                        ),
                    }
                }
                Err(ClientError::Unauthorized) => return Err(ClientError::Unauthorized),
                Err(e) => debug!(
                    component = "view",
                    event = "view.stream.connect_failed",
                    thread_id = %self.thread_id,
                    error = %e,
                    "Live stream connect failed"
                ),
            }

            let delay = self.connection.failed();
            debug!(
                component = "view",
                event = "view.stream.backoff",
                thread_id = %self.thread_id,
                state = ?self.connection.state(),
                "Waiting before reconnect"
            );
            if !self.wait_unhealthy(delay).await? {
                break;
            }
        }

        self.connection.disconnect();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use threadline_protocol::{EntryKind, Role};

    fn offline_view() -> ThreadView {
        ThreadView::new(
            "t1".into(),
            ApiClient::new("http://127.0.0.1:1", None),
            RenderOptions::default(),
        )
    }

    fn frame(method: &str, params: Value) -> StreamFrame {
        StreamFrame::Notification {
            method: method.into(),
            params,
        }
    }

    #[tokio::test]
    async fn live_deltas_commit_on_turn_end() {
        let mut view = offline_view();
        let frames = [
            frame("turn/started", json!({"threadId": "t1", "turn": {"id": "u1"}})),
            frame("item/agentMessage/delta", json!({"threadId": "t1", "turnId": "u1", "delta": "do"})),
            frame("item/agentMessage/delta", json!({"threadId": "t1", "turnId": "u1", "delta": "ne"})),
            frame("turn/completed", json!({"threadId": "t1", "turn": {"id": "u1"}})),
        ];
        for f in frames {
            view.handle_frame(f).await.unwrap();
        }

        let entries = view.reconciler.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, EntryKind::Message);
        assert_eq!(entries[0].role, Role::Assistant);
        assert_eq!(entries[0].text, "done");
        assert!(!entries[0].streaming);
        assert!(!view.reconciler.is_thinking());
    }

    #[tokio::test]
    async fn polling_runs_only_while_unhealthy() {
        let mut view = offline_view();
        view.connection.connecting();
        view.connection.connected();
        assert!(!view.poll_tick().await.unwrap());

        view.connection.failed();
        assert!(view.poll_tick().await.unwrap());
    }

    #[tokio::test]
    async fn failed_resync_keeps_view_alive() {
        let mut view = offline_view();
        view.handle_frame(StreamFrame::Lagged { skipped: 2 }).await.unwrap();
        view.handle_frame(StreamFrame::Keepalive { at: 0 }).await.unwrap();
        assert!(view.reconciler.entries().is_empty());
    }
}
