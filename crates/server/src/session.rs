//! Live fan-out sessions
//!
//! One session per connected client. Both transports (SSE and WebSocket)
//! drive the same frame stream: `ready` first, then every notification the
//! bridge attributes to the thread, with `keepalive` frames on a fixed
//! interval. When the bridge had to drop notifications for this session a
//! `lagged` frame precedes the next delivered one.
//!
//! The bridge subscription is owned by the stream; dropping the stream
//! releases it.

use std::collections::VecDeque;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use futures::stream::{self, Stream};
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::debug;

use threadline_connectors::ThreadSubscription;
use threadline_protocol::StreamFrame;

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

struct FrameState {
    sub: ThreadSubscription,
    keepalive: Interval,
    pending: VecDeque<StreamFrame>,
}

impl FrameState {
    async fn next_frame(&mut self) -> Option<StreamFrame> {
        if let Some(frame) = self.pending.pop_front() {
            return Some(frame);
        }

        tokio::select! {
            notification = self.sub.recv() => {
                let notification = notification?;
                let skipped = self.sub.take_dropped();
                if skipped > 0 {
                    debug!(
                        component = "session",
                        event = "session.lagged",
                        thread_id = %self.sub.thread_id(),
                        skipped,
                        "Session dropped notifications"
                    );
                    self.pending.push_back(StreamFrame::from(notification));
                    Some(StreamFrame::Lagged { skipped })
                } else {
                    Some(StreamFrame::from(notification))
                }
            }
            _ = self.keepalive.tick() => Some(StreamFrame::Keepalive { at: now_ms() }),
        }
    }
}

/// Frame stream for one session. Ends only if the bridge itself goes away.
pub fn frames(sub: ThreadSubscription, keepalive: Duration) -> impl Stream<Item = StreamFrame> + Send {
    let keepalive = keepalive.max(Duration::from_millis(10));
    let mut timer = interval_at(Instant::now() + keepalive, keepalive);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let ready = StreamFrame::Ready {
        thread_id: sub.thread_id().to_string(),
    };
    let state = FrameState {
        sub,
        keepalive: timer,
        pending: VecDeque::from([ready]),
    };

    stream::unfold(state, |mut state| async move {
        let frame = state.next_frame().await?;
        Some((frame, state))
    })
}
