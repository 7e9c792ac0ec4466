//! Server → client frames on a live thread stream

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::Notification;

/// Frames pushed over the SSE and WebSocket thread streams.
///
/// Both transports carry the identical sequence: one `ready`, then
/// notifications verbatim, interleaved with `keepalive` frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamFrame {
    Ready {
        #[serde(rename = "threadId")]
        thread_id: String,
    },
    Notification {
        method: String,
        #[serde(default)]
        params: Value,
    },
    Keepalive {
        at: i64,
    },
    /// This session dropped `skipped` notifications; the client should re-sync.
    Lagged {
        skipped: u64,
    },
}

impl StreamFrame {
    /// SSE event name for this frame
    pub fn event_name(&self) -> &'static str {
        match self {
            StreamFrame::Ready { .. } => "ready",
            StreamFrame::Notification { .. } => "notification",
            StreamFrame::Keepalive { .. } => "keepalive",
            StreamFrame::Lagged { .. } => "lagged",
        }
    }

    pub fn into_notification(self) -> Option<Notification> {
        match self {
            StreamFrame::Notification { method, params } => Some(Notification { method, params }),
            _ => None,
        }
    }
}

impl From<Notification> for StreamFrame {
    fn from(n: Notification) -> Self {
        StreamFrame::Notification {
            method: n.method,
            params: n.params,
        }
    }
}
