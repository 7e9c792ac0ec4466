//! WebSocket transport for live thread sessions
//!
//! Same frame sequence as the SSE transport. The socket is push-only; client
//! text frames are ignored, pings are answered.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use threadline_protocol::StreamFrame;

use crate::session::frames;
use crate::state::AppState;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

const OUTBOUND_CAPACITY: usize = 100;

enum Outbound {
    Frame(StreamFrame),
    Pong(Bytes),
}

impl Outbound {
    fn into_message(self) -> Result<Message, serde_json::Error> {
        Ok(match self {
            Outbound::Frame(frame) => Message::Text(serde_json::to_string(&frame)?.into()),
            Outbound::Pong(data) => Message::Pong(data),
        })
    }
}

/// `GET /threads/{id}/ws`
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Path(thread_id): Path<String>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| serve_thread(socket, state, thread_id))
}

async fn serve_thread(socket: WebSocket, state: Arc<AppState>, thread_id: String) {
    let conn_id = NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed);
    info!(
        component = "websocket",
        event = "ws.connection.opened",
        connection_id = conn_id,
        thread_id = %thread_id,
        "WebSocket connection opened"
    );

    let (sink, incoming) = socket.split();
    let (outbound_tx, outbound_rx) = mpsc::channel::<Outbound>(OUTBOUND_CAPACITY);
    let writer = tokio::spawn(write_outbound(sink, outbound_rx, conn_id));

    let live = frames(state.bridge.subscribe_thread(&thread_id), state.keepalive);
    let frame_tx = outbound_tx.clone();
    let forwarder = tokio::spawn(async move {
        tokio::pin!(live);
        while let Some(frame) = live.next().await {
            if frame_tx.send(Outbound::Frame(frame)).await.is_err() {
                return;
            }
        }
    });

    read_until_closed(incoming, outbound_tx, conn_id).await;

    // Dropping the frame stream releases the bridge subscription.
    forwarder.abort();
    writer.abort();

    info!(
        component = "websocket",
        event = "ws.connection.closed",
        connection_id = conn_id,
        thread_id = %thread_id,
        "WebSocket connection closed"
    );
}

async fn write_outbound(
    mut sink: SplitSink<WebSocket, Message>,
    mut outbound_rx: mpsc::Receiver<Outbound>,
    conn_id: u64,
) {
    while let Some(outbound) = outbound_rx.recv().await {
        let message = match outbound.into_message() {
            Ok(message) => message,
            Err(e) => {
                error!(
                    component = "websocket",
                    event = "ws.send.serialize_failed",
                    connection_id = conn_id,
                    error = %e,
                    "Failed to serialize frame"
                );
                continue;
            }
        };
        if sink.send(message).await.is_err() {
            debug!(
                component = "websocket",
                event = "ws.send.disconnected",
                connection_id = conn_id,
                "Client went away mid-send"
            );
            return;
        }
    }
}

async fn read_until_closed(
    mut incoming: SplitStream<WebSocket>,
    outbound_tx: mpsc::Sender<Outbound>,
    conn_id: u64,
) {
    while let Some(received) = incoming.next().await {
        match received {
            Ok(Message::Ping(data)) => {
                if outbound_tx.send(Outbound::Pong(data)).await.is_err() {
                    return;
                }
            }
            Ok(Message::Close(_)) => {
                debug!(
                    component = "websocket",
                    event = "ws.connection.close_frame",
                    connection_id = conn_id,
                    "Client sent close frame"
                );
                return;
            }
            Ok(_) => {}
            Err(e) => {
                warn!(
                    component = "websocket",
                    event = "ws.connection.error",
                    connection_id = conn_id,
                    error = %e,
                    "WebSocket read failed"
                );
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_go_out_as_json_text() {
        let message = Outbound::Frame(StreamFrame::Lagged { skipped: 4 })
            .into_message()
            .unwrap();
        let Message::Text(text) = message else {
            panic!("expected text message");
        };
        let frame: StreamFrame = serde_json::from_str(text.as_str()).unwrap();
        assert_eq!(frame, StreamFrame::Lagged { skipped: 4 });
    }

    #[test]
    fn pongs_echo_ping_payload() {
        let message = Outbound::Pong(Bytes::from_static(b"hi")).into_message().unwrap();
        assert!(matches!(message, Message::Pong(data) if data.as_ref() == b"hi"));
    }
}
