//! WebSocket transport for the agent connection.
//!
//! Adapts a `tokio-tungstenite` stream into the pair of text channels the
//! bridge attaches to: one writer task, one reader task.

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

use crate::BridgeError;

const CHANNEL_CAPACITY: usize = 1024;

/// Connect to the agent at `url` and return `(outbound, inbound)` channels.
///
/// `inbound` closes when the socket closes or errors; that is the bridge's
/// signal that the connection dropped.
pub async fn connect_websocket(
    url: &str,
) -> Result<(mpsc::Sender<String>, mpsc::Receiver<String>), BridgeError> {
    let (socket, _response) = tokio_tungstenite::connect_async(url)
        .await
        .map_err(|e| BridgeError::Connectivity(format!("connect {url}: {e}")))?;
    let (mut ws_tx, mut ws_rx) = socket.split();

    let (outbound_tx, mut outbound_rx) = mpsc::channel::<String>(CHANNEL_CAPACITY);
    let (inbound_tx, inbound_rx) = mpsc::channel::<String>(CHANNEL_CAPACITY);

    tokio::spawn(async move {
        while let Some(text) = outbound_rx.recv().await {
            if let Err(e) = ws_tx.send(Message::Text(text.into())).await {
                warn!(
                    component = "transport",
                    event = "transport.send.failed",
                    error = %e,
                    "Agent socket write failed"
                );
                break;
            }
        }
        let _ = ws_tx.close().await;
        debug!(
            component = "transport",
            event = "transport.writer.closed",
            "Agent socket writer ended"
        );
    });

    tokio::spawn(async move {
        while let Some(frame) = ws_rx.next().await {
            match frame {
                Ok(Message::Text(text)) => {
                    if inbound_tx.send(text.as_str().to_owned()).await.is_err() {
                        break;
                    }
                }
                Ok(Message::Binary(bytes)) => match String::from_utf8(bytes.to_vec()) {
                    Ok(text) => {
                        if inbound_tx.send(text).await.is_err() {
                            break;
                        }
                    }
                    Err(_) => debug!(
                        component = "transport",
                        event = "transport.binary.skipped",
                        "Ignoring non-UTF-8 binary frame"
                    ),
                },
                Ok(Message::Close(_)) => break,
                Ok(_) => continue,
                Err(e) => {
                    warn!(
                        component = "transport",
                        event = "transport.read.failed",
                        error = %e,
                        "Agent socket read failed"
                    );
                    break;
                }
            }
        }
        debug!(
            component = "transport",
            event = "transport.reader.closed",
            "Agent socket reader ended"
        );
    });

    Ok((outbound_tx, inbound_rx))
}
