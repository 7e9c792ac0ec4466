//! Live thread stream with transport fallback.
//!
//! WebSocket first; if the handshake fails for any reason other than a
//! rejected credential, Server-Sent Events. Both yield the same frames.

use std::fmt;
use std::pin::Pin;

use eventsource_stream::Eventsource;
use futures::{Stream, StreamExt};
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::{debug, warn};

use threadline_protocol::StreamFrame;

use crate::api::{ApiClient, ClientError};

pub type FrameStream = Pin<Box<dyn Stream<Item = Result<StreamFrame, ClientError>> + Send>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    WebSocket,
    Sse,
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transport::WebSocket => f.write_str("websocket"),
            Transport::Sse => f.write_str("sse"),
        }
    }
}

/// Decode one frame. Garbage is logged and skipped.
fn decode_frame(text: &str) -> Option<StreamFrame> {
    match serde_json::from_str(text) {
        Ok(frame) => Some(frame),
        Err(e) => {
            warn!(
                component = "stream",
                event = "stream.frame.invalid",
                error = %e,
                "Skipping undecodable frame"
            );
            None
        }
    }
}

async fn open_websocket(client: &ApiClient, thread_id: &str) -> Result<FrameStream, ClientError> {
    let (socket, _response) = tokio_tungstenite::connect_async(client.ws_url(thread_id))
        .await
        .map_err(|e| match e {
            tungstenite::Error::Http(ref response) if response.status().as_u16() == 401 => {
                ClientError::Unauthorized
            }
            other => ClientError::Stream(other.to_string()),
        })?;

    let frames = socket.filter_map(|message| async move {
        match message {
            Ok(Message::Text(text)) => decode_frame(text.as_str()).map(Ok),
            Ok(Message::Close(_)) => Some(Err(ClientError::Stream("closed by server".into()))),
            Ok(_) => None,
            Err(e) => Some(Err(ClientError::Stream(e.to_string()))),
        }
    });
    Ok(Box::pin(frames))
}

async fn open_sse(client: &ApiClient, thread_id: &str) -> Result<FrameStream, ClientError> {
    let response = client.open_sse(thread_id).await?;
    let frames = response.bytes_stream().eventsource().filter_map(|event| async move {
        match event {
            Ok(event) => decode_frame(&event.data).map(Ok),
            Err(e) => Some(Err(ClientError::Stream(e.to_string()))),
        }
    });
    Ok(Box::pin(frames))
}

/// Open the thread stream over whichever transport answers.
pub async fn open_stream(
    client: &ApiClient,
    thread_id: &str,
) -> Result<(Transport, FrameStream), ClientError> {
    match open_websocket(client, thread_id).await {
        Ok(frames) => return Ok((Transport::WebSocket, frames)),
        Err(ClientError::Unauthorized) => return Err(ClientError::Unauthorized),
        Err(e) => debug!(
            component = "stream",
            event = "stream.websocket.unavailable",
            thread_id = %thread_id,
            error = %e,
            "WebSocket unavailable, falling back to SSE"
        ),
    }
    let frames = open_sse(client, thread_id).await?;
    Ok((Transport::Sse, frames))
}
