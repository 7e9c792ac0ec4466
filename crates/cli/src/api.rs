//! HTTP client for the server's REST reads

use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use threadline_protocol::ThreadEvent;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Credential rejected by server")]
    Unauthorized,

    #[error("HTTP error: {0}")]
    Http(String),

    /// Live stream dropped or could not be established
    #[error("Stream disconnected: {0}")]
    Stream(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.status() == Some(StatusCode::UNAUTHORIZED) {
            ClientError::Unauthorized
        } else {
            ClientError::Http(e.to_string())
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventsResponse {
    events: Vec<ThreadEvent>,
}

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base: &str, token: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base: base.trim_end_matches('/').to_string(),
            token,
        }
    }

    fn thread_url(&self, thread_id: &str, leaf: &str) -> String {
        format!(
            "{}/threads/{}/{leaf}",
            self.base,
            urlencoding::encode(thread_id)
        )
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn checked(response: Response) -> Result<Response, ClientError> {
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(ClientError::Unauthorized);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Http(format!("{status}: {}", body.trim())));
        }
        Ok(response)
    }

    /// Newest `limit` persisted events of a thread, oldest first.
    pub async fn events(&self, thread_id: &str, limit: usize) -> Result<Vec<ThreadEvent>, ClientError> {
        let request = self
            .http
            .get(self.thread_url(thread_id, "events"))
            .query(&[("limit", limit)]);
        let response = Self::checked(self.authorized(request).send().await?).await?;
        let body: EventsResponse = serde_json::from_slice(&response.bytes().await?)?;
        Ok(body.events)
    }

    /// The agent's current view of the thread (`thread/read` result).
    pub async fn snapshot(&self, thread_id: &str) -> Result<Value, ClientError> {
        let request = self.http.get(self.thread_url(thread_id, "snapshot"));
        let response = Self::checked(self.authorized(request).send().await?).await?;
        Ok(serde_json::from_slice(&response.bytes().await?)?)
    }

    /// Open the SSE stream. The caller consumes the body.
    pub async fn open_sse(&self, thread_id: &str) -> Result<Response, ClientError> {
        let request = self
            .http
            .get(self.thread_url(thread_id, "stream"))
            .header("accept", "text/event-stream");
        Self::checked(self.authorized(request).send().await?).await
    }

    /// WebSocket URL for the thread stream, credential in the query.
    pub fn ws_url(&self, thread_id: &str) -> String {
        let url = self.thread_url(thread_id, "ws");
        let url = if let Some(rest) = url.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = url.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            url
        };
        match &self.token {
            Some(token) => format!("{url}?token={}", urlencoding::encode(token)),
            None => url,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ws_url_swaps_scheme_and_carries_token() {
        let client = ApiClient::new("http://127.0.0.1:4610/", Some("abc.def".into()));
        assert_eq!(
            client.ws_url("thr 1"),
            "ws://127.0.0.1:4610/threads/thr%201/ws?token=abc.def"
        );

        let secure = ApiClient::new("https://box.example", None);
        assert_eq!(secure.ws_url("t"), "wss://box.example/threads/t/ws");
    }

    #[test]
    fn thread_urls_are_rooted_at_base() {
        let client = ApiClient::new("http://h:1", None);
        assert_eq!(client.thread_url("t", "events"), "http://h:1/threads/t/events");
    }
}
