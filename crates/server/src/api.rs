//! REST reads: thread event log and snapshot proxy

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::warn;

use threadline_connectors::BridgeError;
use threadline_protocol::{methods, ThreadEvent};

use crate::event_log::{EventLogError, DEFAULT_READ_LIMIT, MAX_READ_LIMIT};
use crate::state::AppState;

pub type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Debug)]
pub enum ApiError {
    /// Agent unreachable
    Unavailable(String),
    /// Agent answered with an error
    BadGateway(String),
    GatewayTimeout,
    Internal(String),
}

#[derive(Debug, Serialize)]
struct ApiErrorBody<'a> {
    error: &'a str,
    message: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, "agent_unavailable", Some(msg)),
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, "agent_error", Some(msg)),
            ApiError::GatewayTimeout => (StatusCode::GATEWAY_TIMEOUT, "agent_timeout", None),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal", Some(msg)),
        };
        (
            status,
            Json(ApiErrorBody {
                error: code,
                message,
            }),
        )
            .into_response()
    }
}

impl From<BridgeError> for ApiError {
    fn from(e: BridgeError) -> Self {
        match e {
            BridgeError::Connectivity(msg) => ApiError::Unavailable(msg),
            BridgeError::Rpc { code, message } => ApiError::BadGateway(format!("{code}: {message}")),
            BridgeError::Timeout(_) => ApiError::GatewayTimeout,
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<EventLogError> for ApiError {
    fn from(e: EventLogError) -> Self {
        ApiError::Internal(e.to_string())
    }
}

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    limit: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventsResponse {
    thread_id: String,
    events: Vec<ThreadEvent>,
}

fn effective_limit(requested: Option<usize>) -> usize {
    requested.unwrap_or(DEFAULT_READ_LIMIT).clamp(1, MAX_READ_LIMIT)
}

/// `GET /threads/{id}/events?limit=N`
pub async fn list_events(
    State(state): State<Arc<AppState>>,
    Path(thread_id): Path<String>,
    Query(query): Query<EventsQuery>,
) -> ApiResult<EventsResponse> {
    let limit = effective_limit(query.limit);
    let log = state.event_log.clone();
    let id = thread_id.clone();
    let events = tokio::task::spawn_blocking(move || log.read(&id, limit))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .inspect_err(|e| {
            warn!(
                component = "api",
                event = "api.events.read_failed",
                thread_id = %thread_id,
                error = %e,
                "Event log read failed"
            );
        })?;

    Ok(Json(EventsResponse { thread_id, events }))
}

/// `GET /threads/{id}/snapshot`
pub async fn thread_snapshot(
    State(state): State<Arc<AppState>>,
    Path(thread_id): Path<String>,
) -> ApiResult<Value> {
    let snapshot = state
        .bridge
        .call(
            methods::THREAD_READ,
            json!({"threadId": thread_id, "includeTurns": true}),
        )
        .await
        .inspect_err(|e| {
            warn!(
                component = "api",
                event = "api.snapshot.failed",
                thread_id = %thread_id,
                error = %e,
                "Snapshot read failed"
            );
        })?;
    Ok(Json(snapshot))
}

pub async fn health_handler() -> impl IntoResponse {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn limit_defaults_and_clamps() {
        assert_eq!(effective_limit(None), DEFAULT_READ_LIMIT);
        assert_eq!(effective_limit(Some(0)), 1);
        assert_eq!(effective_limit(Some(50_000)), MAX_READ_LIMIT);
        assert_eq!(effective_limit(Some(20)), 20);
    }

    #[test]
    fn bridge_errors_map_to_gateway_statuses() {
        let status = |e: BridgeError| ApiError::from(e).into_response().status();
        assert_eq!(
            status(BridgeError::Connectivity("down".into())),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status(BridgeError::Rpc {
                code: -32600,
                message: "no such thread".into()
            }),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status(BridgeError::Timeout(Duration::from_secs(1))),
            StatusCode::GATEWAY_TIMEOUT
        );
    }
}
