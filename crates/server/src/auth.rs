//! Bearer credential middleware.
//!
//! Every route except `/health` requires a credential, either as
//! `Authorization: Bearer <token>` or `?token=<token>` (for WebSocket and
//! EventSource clients that cannot set headers). Verification happens before
//! the handler runs, so a rejected request never subscribes to anything.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use tracing::{debug, warn};

use crate::state::AppState;

fn bearer_token(req: &Request<Body>) -> Option<String> {
    if let Some(value) = req
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
    {
        if let Some(token) = value.strip_prefix("Bearer ") {
            return Some(token.trim().to_string());
        }
    }

    req.uri().query().and_then(|query| {
        query
            .split('&')
            .find_map(|pair| pair.strip_prefix("token="))
            .map(|token| {
                urlencoding::decode(token)
                    .map(|t| t.into_owned())
                    .unwrap_or_else(|_| token.to_string())
            })
    })
}

/// Axum middleware that checks for a valid credential.
/// Skips authentication for the `/health` endpoint.
pub async fn require_credential(
    State(state): State<Arc<AppState>>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    if req.uri().path() == "/health" {
        return Ok(next.run(req).await);
    }

    let Some(token) = bearer_token(&req) else {
        warn!(
            component = "auth",
            event = "auth.rejected",
            path = %req.uri().path(),
            reason = "missing",
            "Request without credential"
        );
        return Err(StatusCode::UNAUTHORIZED);
    };

    match state
        .credentials
        .verify(&token, chrono::Utc::now().timestamp())
    {
        Ok(claims) => {
            debug!(
                component = "auth",
                event = "auth.accepted",
                path = %req.uri().path(),
                subject = %claims.sub,
                "Credential accepted"
            );
            Ok(next.run(req).await)
        }
        Err(e) => {
            warn!(
                component = "auth",
                event = "auth.rejected",
                path = %req.uri().path(),
                reason = %e,
                "Credential rejected"
            );
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(uri: &str, header: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(value) = header {
            builder = builder.header("authorization", value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn header_token_is_preferred() {
        let req = request("/threads/t/ws?token=query", Some("Bearer header"));
        assert_eq!(bearer_token(&req).as_deref(), Some("header"));
    }

    #[test]
    fn query_token_is_decoded() {
        let req = request("/threads/t/stream?x=1&token=abc%2Edef", None);
        assert_eq!(bearer_token(&req).as_deref(), Some("abc.def"));
    }

    #[test]
    fn missing_token_is_none() {
        assert_eq!(bearer_token(&request("/threads/t/events", None)), None);
        assert_eq!(bearer_token(&request("/x", Some("Basic abc"))), None);
    }
}
