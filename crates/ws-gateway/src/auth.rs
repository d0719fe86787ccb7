//! Bearer token middleware for plain HTTP routes
//!
//! The WebSocket upgrade path runs the same [`AuthGate`] rule from its own
//! handler; only the failure response differs.

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::warn;

use wsgw_core::{AuthDecision, AuthGate};

/// JSON-RPC error code for rejected credentials
pub const UNAUTHORIZED_CODE: i64 = -32001;
pub const UNAUTHORIZED_MESSAGE: &str = "Unauthorized: Invalid or missing token";

#[derive(Debug, Serialize)]
struct JsonRpcErrorBody {
    jsonrpc: &'static str,
    error: JsonRpcErrorObject,
    id: Option<()>,
}

#[derive(Debug, Serialize)]
struct JsonRpcErrorObject {
    code: i64,
    message: &'static str,
}

/// Raw `Authorization` header value, if present and valid ASCII
pub fn authorization_header(headers: &HeaderMap) -> Option<&str> {
    headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok())
}

/// 401 with a JSON-RPC shaped error body
pub fn unauthorized_response() -> Response {
    let body = JsonRpcErrorBody {
        jsonrpc: "2.0",
        error: JsonRpcErrorObject {
            code: UNAUTHORIZED_CODE,
            message: UNAUTHORIZED_MESSAGE,
        },
        id: None,
    };
    (StatusCode::UNAUTHORIZED, Json(body)).into_response()
}

/// Reject requests that fail the bearer check
pub async fn require_bearer(State(auth): State<AuthGate>, request: Request, next: Next) -> Response {
    match auth.authorize(authorization_header(request.headers())) {
        AuthDecision::Allowed => next.run(request).await,
        AuthDecision::Denied(reason) => {
            warn!(
                "Rejected {} {}: {}",
                request.method(),
                request.uri().path(),
                reason
            );
            unauthorized_response()
        }
    }
}
