//! Route handlers

pub mod health;

use axum::http::StatusCode;

/// Fallback for authorized requests to unknown paths
pub async fn not_found() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "Not Found")
}

/// Authorized request with an unsupported method on a known path
pub async fn method_not_allowed() -> (StatusCode, &'static str) {
    (StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed")
}
