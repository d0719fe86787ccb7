//! Health check endpoints

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::state::GatewayState;

/// `GET` on a configured health path; not subject to authentication
pub async fn health_check(State(state): State<GatewayState>) -> Response {
    if !state.child().is_alive() {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Child process has been killed",
        )
            .into_response();
    }

    if !state.lifecycle().is_ready() {
        return (StatusCode::INTERNAL_SERVER_ERROR, "Server is not ready").into_response();
    }

    (StatusCode::OK, "ok").into_response()
}

