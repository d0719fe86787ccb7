//! WebSocket handler for client connections

use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use wsgw_core::AuthDecision;

use crate::auth::authorization_header;
use crate::state::GatewayState;

/// WebSocket upgrade handler
///
/// The bearer check runs before the upgrade request is even looked at, so an
/// unauthorized client gets a bare 401 and no upgrade.
pub async fn ws_upgrade_handler(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    if let AuthDecision::Denied(reason) = state.auth().authorize(authorization_header(&headers)) {
        warn!("Rejected WebSocket upgrade: {}", reason);
        return StatusCode::UNAUTHORIZED.into_response();
    }

    if state.lifecycle().is_shutting_down() {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => {
            debug!("Invalid WebSocket upgrade request: {}", rejection);
            return rejection.into_response();
        }
    };

    ws.on_upgrade(move |socket| handle_client_socket(socket, state))
}

/// Handle an individual client WebSocket connection
async fn handle_client_socket(socket: WebSocket, state: GatewayState) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Outbound frames for this client; the registry holds the sender
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

    let registry = state.registry();
    let Some(conn_id) = registry.connect(tx).await else {
        debug!("Gateway is shutting down, closing new connection");
        let _ = ws_sender.send(Message::Close(None)).await;
        return;
    };

    // Task to forward queued frames to the socket
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let closing = matches!(msg, Message::Close(_));
            if ws_sender.send(msg).await.is_err() {
                break;
            }
            if closing {
                break;
            }
        }
    });

    while let Some(result) = ws_receiver.next().await {
        match result {
            Ok(Message::Text(text)) => {
                state.router().on_client_message(text.as_str(), &conn_id);
            }
            Ok(Message::Binary(data)) => match std::str::from_utf8(&data) {
                Ok(text) => {
                    state.router().on_client_message(text, &conn_id);
                }
                Err(_) => {
                    warn!("Dropping non-UTF-8 binary frame from {}", conn_id);
                }
            },
            Ok(Message::Close(_)) => {
                debug!("Client {} sent close frame", conn_id);
                break;
            }
            // Pong replies are handled by the transport
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Err(e) => {
                registry.report_error(&conn_id, e.to_string()).await;
                break;
            }
        }
    }

    registry.disconnect(&conn_id).await;
    send_task.abort();
    debug!("WebSocket handler for {} finished", conn_id);
}
