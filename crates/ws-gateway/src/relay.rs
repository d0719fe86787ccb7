//! Message Router - moves envelopes between the child and the clients

use std::sync::Arc;

use stdio_runner::ChildHandle;
use tracing::{debug, warn};
use wsgw_core::Envelope;

use crate::gateway::{BroadcastReport, ConnectionRegistry};

/// Child stdout lines go to every client; client frames go to child stdin.
///
/// Child lines must be fed from a single task so broadcasts keep the
/// child's output order.
pub struct MessageRouter {
    registry: Arc<ConnectionRegistry>,
    child: ChildHandle,
}

impl MessageRouter {
    pub fn new(registry: Arc<ConnectionRegistry>, child: ChildHandle) -> Self {
        Self { registry, child }
    }

    /// Broadcast one framed stdout line. Non-JSON lines are logged and
    /// dropped, returning `None`.
    pub async fn on_child_line(&self, line: &str) -> Option<BroadcastReport> {
        let envelope = match Envelope::parse(line) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("Child non-JSON ({}): {}", e, line);
                return None;
            }
        };

        debug!("Child → WebSocket [id={}]: {}", envelope.id_label(), line);
        let report = self.registry.broadcast(&envelope).await;
        if !report.failed.is_empty() {
            debug!(
                "Broadcast delivered to {}/{} connections",
                report.delivered, report.attempted
            );
        }
        Some(report)
    }

    /// Forward one client frame to the child. Returns false when the frame
    /// was dropped (malformed, or the child is gone).
    pub fn on_client_message(&self, text: &str, from: &str) -> bool {
        let envelope = match Envelope::parse(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("Dropping malformed message from {}: {}", from, e);
                return false;
            }
        };

        let line = envelope.to_line();
        debug!(
            "WebSocket {} → Child [id={}]: {}",
            from,
            envelope.id_label(),
            line
        );
        self.child.write(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::ws::Message;
    use serde_json::{json, Value};
    use tokio::sync::mpsc;

    fn parse_frame(msg: Message) -> Value {
        match msg {
            Message::Text(text) => serde_json::from_str(text.as_str()).unwrap(),
            other => panic!("expected text frame, got {:?}", other),
        }
    }

    async fn setup() -> (
        MessageRouter,
        Arc<ConnectionRegistry>,
        mpsc::UnboundedReceiver<String>,
    ) {
        let registry = Arc::new(ConnectionRegistry::new());
        let (child, stdin_rx) = ChildHandle::loopback();
        (
            MessageRouter::new(Arc::clone(&registry), child),
            registry,
            stdin_rx,
        )
    }

    #[tokio::test]
    async fn child_lines_are_broadcast_in_order() {
        let (router, registry, _stdin) = setup().await;
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        registry.connect(tx_a).await.unwrap();
        registry.connect(tx_b).await.unwrap();

        for i in 1..=3 {
            let line = format!(r#"{{"jsonrpc":"2.0","id":{},"result":"ok"}}"#, i);
            let report = router.on_child_line(&line).await.unwrap();
            assert_eq!(report.delivered, 2);
        }

        for rx in [&mut rx_a, &mut rx_b] {
            for i in 1..=3 {
                let value = parse_frame(rx.recv().await.unwrap());
                assert_eq!(value["id"], json!(i));
            }
        }
    }

    #[tokio::test]
    async fn non_json_child_output_is_dropped() {
        let (router, registry, _stdin) = setup().await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        registry.connect(tx).await.unwrap();

        assert!(router.on_child_line("Server listening on stdio").await.is_none());
        assert!(rx.try_recv().is_err());

        assert!(router
            .on_child_line(r#"{"jsonrpc":"2.0","method":"ready"}"#)
            .await
            .is_some());
        assert!(rx.recv().await.is_some());
    }

    #[tokio::test]
    async fn broadcast_with_no_clients_is_not_an_error() {
        let (router, _registry, _stdin) = setup().await;
        let report = router
            .on_child_line(r#"{"jsonrpc":"2.0","id":1,"result":"ok"}"#)
            .await
            .unwrap();
        assert_eq!(report.attempted, 0);
    }

    #[tokio::test]
    async fn client_messages_are_written_as_single_lines() {
        let (router, _registry, mut stdin) = setup().await;

        assert!(router.on_client_message(
            "{\n  \"jsonrpc\": \"2.0\",\n  \"id\": 7,\n  \"method\": \"ping\"\n}",
            "conn-1"
        ));

        let line = stdin.recv().await.unwrap();
        assert!(!line.contains('\n'));
        let value: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value, json!({"jsonrpc": "2.0", "id": 7, "method": "ping"}));
    }

    #[tokio::test]
    async fn malformed_client_messages_are_dropped() {
        let (router, _registry, mut stdin) = setup().await;

        assert!(!router.on_client_message("{not json", "conn-1"));
        assert!(!router.on_client_message("\"just a string\"", "conn-1"));
        assert!(stdin.try_recv().is_err());
    }
}
