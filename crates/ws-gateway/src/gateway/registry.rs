//! Connection Registry - tracks live WebSocket clients

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use axum::extract::ws::{CloseFrame, Message};
use tokio::sync::{broadcast, mpsc, watch, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use wsgw_core::Envelope;

/// Opaque connection identifier
pub type ConnectionId = String;

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Lifecycle notifications raised to the gateway
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    Connected(ConnectionId),
    Disconnected(ConnectionId),
    Error { id: ConnectionId, message: String },
}

/// Why a targeted send did not go through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendFailure {
    /// No live connection with that identifier
    UnknownConnection,
    /// The connection's writer is gone; it has been removed
    ConnectionClosed,
}

/// Per-connection results of a broadcast
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub attempted: usize,
    pub delivered: usize,
    pub failed: Vec<ConnectionId>,
}

/// Result of [`ConnectionRegistry::send`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Broadcast(BroadcastReport),
    Delivered,
    Failed(SendFailure),
}

/// One live client connection
struct ClientConnection {
    tx: mpsc::UnboundedSender<Message>,
    connected_at: Instant,
}

/// Set of live connections with broadcast and targeted send
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<ConnectionId, ClientConnection>>,
    event_tx: broadcast::Sender<RegistryEvent>,
    closed: AtomicBool,
    closed_tx: watch::Sender<bool>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (closed_tx, _) = watch::channel(false);
        Self {
            connections: RwLock::new(HashMap::new()),
            event_tx,
            closed: AtomicBool::new(false),
            closed_tx,
        }
    }

    /// Subscribe to connect/disconnect/error notifications
    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.event_tx.subscribe()
    }

    /// Register a connection whose outbound frames are drained from `tx`'s
    /// receiver. Returns `None` once the registry has been closed.
    pub async fn connect(&self, tx: mpsc::UnboundedSender<Message>) -> Option<ConnectionId> {
        let mut connections = self.connections.write().await;
        if self.is_closed() {
            return None;
        }

        let id = Uuid::new_v4().to_string();
        connections.insert(
            id.clone(),
            ClientConnection {
                tx,
                connected_at: Instant::now(),
            },
        );
        drop(connections);

        debug!("Registered connection {}", id);
        let _ = self.event_tx.send(RegistryEvent::Connected(id.clone()));
        Some(id)
    }

    /// Remove a connection. Returns false if it was already gone.
    pub async fn disconnect(&self, id: &str) -> bool {
        let removed = self.connections.write().await.remove(id);
        match removed {
            Some(conn) => {
                debug!(
                    "Connection {} removed after {:?}",
                    id,
                    conn.connected_at.elapsed()
                );
                let _ = self.event_tx.send(RegistryEvent::Disconnected(id.to_string()));
                true
            }
            None => false,
        }
    }

    /// Record a socket-level error and drop the connection
    pub async fn report_error(&self, id: &str, message: impl Into<String>) {
        let message = message.into();
        warn!("WebSocket error on {}: {}", id, message);
        let _ = self.event_tx.send(RegistryEvent::Error {
            id: id.to_string(),
            message,
        });
        self.disconnect(id).await;
    }

    /// Broadcast when `target` is `None`, otherwise deliver to one connection
    pub async fn send(&self, envelope: &Envelope, target: Option<&str>) -> SendOutcome {
        match target {
            None => SendOutcome::Broadcast(self.broadcast(envelope).await),
            Some(id) => match self.send_to(id, envelope).await {
                Ok(()) => SendOutcome::Delivered,
                Err(failure) => SendOutcome::Failed(failure),
            },
        }
    }

    /// Queue `envelope` on every live connection, independently
    pub async fn broadcast(&self, envelope: &Envelope) -> BroadcastReport {
        let text = envelope.to_line();
        let mut report = BroadcastReport::default();

        {
            let connections = self.connections.read().await;
            for (id, conn) in connections.iter() {
                report.attempted += 1;
                if conn.tx.send(Message::Text(text.clone().into())).is_ok() {
                    report.delivered += 1;
                } else {
                    warn!("Failed to deliver message to {}: connection closed", id);
                    report.failed.push(id.clone());
                }
            }
        }

        for id in &report.failed {
            self.disconnect(id).await;
        }

        report
    }

    /// Queue `envelope` on a single connection
    pub async fn send_to(&self, id: &str, envelope: &Envelope) -> Result<(), SendFailure> {
        let delivered = {
            let connections = self.connections.read().await;
            let conn = connections.get(id).ok_or(SendFailure::UnknownConnection)?;
            conn.tx
                .send(Message::Text(envelope.to_line().into()))
                .is_ok()
        };

        if delivered {
            Ok(())
        } else {
            warn!("Failed to deliver message to {}: connection closed", id);
            self.disconnect(id).await;
            Err(SendFailure::ConnectionClosed)
        }
    }

    /// Close every connection and refuse new ones; wakes [`Self::closed`]
    pub async fn close_all(&self) {
        let drained: Vec<(ConnectionId, ClientConnection)> = {
            let mut connections = self.connections.write().await;
            self.closed.store(true, Ordering::Release);
            connections.drain().collect()
        };

        if !drained.is_empty() {
            info!("Closing {} WebSocket connection(s)", drained.len());
        }

        for (id, conn) in drained {
            let frame = CloseFrame {
                code: axum::extract::ws::close_code::AWAY,
                reason: "gateway shutting down".into(),
            };
            if conn.tx.send(Message::Close(Some(frame))).is_err() {
                debug!("Connection {} already gone during close", id);
            }
            let _ = self.event_tx.send(RegistryEvent::Disconnected(id));
        }

        self.closed_tx.send_replace(true);
    }

    /// Resolves once [`Self::close_all`] has run
    pub async fn closed(&self) {
        let mut rx = self.closed_tx.subscribe();
        let _ = rx.wait_for(|closed| *closed).await;
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    pub async fn connection_ids(&self) -> Vec<ConnectionId> {
        self.connections.read().await.keys().cloned().collect()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
