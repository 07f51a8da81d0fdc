use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message as WsMessage, WebSocket};
use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use roster_core::{ConnectionId, InboundEvent};
use tokio::sync::mpsc;

use crate::presence::SessionLifecycle;

/// A connected WebSocket client.
pub struct Client {
    pub id: ConnectionId,
    tx: mpsc::Sender<String>,
    connected: AtomicBool,
    subscribed: AtomicBool,
    last_pong: AtomicU64,
}

impl Client {
    fn new(id: ConnectionId, tx: mpsc::Sender<String>) -> Self {
        Self {
            id,
            tx,
            connected: AtomicBool::new(true),
            subscribed: AtomicBool::new(false),
            last_pong: AtomicU64::new(now_secs()),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    /// Whether this client belongs to the shared presence channel.
    pub fn is_subscribed(&self) -> bool {
        self.subscribed.load(Ordering::Relaxed)
    }

    pub fn record_pong(&self) {
        self.last_pong.store(now_secs(), Ordering::Relaxed);
    }

    pub fn is_alive(&self, timeout: Duration) -> bool {
        let last = self.last_pong.load(Ordering::Relaxed);
        now_secs().saturating_sub(last) < timeout.as_secs()
    }

    /// Queue a message without waiting. A full or closed queue drops it.
    pub fn try_send(&self, message: String) -> bool {
        match self.tx.try_send(message) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(msg)) => {
                tracing::warn!(
                    connection_id = %self.id,
                    msg_len = msg.len(),
                    "Send queue full, dropping message"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }
}

fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Registry of all connected WebSocket clients and their outbound queues.
pub struct ClientRegistry {
    clients: DashMap<ConnectionId, Arc<Client>>,
    max_send_queue: usize,
    client_timeout: Duration,
}

impl ClientRegistry {
    pub fn new(max_send_queue: usize, client_timeout: Duration) -> Self {
        Self {
            clients: DashMap::new(),
            max_send_queue,
            client_timeout,
        }
    }

    /// Register a new client and return its ID + the receiving end of its queue.
    pub fn register(&self) -> (ConnectionId, mpsc::Receiver<String>) {
        let id = ConnectionId::new();
        let (tx, rx) = mpsc::channel(self.max_send_queue);
        self.clients.insert(id.clone(), Arc::new(Client::new(id.clone(), tx)));
        (id, rx)
    }

    /// Remove a client by ID. Dropping the client closes its queue.
    pub fn unregister(&self, id: &ConnectionId) {
        if let Some((_, client)) = self.clients.remove(id) {
            client.connected.store(false, Ordering::Relaxed);
            client.subscribed.store(false, Ordering::Relaxed);
        }
    }

    pub fn get(&self, id: &ConnectionId) -> Option<Arc<Client>> {
        self.clients.get(id).map(|c| Arc::clone(c.value()))
    }

    /// Send a message to a specific client.
    pub fn send_to(&self, id: &ConnectionId, message: String) -> bool {
        self.get(id).is_some_and(|c| c.try_send(message))
    }

    /// Add a client to the shared channel. Returns false if it was already a
    /// member or is unknown.
    pub fn subscribe(&self, id: &ConnectionId) -> bool {
        self.get(id)
            .is_some_and(|c| !c.subscribed.swap(true, Ordering::Relaxed))
    }

    pub fn unsubscribe(&self, id: &ConnectionId) {
        if let Some(client) = self.get(id) {
            client.subscribed.store(false, Ordering::Relaxed);
        }
    }

    /// Point-in-time list of connected channel members. Callers iterate this
    /// copy, never the live map.
    pub fn subscribers(&self) -> Vec<Arc<Client>> {
        self.clients
            .iter()
            .filter(|entry| entry.is_subscribed() && entry.is_connected())
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    /// Number of connected clients.
    pub fn count(&self) -> usize {
        self.clients.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.clients.iter().filter(|entry| entry.is_subscribed()).count()
    }

    /// Remove clients that haven't responded to pings within the timeout.
    /// Their queues close, which ends their connection tasks.
    pub fn cleanup_dead_clients(&self) -> usize {
        let dead: Vec<ConnectionId> = self
            .clients
            .iter()
            .filter(|entry| !entry.is_alive(self.client_timeout))
            .map(|entry| entry.key().clone())
            .collect();

        for id in &dead {
            self.unregister(id);
            tracing::info!(connection_id = %id, "Cleaned up dead client");
        }
        dead.len()
    }
}

/// Drive one WebSocket connection: a writer task drains the client's queue
/// and pings, a reader task feeds inbound events to the lifecycle handler.
/// When either side ends the connection is closed and unregistered.
pub async fn handle_ws_connection(
    socket: WebSocket,
    connection_id: ConnectionId,
    mut rx: mpsc::Receiver<String>,
    registry: Arc<ClientRegistry>,
    lifecycle: Arc<SessionLifecycle>,
    heartbeat_interval: Duration,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    let writer_cid = connection_id.clone();
    let mut writer = tokio::spawn(async move {
        let mut ping_interval = tokio::time::interval(heartbeat_interval);
        ping_interval.tick().await; // consume first immediate tick

        loop {
            tokio::select! {
                msg = rx.recv() => {
                    match msg {
                        Some(text) => {
                            if ws_tx.send(WsMessage::Text(text.into())).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                _ = ping_interval.tick() => {
                    if ws_tx.send(WsMessage::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                    tracing::trace!(connection_id = %writer_cid, "Sent ping");
                }
            }
        }
        let _ = ws_tx.close().await;
    });

    let reader_cid = connection_id.clone();
    let reader_registry = Arc::clone(&registry);
    let reader_lifecycle = Arc::clone(&lifecycle);
    let mut reader = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_rx.next().await {
            match msg {
                WsMessage::Text(text) => match InboundEvent::parse(text.as_str()) {
                    Ok(event) => reader_lifecycle.handle(&reader_cid, event),
                    Err(e) => {
                        tracing::debug!(connection_id = %reader_cid, error = %e, "Ignoring frame");
                    }
                },
                WsMessage::Pong(_) => {
                    if let Some(client) = reader_registry.get(&reader_cid) {
                        client.record_pong();
                    }
                }
                WsMessage::Close(_) => break,
                WsMessage::Ping(_) => {} // axum handles pong automatically
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut writer => reader.abort(),
        _ = &mut reader => writer.abort(),
    }

    lifecycle.close(&connection_id);
    registry.unregister(&connection_id);
    tracing::info!(connection_id = %connection_id, "WebSocket client disconnected");
}

/// Start a background task that periodically cleans up dead clients.
pub fn start_cleanup_task(
    registry: Arc<ClientRegistry>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let removed = registry.cleanup_dead_clients();
            if removed > 0 {
                tracing::info!(removed = removed, "Dead client cleanup");
            }
        }
    })
}
