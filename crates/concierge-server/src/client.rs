use dashmap::DashMap;
use tokio::sync::mpsc;

use concierge_core::events::SessionEvent;
use concierge_core::ids::ClientId;
use concierge_engine::EventSink;

/// Queue a frame for a client. Drops the frame if the queue is full.
fn deliver(client_id: &ClientId, tx: &mpsc::Sender<String>, frame: String) -> bool {
    match tx.try_send(frame) {
        Ok(()) => true,
        Err(mpsc::error::TrySendError::Full(frame)) => {
            // mpsc can't drop the oldest entry, so the newest frame is lost.
            tracing::warn!(
                client_id = %client_id,
                frame_len = frame.len(),
                "Send queue full, dropping frame"
            );
            false
        }
        Err(mpsc::error::TrySendError::Closed(_)) => false,
    }
}

/// Outbound side of one client, handed to its session coordinator.
#[derive(Clone)]
pub struct ClientSink {
    client_id: ClientId,
    tx: mpsc::Sender<String>,
}

impl EventSink for ClientSink {
    fn emit(&self, event: SessionEvent) -> bool {
        match serde_json::to_string(&event) {
            Ok(frame) => deliver(&self.client_id, &self.tx, frame),
            Err(e) => {
                tracing::error!(client_id = %self.client_id, error = %e, "Failed to encode event");
                false
            }
        }
    }
}

/// Outbound queues of all connected WebSocket clients.
pub struct ClientRegistry {
    clients: DashMap<ClientId, mpsc::Sender<String>>,
    max_send_queue: usize,
}

impl ClientRegistry {
    pub fn new(max_send_queue: usize) -> Self {
        Self {
            clients: DashMap::new(),
            max_send_queue,
        }
    }

    /// Register a new client and return its ID + outbound frame receiver.
    pub fn register(&self) -> (ClientId, mpsc::Receiver<String>) {
        let id = ClientId::new();
        let (tx, rx) = mpsc::channel(self.max_send_queue.max(1));
        self.clients.insert(id.clone(), tx);
        (id, rx)
    }

    pub fn unregister(&self, id: &ClientId) {
        self.clients.remove(id);
    }

    pub fn sink(&self, client_id: &ClientId) -> Option<ClientSink> {
        self.clients.get(client_id).map(|entry| ClientSink {
            client_id: client_id.clone(),
            tx: entry.value().clone(),
        })
    }

    /// Number of connected clients.
    pub fn count(&self) -> usize {
        self.clients.len()
    }
}
