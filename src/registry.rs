use dashmap::DashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Identifier for one live connection, assigned at registration time.
pub type ConnectionId = Uuid;

/// The set of live client connections. Constructed once per server and shared
/// by the relay and the HTTP handlers, so both message-creation paths fan out
/// through the same set.
pub struct ConnectionRegistry {
    connections: DashMap<ConnectionId, mpsc::UnboundedSender<String>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
        }
    }

    /// Register a connection's outbound channel and return its id.
    pub fn add(&self, tx: mpsc::UnboundedSender<String>) -> ConnectionId {
        let id = Uuid::new_v4();
        self.connections.insert(id, tx);
        id
    }

    pub fn remove(&self, id: &ConnectionId) {
        self.connections.remove(id);
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Send a frame to every live connection, including the originator's.
    /// Iterates over a snapshot taken up front, so connections added or
    /// removed mid-broadcast do not affect this cycle; closed channels are
    /// skipped without error.
    pub fn broadcast(&self, frame: &str) {
        let snapshot: Vec<mpsc::UnboundedSender<String>> = self
            .connections
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        for tx in snapshot {
            let _ = tx.send(frame.to_string());
        }
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
