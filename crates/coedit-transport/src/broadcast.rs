//! Broadcast fan-out to connected peers

use std::sync::Arc;

use tokio::sync::broadcast;

/// Connection identifier assigned by the accept loop.
pub type ConnectionId = u64;

/// A pre-encoded outbound frame. `skip` names the originating connection for
/// messages that must not echo back to their sender.
#[derive(Debug, Clone)]
pub struct Frame {
    pub skip: Option<ConnectionId>,
    pub text: Arc<str>,
}

impl Frame {
    /// Whether the frame should be written to the given connection.
    pub fn is_for(&self, connection_id: ConnectionId) -> bool {
        self.skip != Some(connection_id)
    }
}

/// Fans frames out to every connected peer via a broadcast channel; each
/// connection task holds a receiver.
#[derive(Debug, Clone)]
pub struct Broadcaster {
    tx: broadcast::Sender<Frame>,
}

impl Broadcaster {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Frame> {
        self.tx.subscribe()
    }

    /// Deliver to every connected peer, the originator included.
    pub fn publish_all(&self, text: String) {
        let _ = self.tx.send(Frame {
            skip: None,
            text: text.into(),
        });
    }

    /// Deliver to every connected peer except the originating connection.
    pub fn publish_others(&self, origin: ConnectionId, text: String) {
        let _ = self.tx.send(Frame {
            skip: Some(origin),
            text: text.into(),
        });
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new(1024)
    }
}
