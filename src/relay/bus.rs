use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{broadcast, RwLock};
use tracing::{trace, warn};

use crate::error::AuthResult;
use crate::relay::message::{Envelope, RelayMessage};

/// Statistics about message bus activity
#[derive(Debug, Clone, Default)]
pub struct BusStats {
    /// Number of envelopes successfully delivered to at least one receiver
    pub messages_published: u64,
    /// Number of envelopes dropped (no receivers)
    pub messages_dropped: u64,
    /// Count of messages by wire tag
    pub type_counts: HashMap<String, u64>,
    /// Count of messages by origin
    pub origin_counts: HashMap<String, u64>,
}

/// Broadcast transport connecting relay participants.
///
/// This is the in-process stand-in for the `postMessage` channel: every
/// subscriber sees every envelope, and filtering by origin happens at the
/// receiving side.
pub struct MessageBus {
    sender: broadcast::Sender<Envelope>,
    capacity: usize,
    stats: Arc<RwLock<BusStats>>,
}

impl MessageBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            capacity,
            stats: Arc::new(RwLock::new(BusStats::default())),
        }
    }

    /// Get a receiver to subscribe to envelopes
    pub fn subscribe(&self) -> broadcast::Receiver<Envelope> {
        trace!("new subscriber registered on message bus");
        self.sender.subscribe()
    }

    /// Publish a message to all subscribers, tagged with its origin.
    ///
    /// Returns the number of receivers the envelope reached. An envelope
    /// with no receivers is counted as dropped, not treated as an error.
    pub async fn publish(&self, origin: &str, message: RelayMessage) -> AuthResult<usize> {
        let kind = message.kind();
        trace!(origin, kind, "publishing message");

        let envelope = Envelope {
            origin: origin.to_string(),
            message,
        };

        match self.sender.send(envelope) {
            Ok(receivers) => {
                let mut stats = self.stats.write().await;
                stats.messages_published += 1;
                *stats.type_counts.entry(kind.to_string()).or_insert(0) += 1;
                *stats.origin_counts.entry(origin.to_string()).or_insert(0) += 1;
                Ok(receivers)
            }
            Err(_) => {
                let mut stats = self.stats.write().await;
                stats.messages_dropped += 1;
                warn!(origin, kind, "no receivers on the bus, message dropped");
                Ok(0)
            }
        }
    }

    /// Get current bus statistics
    pub async fn stats(&self) -> BusStats {
        self.stats.read().await.clone()
    }

    /// Reset all statistics counters
    pub async fn reset_stats(&self) {
        *self.stats.write().await = BusStats::default();
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Clone for MessageBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            capacity: self.capacity,
            stats: Arc::clone(&self.stats),
        }
    }
}
