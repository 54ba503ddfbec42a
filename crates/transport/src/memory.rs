//! Process-local broadcast bus.
//!
//! Stands in for the external pub/sub network in tests and local
//! clusters. Honors the transport contract: best-effort fan-out to every
//! subscriber including the publisher, no ordering guarantee across
//! topics, and subscribers that fall behind simply miss messages.

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::trace;

use crate::{Envelope, Transport, TransportResult};

/// Default per-subscriber buffer of in-flight envelopes.
const DEFAULT_CAPACITY: usize = 1024;

/// An in-memory broadcast bus connecting the nodes of one process.
#[derive(Debug, Clone)]
pub struct MemoryBus {
    sender: broadcast::Sender<Envelope>,
}

impl MemoryBus {
    /// Creates a bus with the default buffer capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Creates a bus buffering up to `capacity` in-flight envelopes per
    /// subscriber.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Attaches a new subscriber receiving every envelope broadcast from
    /// this point on, loopback included.
    pub fn subscribe(&self) -> broadcast::Receiver<Envelope> {
        self.sender.subscribe()
    }

    /// Number of attached subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for MemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MemoryBus {
    async fn broadcast(&self, envelope: Envelope) -> TransportResult<()> {
        let topic = envelope.topic();
        // A send error only means there are no subscribers, which is a
        // vacuous success for best-effort broadcast.
        match self.sender.send(envelope) {
            Ok(receivers) => {
                trace!(topic, receivers, "broadcast envelope");
            }
            Err(_) => {
                trace!(topic, "broadcast with no subscribers");
            }
        }
        Ok(())
    }
}
