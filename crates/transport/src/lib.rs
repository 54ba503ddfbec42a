//! # Roundtable Transport
//!
//! The broadcast seam between a node and its peers.
//!
//! The pub/sub network itself is an external collaborator; this crate
//! pins down its contract:
//! - two logical topics, `messages` and `blocks`
//! - a typed [`Envelope`] for the payloads carried on them
//! - the narrow [`Transport`] trait nodes publish through
//! - an in-memory [`MemoryBus`] used by tests and local clusters
//!
//! Delivery is best-effort, unordered and possibly duplicated, and every
//! publish loops back to the publisher. The consensus layer is built to
//! tolerate all three.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod envelope;
pub mod memory;

pub use envelope::{topics, Envelope};
pub use memory::MemoryBus;

use async_trait::async_trait;

/// Errors that can occur when publishing to the network.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The message could not be sent.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// The payload could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// The bus is no longer running.
    #[error("transport not running")]
    NotRunning,
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Core trait for the broadcast network.
///
/// Implementations fan an envelope out to every peer on the envelope's
/// topic, including the publisher itself. No acknowledgements; a failed
/// publish is logged by the caller and never retried.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Broadcast an envelope to all peers on its topic.
    async fn broadcast(&self, envelope: Envelope) -> TransportResult<()>;
}
