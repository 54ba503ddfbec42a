//! The typed event sum every node's mailbox carries.
//!
//! All node behavior is a fold over these events: inbound gossip,
//! timer expiries, the periodic cleanup tick and control requests from
//! the local process. Handlers never block beyond broadcast and timer
//! primitives, so one event runs to completion before the next.

use roundtable_chain::Blockchain;
use roundtable_transport::TransportResult;
use roundtable_types::{Block, Message};
use tokio::sync::oneshot;

use crate::turn::NodeStatus;

/// An event delivered to a node's serialized mailbox.
#[derive(Debug)]
pub enum NodeEvent {
    /// A chat message arrived on the `messages` topic.
    InboundMessage(Message),
    /// A block arrived on the `blocks` topic.
    InboundBlock(Block),
    /// The current turn window elapsed. Stale generations are ignored.
    TurnTimeout {
        /// Timer generation this expiry belongs to
        generation: u64,
    },
    /// The transition window elapsed. Stale generations are ignored.
    TransitionTimeout {
        /// Timer generation this expiry belongs to
        generation: u64,
    },
    /// Periodic pool retention sweep.
    Cleanup,
    /// A request from the local process.
    Control(Control),
}

/// Requests from the owning process, answered over oneshot channels.
#[derive(Debug)]
pub enum Control {
    /// Author, sign and broadcast a chat message. Replies with the
    /// message ID once the broadcast is submitted; inclusion is not
    /// awaited.
    SendMessage {
        /// Chat payload
        content: String,
        /// Reply channel carrying the new message's ID
        reply: oneshot::Sender<TransportResult<String>>,
    },
    /// Snapshot the local chain.
    GetBlockchain {
        /// Reply channel carrying the snapshot
        reply: oneshot::Sender<Blockchain>,
    },
    /// Report the node's current rotation state.
    GetState {
        /// Reply channel carrying the status record
        reply: oneshot::Sender<NodeStatus>,
    },
    /// Stop the event loop. In-flight handlers run to completion;
    /// outstanding timers die with the mailbox.
    Shutdown,
}
