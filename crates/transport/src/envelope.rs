//! Topic names and the typed payload envelope.

use roundtable_types::{Block, Message};
use serde::{Deserialize, Serialize};

use crate::TransportResult;

/// Broadcast topic names.
pub mod topics {
    /// Topic carrying freshly authored chat messages.
    pub const MESSAGES: &str = "/roundtable/messages/1.0.0";
    /// Topic carrying blocks produced by the current leader.
    pub const BLOCKS: &str = "/roundtable/blocks/1.0.0";
}

/// A payload on one of the two broadcast topics.
///
/// Wire form is externally tagged (`{"new_message": {...}}` /
/// `{"new_block": {...}}`), matching the topic payloads of the protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Envelope {
    /// A freshly authored chat message on the `messages` topic.
    NewMessage(Message),
    /// A block appended by the current leader on the `blocks` topic.
    NewBlock(Block),
}

impl Envelope {
    /// The topic this envelope travels on.
    pub fn topic(&self) -> &'static str {
        match self {
            Envelope::NewMessage(_) => topics::MESSAGES,
            Envelope::NewBlock(_) => topics::BLOCKS,
        }
    }

    /// Encodes the envelope to its JSON wire form.
    pub fn encode(&self) -> TransportResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decodes an envelope from its JSON wire form.
    pub fn decode(bytes: &[u8]) -> TransportResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
