//! Authored, signed chat messages.
//!
//! A [`Message`] is created by any peer at any time, independently of the
//! turn rotation. Its `message_id` is derived from the content, author and
//! creation timestamp, and the author signs a pipe-delimited rendering of
//! all four fields. Messages travel on the `messages` topic and are later
//! committed into blocks by the current leader.

use rlp::RlpStream;
use roundtable_crypto::{message_id, verify, Keypair, PublicKey, Signature};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::time::now_ms;

/// An authored, signed chat payload with a stable identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Opaque chat payload
    pub content: String,
    /// Identifier of the authoring peer
    pub author_id: String,
    /// Creation time in milliseconds since the Unix epoch
    pub timestamp: u64,
    /// SHA-256 hex of `content ∥ author_id ∥ timestamp`; primary key in
    /// the message pool
    pub message_id: String,
    /// Ed25519 signature by the author over the signable string
    pub signature: Signature,
}

impl Message {
    /// Creates and signs a new message stamped with the current time.
    pub fn create(content: String, author_id: String, keypair: &Keypair) -> Self {
        Self::create_at(content, author_id, now_ms(), keypair)
    }

    /// Creates and signs a message with an explicit timestamp.
    ///
    /// Used by replay tooling and tests that need deterministic IDs.
    pub fn create_at(
        content: String,
        author_id: String,
        timestamp: u64,
        keypair: &Keypair,
    ) -> Self {
        let message_id = message_id(&content, &author_id, timestamp);
        let signable = signable_string(&content, &author_id, timestamp, &message_id);
        let signature = keypair.sign(signable.as_bytes());
        Self {
            content,
            author_id,
            timestamp,
            message_id,
            signature,
        }
    }

    /// The pipe-delimited byte string covered by the signature.
    pub fn signable_string(&self) -> String {
        signable_string(
            &self.content,
            &self.author_id,
            self.timestamp,
            &self.message_id,
        )
    }

    /// Verifies the message against its author's public key.
    ///
    /// Recomputes both the message ID and the signable string, so a
    /// message whose ID does not match its content fails verification
    /// even if the signature covers the forged ID.
    pub fn verify(&self, public_key: &PublicKey) -> bool {
        if self.message_id != message_id(&self.content, &self.author_id, self.timestamp) {
            return false;
        }
        verify(
            public_key,
            self.signable_string().as_bytes(),
            &self.signature,
        )
    }
}

fn signable_string(content: &str, author_id: &str, timestamp: u64, message_id: &str) -> String {
    format!("{}|{}|{}|{}", content, author_id, timestamp, message_id)
}

impl rlp::Encodable for Message {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(5);
        s.append(&self.content.as_str());
        s.append(&self.author_id.as_str());
        s.append(&self.timestamp);
        s.append(&self.message_id.as_str());
        s.append(&self.signature.as_bytes().as_slice());
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Message({}.. by {} at {})",
            &self.message_id[..8.min(self.message_id.len())],
            self.author_id,
            self.timestamp
        )
    }
}
