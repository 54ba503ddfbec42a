//! # Roundtable Types
//!
//! Core data types for the Roundtable proof-of-turn chat log.
//!
//! This crate provides the two records every node exchanges:
//! - [`Message`] - an authored, signed chat payload with a stable ID
//! - [`Block`] - a typed, hash-chained, signed container for committed
//!   content, with its [`BlockData`] payload variants
//!
//! Hash preimages use a canonical RLP encoding so that every node derives
//! identical block hashes from identical content; wire encoding is a
//! structured map with base64 signatures and lowercase-hex hashes.
//!
//! ## Example
//!
//! ```rust
//! use roundtable_crypto::Keypair;
//! use roundtable_types::{Block, Message};
//!
//! let keypair = Keypair::generate();
//! let message = Message::create("hello".into(), "alice".into(), &keypair);
//! assert!(message.verify(&keypair.public_key()));
//!
//! let genesis = Block::genesis();
//! let block = Block::new_message_block(&genesis, message, "alice".into(), &keypair);
//! assert!(block.is_valid_successor(&genesis));
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod block;
pub mod message;
pub mod time;

// Re-export main types at crate root
pub use block::{Block, BlockData, BlockType, GENESIS_AUTHOR, GENESIS_PREVIOUS_HASH};
pub use message::Message;
pub use time::now_ms;
