//! # Roundtable Node
//!
//! The long-running node entity: one serialized event loop around a
//! [`roundtable_consensus::TurnManager`], fed by the broadcast transport
//! and timers, answered through a cloneable [`NodeHandle`].
//!
//! All state is in-memory; a restarted node reinitializes to genesis and
//! rejoins the rotation from the shared initial leader index.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::collections::HashMap;
//! use std::sync::Arc;
//! use roundtable_config::TurnConfig;
//! use roundtable_crypto::Keypair;
//! use roundtable_node::Node;
//! use roundtable_transport::MemoryBus;
//!
//! # async fn run() {
//! let keypair = Keypair::generate();
//! let mut keys = HashMap::new();
//! keys.insert("alice".to_string(), keypair.public_key());
//!
//! let bus = MemoryBus::new();
//! let node = Node::start(
//!     "alice".into(),
//!     vec!["alice".into()],
//!     keypair,
//!     keys,
//!     TurnConfig::default(),
//!     Arc::new(bus.clone()),
//!     bus.subscribe(),
//! );
//!
//! let message_id = node.handle().send_message("hello".into()).await.unwrap();
//! println!("submitted {message_id}");
//! node.shutdown().await;
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod node;

pub use node::{Node, NodeError, NodeHandle};
