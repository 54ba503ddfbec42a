//! # Roundtable Consensus
//!
//! The proof-of-turn rotation state machine.
//!
//! Membership is a fixed, ordered peer list known to every node. A shared
//! leader index rotates through it on a timer: during its turn exactly one
//! peer is authorized to append blocks, and between turns a short
//! transition keeps handovers quiescent. Every node — leader or not —
//! runs the same rotation clock, so each one can always answer who the
//! current leader is.
//!
//! ```text
//!          +-- am_i_leader? --yes--> [leading]
//!    init--+                                \
//!          +-- no -> [waiting]               turn_timeout
//!                                             |
//!                                             v
//!                                        [transition]
//!                                             |
//!                                    transition_timeout
//!                                             |
//!                                             v
//!                                   advance leader_index
//!                                             |
//!                                   am_i_leader? --> yes → [leading]
//!                                                    no  → [waiting]
//! ```
//!
//! A leader defers publication to the end of its turn: pending pool
//! messages are drained into one singleton block each at `turn_timeout`.
//! An incoming leader first runs a **lost-message recovery scan** — any
//! message its pool observed during the previous turn window that the
//! chain never committed is bundled into a single recovery block. The two
//! passes together guarantee that every observed message is eventually
//! committed exactly once, as long as one of two consecutive leaders saw
//! it.
//!
//! The manager is a single logical actor: one inbound [`NodeEvent`] is
//! processed to completion before the next, timers post events into the
//! same mailbox, and no internal locks exist.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod event;
pub mod timer;
pub mod turn;

pub use event::{Control, NodeEvent};
pub use timer::{spawn_cleanup_tick, TurnTimers};
pub use turn::{NodeStatus, Phase, TurnManager};
