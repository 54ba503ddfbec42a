//! # Roundtable Pool
//!
//! Each node's local view of every valid chat message it has observed,
//! with per-message inclusion status.
//!
//! The [`MessagePool`] is pure state with no I/O: the event loop feeds it
//! validly-signed messages from the `messages` topic (or authored
//! locally), marks entries included as blocks commit them, and drains the
//! pending remainder at turn end. Time-window queries over the seen-at
//! stamps drive the new leader's lost-message recovery scan, and a
//! retention sweep evicts old entries on the cleanup tick.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod pool;

pub use pool::{MessagePool, PoolStats};
