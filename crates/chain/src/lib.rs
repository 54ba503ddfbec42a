//! # Roundtable Chain
//!
//! The append-only, validated block sequence every node maintains.
//!
//! A [`Blockchain`] starts at the deterministic genesis anchor and grows
//! one structurally-validated block at a time. Beyond append it offers the
//! pure queries the turn rotation needs: time-window filters for the
//! recovery scan, committed-message-ID extraction, and whole-chain
//! validity for tamper detection.
//!
//! Convergence across nodes rests on the append rule alone: only one
//! leader produces blocks per turn window, and `previous_hash` linkage
//! forces followers to apply them in publication order.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod blockchain;

pub use blockchain::{Blockchain, ChainError, ChainResult};
