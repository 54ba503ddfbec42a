//! # Roundtable Config
//!
//! Timing constants and node bootstrap configuration.
//!
//! The turn rotation only converges when every node runs with identical
//! constants and an identical ordered peer list, so both live in one
//! [`NodeConfig`] loaded from a single TOML file and validated up front.
//! [`TurnConfig`] carries the authoritative timing values with the
//! protocol defaults; `TurnConfig::fast()` shrinks them for tests.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod config;
pub mod error;

pub use config::{NodeConfig, TurnConfig};
pub use error::{ConfigError, ConfigResult};
