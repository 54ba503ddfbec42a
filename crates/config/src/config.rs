//! Turn timing and node bootstrap configuration.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use roundtable_crypto::PublicKey;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ConfigError, ConfigResult};

/// Authoritative turn timing constants.
///
/// These values must match on every node in the group: turn boundaries
/// are approximately aligned only because all nodes share the constants
/// and start from the same leader index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnConfig {
    /// Length of a leader's turn in milliseconds
    pub turn_duration_ms: u64,
    /// Quiescent interval between turns in milliseconds
    pub transition_duration_ms: u64,
    /// Pool retention window in milliseconds (two turns plus buffer)
    pub message_retention_ms: u64,
    /// Interval of the pool cleanup tick in milliseconds
    pub cleanup_interval_ms: u64,
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            turn_duration_ms: 30_000,
            transition_duration_ms: 5_000,
            message_retention_ms: 120_000,
            cleanup_interval_ms: 60_000,
        }
    }
}

impl TurnConfig {
    /// A sub-second configuration for tests and local experiments.
    pub fn fast() -> Self {
        Self {
            turn_duration_ms: 500,
            transition_duration_ms: 200,
            message_retention_ms: 2_000,
            cleanup_interval_ms: 1_000,
        }
    }

    /// Validates that the timing values are internally consistent.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.turn_duration_ms == 0 {
            return Err(ConfigError::Invalid("turn_duration_ms must be positive".into()));
        }
        if self.transition_duration_ms == 0 {
            return Err(ConfigError::Invalid(
                "transition_duration_ms must be positive".into(),
            ));
        }
        if self.cleanup_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "cleanup_interval_ms must be positive".into(),
            ));
        }
        if self.message_retention_ms < 2 * self.turn_duration_ms {
            return Err(ConfigError::Invalid(format!(
                "message_retention_ms ({}) must cover at least two turns ({})",
                self.message_retention_ms,
                2 * self.turn_duration_ms
            )));
        }
        Ok(())
    }

    /// Turn duration as a [`Duration`].
    pub fn turn_duration(&self) -> Duration {
        Duration::from_millis(self.turn_duration_ms)
    }

    /// Transition duration as a [`Duration`].
    pub fn transition_duration(&self) -> Duration {
        Duration::from_millis(self.transition_duration_ms)
    }

    /// Cleanup tick interval as a [`Duration`].
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_millis(self.cleanup_interval_ms)
    }

    /// The recovery-scan window: one turn plus one transition.
    pub fn recovery_window_ms(&self) -> u64 {
        self.turn_duration_ms + self.transition_duration_ms
    }
}

/// Bootstrap inputs of a single node.
///
/// The ordered `peers` list and the key map must be identical on every
/// node; the node's own signing keypair is generated locally at init and
/// its public half distributed out of band.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// This node's identifier; must appear in `peers`
    pub node_id: String,
    /// Fixed, ordered membership shared by all nodes
    pub peers: Vec<String>,
    /// Hex-encoded Ed25519 public key per peer
    pub peer_public_keys: HashMap<String, String>,
    /// Turn timing; defaults to the protocol constants
    #[serde(default)]
    pub turn: TurnConfig,
}

impl NodeConfig {
    /// Loads and validates a configuration from a TOML file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        info!(?path, "loading node configuration");
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml(&content)
    }

    /// Parses and validates a configuration from a TOML string.
    pub fn from_toml(content: &str) -> ConfigResult<Self> {
        let config: NodeConfig = toml::from_str(content)?;
        config.validate()?;
        debug!(
            node_id = %config.node_id,
            peers = config.peers.len(),
            "node configuration parsed"
        );
        Ok(config)
    }

    /// Validates membership and key material.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.node_id.is_empty() {
            return Err(ConfigError::Invalid("node_id must not be empty".into()));
        }
        if self.peers.is_empty() {
            return Err(ConfigError::Invalid("peers must not be empty".into()));
        }
        if !self.peers.contains(&self.node_id) {
            return Err(ConfigError::Invalid(format!(
                "node_id {:?} is not a member of peers",
                self.node_id
            )));
        }
        let mut seen = std::collections::HashSet::new();
        for peer in &self.peers {
            if !seen.insert(peer) {
                return Err(ConfigError::Invalid(format!("duplicate peer {:?}", peer)));
            }
            if !self.peer_public_keys.contains_key(peer) {
                return Err(ConfigError::Invalid(format!(
                    "missing public key for peer {:?}",
                    peer
                )));
            }
        }
        // Decode eagerly so a malformed key fails at startup, not on the
        // first inbound message from that peer.
        self.public_keys()?;
        self.turn.validate()
    }

    /// Decodes the per-peer public keys into their typed form.
    pub fn public_keys(&self) -> ConfigResult<HashMap<String, PublicKey>> {
        self.peer_public_keys
            .iter()
            .map(|(peer, hex_key)| {
                PublicKey::from_hex(hex_key)
                    .map(|pk| (peer.clone(), pk))
                    .map_err(|e| ConfigError::InvalidPeerKey {
                        peer: peer.clone(),
                        reason: e.to_string(),
                    })
            })
            .collect()
    }
}
