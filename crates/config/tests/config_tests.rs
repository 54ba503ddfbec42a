//! Integration tests for configuration loading and validation.

use roundtable_config::{ConfigError, NodeConfig, TurnConfig};
use std::io::Write;

fn sample_toml() -> String {
    // Keys are hex-encoded 32-byte values; any well-formed key passes
    // config validation (signature checks happen at ingest).
    let key_a = "aa".repeat(32);
    let key_b = "bb".repeat(32);
    format!(
        r#"
node_id = "alice"
peers = ["alice", "bob"]

[peer_public_keys]
alice = "{key_a}"
bob = "{key_b}"

[turn]
turn_duration_ms = 30000
transition_duration_ms = 5000
message_retention_ms = 120000
cleanup_interval_ms = 60000
"#
    )
}

#[test]
fn test_defaults_match_protocol_constants() {
    let turn = TurnConfig::default();
    assert_eq!(turn.turn_duration_ms, 30_000);
    assert_eq!(turn.transition_duration_ms, 5_000);
    assert_eq!(turn.message_retention_ms, 120_000);
    assert_eq!(turn.cleanup_interval_ms, 60_000);
    assert!(turn.validate().is_ok());
    assert_eq!(turn.recovery_window_ms(), 35_000);
}

#[test]
fn test_fast_config_validates() {
    assert!(TurnConfig::fast().validate().is_ok());
}

#[test]
fn test_retention_must_cover_two_turns() {
    let turn = TurnConfig {
        message_retention_ms: 30_000,
        ..TurnConfig::default()
    };
    assert!(matches!(turn.validate(), Err(ConfigError::Invalid(_))));
}

#[test]
fn test_parse_and_validate_from_toml() {
    let config = NodeConfig::from_toml(&sample_toml()).unwrap();
    assert_eq!(config.node_id, "alice");
    assert_eq!(config.peers, vec!["alice", "bob"]);
    assert_eq!(config.turn, TurnConfig::default());

    let keys = config.public_keys().unwrap();
    assert_eq!(keys.len(), 2);
    assert!(keys.contains_key("bob"));
}

#[test]
fn test_turn_section_is_optional() {
    let toml = sample_toml().lines().take_while(|l| !l.starts_with("[turn]")).collect::<Vec<_>>().join("\n");
    let config = NodeConfig::from_toml(&toml).unwrap();
    assert_eq!(config.turn, TurnConfig::default());
}

#[test]
fn test_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(sample_toml().as_bytes()).unwrap();
    let config = NodeConfig::load(file.path()).unwrap();
    assert_eq!(config.node_id, "alice");
}

#[test]
fn test_node_must_be_a_member() {
    let toml = sample_toml().replace("node_id = \"alice\"", "node_id = \"mallory\"");
    assert!(matches!(
        NodeConfig::from_toml(&toml),
        Err(ConfigError::Invalid(_))
    ));
}

#[test]
fn test_missing_peer_key_rejected() {
    let toml = sample_toml().replace(&format!("bob = \"{}\"\n", "bb".repeat(32)), "");
    assert!(matches!(
        NodeConfig::from_toml(&toml),
        Err(ConfigError::Invalid(_))
    ));
}

#[test]
fn test_malformed_peer_key_rejected() {
    let toml = sample_toml().replace(&"bb".repeat(32), "not-hex");
    assert!(matches!(
        NodeConfig::from_toml(&toml),
        Err(ConfigError::InvalidPeerKey { .. })
    ));
}

#[test]
fn test_duplicate_peer_rejected() {
    let toml = sample_toml().replace(
        "peers = [\"alice\", \"bob\"]",
        "peers = [\"alice\", \"bob\", \"bob\"]",
    );
    assert!(matches!(
        NodeConfig::from_toml(&toml),
        Err(ConfigError::Invalid(_))
    ));
}
