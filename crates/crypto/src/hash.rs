//! SHA-256 hashing and message-ID derivation.

use sha2::{Digest, Sha256};

/// Computes the SHA-256 digest of `data` as a lowercase hex string.
///
/// All hashes in the protocol (block hashes, message IDs) are carried in
/// this form on the wire.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Derives the stable identifier of a chat message.
///
/// The ID is the SHA-256 hex digest of `content`, `author_id` and the
/// decimal millisecond timestamp, concatenated without separators. It is
/// deterministic and serves as the primary key in the message pool.
pub fn message_id(content: &str, author_id: &str, timestamp_ms: u64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hasher.update(author_id.as_bytes());
    hasher.update(timestamp_ms.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_hex_is_lowercase() {
        let digest = sha256_hex(b"Roundtable");
        assert_eq!(digest, digest.to_lowercase());
        assert_eq!(digest.len(), 64);
    }

    #[test]
    fn test_message_id_deterministic() {
        let a = message_id("hello", "alice", 42);
        let b = message_id("hello", "alice", 42);
        assert_eq!(a, b);
    }

    #[test]
    fn test_message_id_sensitive_to_every_part() {
        let base = message_id("hello", "alice", 42);
        assert_ne!(base, message_id("hello!", "alice", 42));
        assert_ne!(base, message_id("hello", "bob", 42));
        assert_ne!(base, message_id("hello", "alice", 43));
    }
}
