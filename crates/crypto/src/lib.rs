//! # Roundtable Crypto
//!
//! Cryptographic primitives for the Roundtable proof-of-turn chat log.
//!
//! This crate provides the narrow facade the rest of the workspace signs
//! and hashes through:
//! - **Ed25519 signatures** - keypair generation, signing, verification
//! - **SHA-256 hashing** - lowercase-hex digests for block and message IDs
//! - **Message-ID derivation** - the stable identifier of a chat message
//!
//! ## Example
//!
//! ```rust
//! use roundtable_crypto::{sha256_hex, verify, Keypair};
//!
//! // Hash some data
//! let digest = sha256_hex(b"hello world");
//! assert_eq!(digest.len(), 64);
//!
//! // Generate a keypair and sign
//! let keypair = Keypair::generate();
//! let signature = keypair.sign(b"message");
//!
//! // Verify the signature
//! assert!(verify(&keypair.public_key(), b"message", &signature));
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod ed25519;
pub mod hash;

// Re-export commonly used items
pub use ed25519::{verify, Keypair, PublicKey, Signature};
pub use hash::{message_id, sha256_hex};

/// Errors that can occur when decoding cryptographic material.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// Invalid public key bytes
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    /// Invalid signature bytes
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    /// Invalid input length
    #[error("invalid input length: expected {expected}, got {actual}")]
    InvalidLength {
        /// Expected length in bytes
        expected: usize,
        /// Actual length in bytes
        actual: usize,
    },

    /// Hex decoding error
    #[error("hex decoding error: {0}")]
    Hex(#[from] hex::FromHexError),

    /// Base64 decoding error
    #[error("base64 decoding error: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Result type for cryptographic operations.
pub type Result<T> = std::result::Result<T, CryptoError>;
