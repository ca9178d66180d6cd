//! # Cryptographic Error Types
//!
//! Structured errors for signing, storage and key lifecycle operations.
//!
//! The split mirrors who is at fault:
//!
//! - [`CryptoError`]: a signature or key did not check out.
//! - [`KeyStoreError`]: the storage layer failed. `Integrity` is always a
//!   hard error and is never folded into "not found".
//! - [`KeyManagerError`]: the caller asked for an impossible lifecycle
//!   transition (duplicate create, rotate of a missing key).

use sfeed_core::{IdentifierError, KeyId, TaggedValueError};
use thiserror::Error;

/// Errors from signing and verification primitives.
#[derive(Error, Debug)]
pub enum CryptoError {
    /// The signature does not match the message and key.
    #[error("Ed25519 verification failed: {0}")]
    VerificationFailed(String),

    /// The public key bytes are not a valid key for the algorithm.
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    /// Key and signature were produced by different algorithms.
    #[error("algorithm mismatch: key is {key}, signature is {signature}")]
    AlgorithmMismatch {
        /// Algorithm tag of the key.
        key: &'static str,
        /// Algorithm tag of the signature.
        signature: &'static str,
    },

    /// A tagged string failed to parse.
    #[error("malformed key material: {0}")]
    Malformed(#[from] TaggedValueError),
}

/// Errors from the encrypted key store.
#[derive(Error, Debug)]
pub enum KeyStoreError {
    /// Decryption or authentication of a stored blob failed.
    #[error("integrity failure for key {key_id}: {reason}")]
    Integrity {
        /// The key whose blob failed.
        key_id: String,
        /// What failed.
        reason: String,
    },

    /// The blob decrypted but the key material inside is malformed.
    #[error("invalid key format for key {key_id}: {reason}")]
    InvalidKeyFormat {
        /// The key whose material is malformed.
        key_id: String,
        /// What was wrong with it.
        reason: String,
    },

    /// Key derivation failed (bad parameters or resource exhaustion).
    #[error("key derivation failed: {0}")]
    Kdf(String),

    /// Encryption failed.
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// The secret does not open this installation's check value.
    #[error("installation secret does not match this key store")]
    WrongSecret,

    /// A backup envelope could not be opened.
    #[error("backup integrity failure: {0}")]
    BackupIntegrity(String),

    /// The installation salt file is missing or malformed.
    #[error("installation salt error: {0}")]
    Salt(String),

    /// A key identifier read back from storage is invalid.
    #[error("invalid key id: {0}")]
    InvalidKeyId(#[from] IdentifierError),

    /// JSON encoding or decoding of a record failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error from a durable repository.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl KeyStoreError {
    /// Shorthand for an integrity failure.
    pub fn integrity(key_id: impl std::fmt::Display, reason: impl Into<String>) -> Self {
        Self::Integrity {
            key_id: key_id.to_string(),
            reason: reason.into(),
        }
    }
}

/// Errors from key lifecycle operations.
#[derive(Error, Debug)]
pub enum KeyManagerError {
    /// A key (or a member of its rotation family) already exists.
    #[error("key {0} already exists")]
    DuplicateKey(KeyId),

    /// The requested key does not exist.
    #[error("key {0} not found")]
    KeyNotFound(KeyId),

    /// The rotation family has no active member to rotate from.
    #[error("key family {0} has no active key")]
    NoActiveKey(KeyId),

    /// Stored key material is corrupt or mis-tagged.
    #[error("invalid key format for {key_id}: {reason}")]
    InvalidKeyFormat {
        /// The affected key.
        key_id: KeyId,
        /// What was wrong.
        reason: String,
    },

    /// An identifier could not be built.
    #[error("invalid key id: {0}")]
    InvalidKeyId(#[from] IdentifierError),

    /// The underlying store failed.
    #[error("key store error: {0}")]
    Store(#[from] KeyStoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integrity_display_names_key() {
        let err = KeyStoreError::integrity("alice", "tag mismatch");
        let msg = err.to_string();
        assert!(msg.contains("alice"));
        assert!(msg.contains("tag mismatch"));
    }

    #[test]
    fn io_error_from_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = KeyStoreError::from(io_err);
        assert!(err.to_string().contains("denied"));
    }

    #[test]
    fn manager_error_wraps_store_error() {
        let err = KeyManagerError::from(KeyStoreError::Kdf("m_cost too low".into()));
        assert!(matches!(err, KeyManagerError::Store(KeyStoreError::Kdf(_))));
    }

    #[test]
    fn duplicate_key_display() {
        let id = KeyId::new("alice").unwrap();
        assert_eq!(KeyManagerError::DuplicateKey(id).to_string(), "key alice already exists");
    }
}
