//! Errors from the producer side of the pipeline.
//!
//! Verification does not use these: it always returns a
//! [`VerifyOutcome`](crate::VerifyOutcome).

use sfeed_core::{CanonicalizationError, IdentifierError, KeyId, PublicKeyMaterial};
use sfeed_crypto::KeyManagerError;
use sfeed_schema::ValidationResult;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SignError {
    /// The document failed validation. The full result is attached.
    #[error("document failed validation: {0}")]
    Invalid(Box<ValidationResult>),

    /// The key family has no active key.
    #[error("no active key for {0}")]
    NoActiveKey(KeyId),

    /// The document names a different author key than the signing key.
    #[error("author public key {document} does not match signing key {key}")]
    PublicKeyMismatch {
        document: PublicKeyMaterial,
        key: PublicKeyMaterial,
    },

    #[error("key manager error: {0}")]
    Keys(#[from] KeyManagerError),

    #[error("canonicalization failed: {0}")]
    Canonicalization(#[from] CanonicalizationError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors reading a document collection envelope.
#[derive(Error, Debug)]
pub enum CollectionError {
    #[error("unsupported collection envelope: {0}")]
    Envelope(#[from] IdentifierError),

    #[error("collection does not parse: {0}")]
    Json(#[from] serde_json::Error),
}
