//! # Key Pair Records
//!
//! [`KeyPair`] is the privileged in-memory form of a stored key: it owns a
//! [`SigningKey`]. [`KeyPairInfo`] is the public view handed out by default;
//! it has no private field at all, so leaking the private key through a
//! non-privileged read is a type error rather than a convention.
//!
//! [`StoredKeyRecord`] is the plaintext that the key store seals. Key
//! material is held there as tagged strings and only parsed on load, so a
//! record with malformed material still decrypts and surfaces as
//! [`KeyStoreError::InvalidKeyFormat`] instead of an integrity failure.

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, Zeroizing};

use sfeed_core::{KeyAlgorithm, KeyId, PublicKeyMaterial, Timestamp};

use crate::ed25519::{fingerprint, SigningKey};
use crate::error::KeyStoreError;

/// Lifecycle state of a key pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyStatus {
    /// Usable for new signatures.
    Active,
    /// Superseded by a rotation; kept for verifying old signatures.
    Deprecated,
}

impl std::fmt::Display for KeyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => f.write_str("active"),
            Self::Deprecated => f.write_str("deprecated"),
        }
    }
}

/// Key metadata: rotation lineage plus free-form caller fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyMetadata {
    /// The key this one was rotated from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_key_id: Option<KeyId>,
    /// Public key of the predecessor, for verifying old signatures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_public_key: Option<PublicKeyMaterial>,
    /// Number of rotations in this key's lineage.
    #[serde(default)]
    pub rotation_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotated_at: Option<Timestamp>,
    /// Caller-supplied fields, kept under their own `custom` object so
    /// they never shadow lineage fields.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom: BTreeMap<String, serde_json::Value>,
}

impl KeyMetadata {
    /// Metadata carrying only caller fields.
    pub fn with_custom(custom: BTreeMap<String, serde_json::Value>) -> Self {
        Self {
            custom,
            ..Self::default()
        }
    }
}

/// A key pair including its private key. Privileged.
#[derive(Clone)]
pub struct KeyPair {
    pub key_id: KeyId,
    /// Position in the rotation family, starting at 1.
    pub version: u32,
    pub public_key: PublicKeyMaterial,
    pub private_key: SigningKey,
    pub status: KeyStatus,
    pub created_at: Timestamp,
    pub deprecated_at: Option<Timestamp>,
    pub metadata: KeyMetadata,
}

impl KeyPair {
    /// Generate a fresh active key pair.
    pub fn generate(key_id: KeyId, version: u32, metadata: KeyMetadata) -> Self {
        let private_key = SigningKey::generate();
        Self {
            key_id,
            version,
            public_key: private_key.public_key(),
            private_key,
            status: KeyStatus::Active,
            created_at: Timestamp::now(),
            deprecated_at: None,
            metadata,
        }
    }

    /// The public view of this key pair.
    pub fn info(&self) -> KeyPairInfo {
        KeyPairInfo {
            key_id: self.key_id.clone(),
            version: self.version,
            public_key: self.public_key.clone(),
            fingerprint: fingerprint(&self.public_key),
            status: self.status,
            created_at: self.created_at,
            deprecated_at: self.deprecated_at,
            metadata: self.metadata.clone(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == KeyStatus::Active
    }

    pub(crate) fn to_record(&self) -> StoredKeyRecord {
        StoredKeyRecord {
            key_id: self.key_id.clone(),
            version: self.version,
            public_key: self.public_key.to_tagged_string(),
            private_key: encode_private_key(&self.private_key).to_string(),
            status: self.status,
            created_at: self.created_at,
            deprecated_at: self.deprecated_at,
            metadata: self.metadata.clone(),
        }
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("key_id", &self.key_id)
            .field("version", &self.version)
            .field("public_key", &self.public_key)
            .field("private_key", &self.private_key)
            .field("status", &self.status)
            .finish()
    }
}

/// Public view of a key pair. Carries no private material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyPairInfo {
    pub key_id: KeyId,
    pub version: u32,
    pub public_key: PublicKeyMaterial,
    /// SHA-256 of the raw public key, hex.
    pub fingerprint: String,
    pub status: KeyStatus,
    pub created_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deprecated_at: Option<Timestamp>,
    pub metadata: KeyMetadata,
}

/// Sealed plaintext form of a key pair.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StoredKeyRecord {
    pub key_id: KeyId,
    pub version: u32,
    pub public_key: String,
    pub private_key: String,
    pub status: KeyStatus,
    pub created_at: Timestamp,
    #[serde(default)]
    pub deprecated_at: Option<Timestamp>,
    #[serde(default)]
    pub metadata: KeyMetadata,
}

impl Drop for StoredKeyRecord {
    fn drop(&mut self) {
        self.private_key.zeroize();
    }
}

impl StoredKeyRecord {
    /// Parse the tagged key material back into a [`KeyPair`].
    pub(crate) fn into_key_pair(self) -> Result<KeyPair, KeyStoreError> {
        let invalid = |reason: String| KeyStoreError::InvalidKeyFormat {
            key_id: self.key_id.to_string(),
            reason,
        };
        let public_key = PublicKeyMaterial::parse(&self.public_key)
            .map_err(|e| invalid(format!("public key: {e}")))?;
        let private_key =
            decode_private_key(&self.private_key).map_err(|e| invalid(format!("private key: {e}")))?;
        Ok(KeyPair {
            key_id: self.key_id.clone(),
            version: self.version,
            public_key,
            private_key,
            status: self.status,
            created_at: self.created_at,
            deprecated_at: self.deprecated_at,
            metadata: self.metadata.clone(),
        })
    }
}

/// Encode a signing key seed as `ed25519:<base64>`.
pub(crate) fn encode_private_key(key: &SigningKey) -> Zeroizing<String> {
    let seed = key.seed();
    Zeroizing::new(format!(
        "{}:{}",
        KeyAlgorithm::Ed25519.tag(),
        STANDARD.encode(seed.as_ref())
    ))
}

/// Decode `ed25519:<base64 seed>`.
pub(crate) fn decode_private_key(s: &str) -> Result<SigningKey, String> {
    let (tag, body) = s
        .split_once(':')
        .ok_or_else(|| "missing '<algorithm>:' prefix".to_string())?;
    let algorithm = KeyAlgorithm::from_tag(tag).map_err(|e| e.to_string())?;
    let bytes = Zeroizing::new(
        STANDARD
            .decode(body)
            .map_err(|e| format!("invalid base64: {e}"))?,
    );
    match algorithm {
        KeyAlgorithm::Ed25519 => {
            let seed: Zeroizing<[u8; 32]> = Zeroizing::new(
                bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| format!("expected 32 bytes, got {}", bytes.len()))?,
            );
            Ok(SigningKey::from_seed(&seed))
        }
    }
}
