//! # Storage Encryption (Argon2id + XChaCha20-Poly1305)
//!
//! Private key material reaches durable storage only as an [`EncryptedBlob`]:
//! ciphertext, nonce and authentication tag, each hex encoded.
//!
//! ## Key derivation
//!
//! The storage key is derived from an installation secret with Argon2id. The
//! salt is an [`InstallationSalt`]: 32 random bytes generated once when a
//! store is first created and persisted beside the blobs. It is never derived
//! from the encrypted data and never varies per record, so the derived key is
//! stable across restarts and derivation runs once per process.
//!
//! ## Binding
//!
//! Every seal takes associated data. The key store passes the key id, so a
//! blob copied under another id fails authentication instead of loading as
//! the wrong key.

use argon2::{Algorithm, Argon2, Params, Version};
use chacha20poly1305::aead::{AeadInPlace, KeyInit};
use chacha20poly1305::{Tag, XChaCha20Poly1305, XNonce};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::KeyStoreError;

/// Installation salt length in bytes.
pub const SALT_LEN: usize = 32;
/// XChaCha20-Poly1305 nonce length in bytes.
pub const NONCE_LEN: usize = 24;
/// Poly1305 tag length in bytes.
pub const TAG_LEN: usize = 16;
/// Derived key length in bytes.
const KEY_LEN: usize = 32;

/// Argon2id cost parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Memory cost in KiB.
    pub m_cost: u32,
    /// Iterations.
    pub t_cost: u32,
    /// Lanes.
    pub p_cost: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            m_cost: 65536,
            t_cost: 3,
            p_cost: 4,
        }
    }
}

/// Per-installation random salt for storage key derivation.
#[derive(Clone, PartialEq, Eq)]
pub struct InstallationSalt([u8; SALT_LEN]);

impl InstallationSalt {
    /// Generate a fresh random salt.
    pub fn generate() -> Self {
        let mut salt = [0u8; SALT_LEN];
        rand::rngs::OsRng.fill_bytes(&mut salt);
        Self(salt)
    }

    /// Wrap existing salt bytes.
    pub fn from_bytes(bytes: [u8; SALT_LEN]) -> Self {
        Self(bytes)
    }

    /// Parse the hex form persisted on disk.
    pub fn from_hex(s: &str) -> Result<Self, KeyStoreError> {
        let bytes = hex::decode(s.trim()).map_err(|e| KeyStoreError::Salt(e.to_string()))?;
        let arr: [u8; SALT_LEN] = bytes.as_slice().try_into().map_err(|_| {
            KeyStoreError::Salt(format!("expected {SALT_LEN} bytes, got {}", bytes.len()))
        })?;
        Ok(Self(arr))
    }

    /// Hex form for persistence.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Raw salt bytes.
    pub fn as_bytes(&self) -> &[u8; SALT_LEN] {
        &self.0
    }
}

impl std::fmt::Debug for InstallationSalt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "InstallationSalt({}...)", &self.to_hex()[..8])
    }
}

/// Authenticated ciphertext as written to storage.
///
/// Wire form: `{"encrypted": hex, "iv": hex, "authTag": hex}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedBlob {
    /// Ciphertext, hex.
    pub encrypted: String,
    /// Nonce, hex (24 bytes).
    pub iv: String,
    /// Poly1305 tag, hex (16 bytes).
    #[serde(rename = "authTag")]
    pub auth_tag: String,
}

/// Symmetric cipher holding the derived storage key.
pub struct StorageCipher {
    key: Zeroizing<[u8; KEY_LEN]>,
}

impl StorageCipher {
    /// Derive the storage key from a secret and salt with Argon2id.
    pub fn derive(
        secret: &[u8],
        salt: &InstallationSalt,
        params: &KdfParams,
    ) -> Result<Self, KeyStoreError> {
        let argon2_params = Params::new(params.m_cost, params.t_cost, params.p_cost, Some(KEY_LEN))
            .map_err(|e| KeyStoreError::Kdf(format!("invalid Argon2 parameters: {e}")))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params);
        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        argon2
            .hash_password_into(secret, salt.as_bytes(), key.as_mut())
            .map_err(|e| KeyStoreError::Kdf(e.to_string()))?;
        Ok(Self { key })
    }

    fn aead(&self) -> Result<XChaCha20Poly1305, KeyStoreError> {
        XChaCha20Poly1305::new_from_slice(self.key.as_ref())
            .map_err(|e| KeyStoreError::Encryption(e.to_string()))
    }

    /// Encrypt with a fresh random nonce.
    pub fn seal(&self, plaintext: &[u8], aad: &[u8]) -> Result<EncryptedBlob, KeyStoreError> {
        let mut nonce = [0u8; NONCE_LEN];
        rand::rngs::OsRng.fill_bytes(&mut nonce);

        let mut buffer = plaintext.to_vec();
        let tag = self
            .aead()?
            .encrypt_in_place_detached(XNonce::from_slice(&nonce), aad, &mut buffer)
            .map_err(|e| KeyStoreError::Encryption(e.to_string()))?;

        Ok(EncryptedBlob {
            encrypted: hex::encode(&buffer),
            iv: hex::encode(nonce),
            auth_tag: hex::encode(tag),
        })
    }

    /// Decrypt and authenticate a blob.
    ///
    /// Any failure (bad hex, wrong lengths, tag mismatch) is an
    /// [`KeyStoreError::Integrity`] error naming `context`.
    pub fn open(
        &self,
        blob: &EncryptedBlob,
        aad: &[u8],
        context: &str,
    ) -> Result<Zeroizing<Vec<u8>>, KeyStoreError> {
        let decode = |field: &str, value: &str| {
            hex::decode(value)
                .map_err(|e| KeyStoreError::integrity(context, format!("{field} is not hex: {e}")))
        };
        let nonce = decode("iv", &blob.iv)?;
        let tag = decode("authTag", &blob.auth_tag)?;
        let mut buffer = Zeroizing::new(decode("encrypted", &blob.encrypted)?);

        if nonce.len() != NONCE_LEN {
            return Err(KeyStoreError::integrity(
                context,
                format!("iv must be {NONCE_LEN} bytes, got {}", nonce.len()),
            ));
        }
        if tag.len() != TAG_LEN {
            return Err(KeyStoreError::integrity(
                context,
                format!("authTag must be {TAG_LEN} bytes, got {}", tag.len()),
            ));
        }

        self.aead()?
            .decrypt_in_place_detached(
                XNonce::from_slice(&nonce),
                aad,
                buffer.as_mut_slice(),
                Tag::from_slice(&tag),
            )
            .map_err(|_| KeyStoreError::integrity(context, "authentication tag mismatch"))?;
        Ok(buffer)
    }
}

impl std::fmt::Debug for StorageCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "StorageCipher(<derived key>)")
    }
}

#[cfg(test)]
pub(crate) fn light_params() -> KdfParams {
    KdfParams {
        m_cost: 1024,
        t_cost: 1,
        p_cost: 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cipher(secret: &[u8], salt: &InstallationSalt) -> StorageCipher {
        StorageCipher::derive(secret, salt, &light_params()).expect("derive")
    }

    #[test]
    fn seal_open_roundtrip() {
        let salt = InstallationSalt::generate();
        let c = cipher(b"secret", &salt);
        let blob = c.seal(b"key material", b"alice").unwrap();
        assert_eq!(hex::decode(&blob.iv).unwrap().len(), NONCE_LEN);
        assert_eq!(hex::decode(&blob.auth_tag).unwrap().len(), TAG_LEN);
        let plain = c.open(&blob, b"alice", "alice").unwrap();
        assert_eq!(plain.as_slice(), b"key material");
    }

    #[test]
    fn fresh_nonce_per_seal() {
        let c = cipher(b"secret", &InstallationSalt::generate());
        let a = c.seal(b"same", b"id").unwrap();
        let b = c.seal(b"same", b"id").unwrap();
        assert_ne!(a.iv, b.iv);
        assert_ne!(a.encrypted, b.encrypted);
    }

    #[test]
    fn derivation_is_stable_for_same_salt() {
        let salt = InstallationSalt::generate();
        let blob = cipher(b"secret", &salt).seal(b"payload", b"id").unwrap();
        let reopened = cipher(b"secret", &salt).open(&blob, b"id", "id").unwrap();
        assert_eq!(reopened.as_slice(), b"payload");
    }

    #[test]
    fn wrong_secret_is_integrity_failure() {
        let salt = InstallationSalt::generate();
        let blob = cipher(b"right", &salt).seal(b"payload", b"id").unwrap();
        let err = cipher(b"wrong", &salt).open(&blob, b"id", "id").unwrap_err();
        assert!(matches!(err, KeyStoreError::Integrity { .. }));
    }

    #[test]
    fn aad_binds_blob_to_id() {
        let c = cipher(b"secret", &InstallationSalt::generate());
        let blob = c.seal(b"payload", b"alice").unwrap();
        assert!(c.open(&blob, b"mallory", "mallory").is_err());
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let c = cipher(b"secret", &InstallationSalt::generate());
        let mut blob = c.seal(b"payload", b"id").unwrap();
        let mut bytes = hex::decode(&blob.encrypted).unwrap();
        bytes[0] ^= 0x01;
        blob.encrypted = hex::encode(bytes);
        assert!(matches!(
            c.open(&blob, b"id", "id"),
            Err(KeyStoreError::Integrity { .. })
        ));
    }

    #[test]
    fn malformed_fields_fail_without_panicking() {
        let c = cipher(b"secret", &InstallationSalt::generate());
        let mut blob = c.seal(b"payload", b"id").unwrap();
        blob.iv = "abcd".into();
        assert!(c.open(&blob, b"id", "id").is_err());
        blob.iv = "zz".into();
        assert!(c.open(&blob, b"id", "id").is_err());
    }

    #[test]
    fn blob_wire_names() {
        let c = cipher(b"secret", &InstallationSalt::generate());
        let blob = c.seal(b"x", b"id").unwrap();
        let v = serde_json::to_value(&blob).unwrap();
        assert!(v.get("encrypted").is_some());
        assert!(v.get("iv").is_some());
        assert!(v.get("authTag").is_some());
    }

    #[test]
    fn salt_hex_roundtrip() {
        let salt = InstallationSalt::generate();
        assert_eq!(InstallationSalt::from_hex(&salt.to_hex()).unwrap(), salt);
        assert!(InstallationSalt::from_hex("abcd").is_err());
    }

    #[test]
    fn invalid_kdf_params_rejected() {
        let params = KdfParams {
            m_cost: 1,
            t_cost: 0,
            p_cost: 1,
        };
        let err = StorageCipher::derive(b"s", &InstallationSalt::generate(), &params).unwrap_err();
        assert!(matches!(err, KeyStoreError::Kdf(_)));
    }
}
