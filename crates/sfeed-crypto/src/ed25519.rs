//! # Ed25519 Signing and Verification
//!
//! Key generation, signing and verification for documents and items.
//!
//! ## Security Invariant
//!
//! - Signing input MUST be `&CanonicalBytes`. You cannot sign raw bytes,
//!   so every signature covers the canonical form of its object.
//! - `SigningKey` does not implement `Serialize`, and its `Debug` output is
//!   redacted. The seed is reachable only through the crate-private
//!   [`SigningKey::seed()`] used by the key store when sealing.
//! - Key material is zeroized on drop (dalek's `zeroize` feature).

use ed25519_dalek::{Signer, Verifier};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use sfeed_core::{CanonicalBytes, PublicKeyMaterial, SignatureMaterial};

use crate::error::CryptoError;

/// An Ed25519 signing key.
pub struct SigningKey {
    inner: ed25519_dalek::SigningKey,
}

impl SigningKey {
    /// Generate a new random key using the OS CSPRNG.
    pub fn generate() -> Self {
        let mut csprng = rand::rngs::OsRng;
        Self {
            inner: ed25519_dalek::SigningKey::generate(&mut csprng),
        }
    }

    /// Create a key from a raw 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            inner: ed25519_dalek::SigningKey::from_bytes(seed),
        }
    }

    /// The tagged public key for this signing key.
    pub fn public_key(&self) -> PublicKeyMaterial {
        PublicKeyMaterial::Ed25519(self.inner.verifying_key().to_bytes())
    }

    /// The verifying key for this signing key.
    pub fn verifying_key(&self) -> VerifyingKey {
        VerifyingKey {
            inner: self.inner.verifying_key(),
        }
    }

    /// Sign canonical bytes.
    pub fn sign(&self, data: &CanonicalBytes) -> SignatureMaterial {
        let sig = self.inner.sign(data.as_bytes());
        SignatureMaterial::Ed25519(sig.to_bytes())
    }

    /// Raw seed, for sealing into an encrypted blob.
    pub(crate) fn seed(&self) -> Zeroizing<[u8; 32]> {
        Zeroizing::new(self.inner.to_bytes())
    }
}

impl Clone for SigningKey {
    fn clone(&self) -> Self {
        Self::from_seed(&self.seed())
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SigningKey(<private>)")
    }
}

/// An Ed25519 verifying key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifyingKey {
    inner: ed25519_dalek::VerifyingKey,
}

impl VerifyingKey {
    /// Decode a tagged public key, rejecting bytes that are not a valid
    /// curve point.
    pub fn from_public_key(key: &PublicKeyMaterial) -> Result<Self, CryptoError> {
        match key {
            PublicKeyMaterial::Ed25519(bytes) => ed25519_dalek::VerifyingKey::from_bytes(bytes)
                .map(|inner| Self { inner })
                .map_err(|e| CryptoError::InvalidPublicKey(e.to_string())),
        }
    }

    /// The tagged public key.
    pub fn public_key(&self) -> PublicKeyMaterial {
        PublicKeyMaterial::Ed25519(self.inner.to_bytes())
    }

    /// Verify a signature over canonical bytes.
    pub fn verify(
        &self,
        data: &CanonicalBytes,
        signature: &SignatureMaterial,
    ) -> Result<(), CryptoError> {
        match signature {
            SignatureMaterial::Ed25519(bytes) => {
                let sig = ed25519_dalek::Signature::from_bytes(bytes);
                self.inner
                    .verify(data.as_bytes(), &sig)
                    .map_err(|e| CryptoError::VerificationFailed(e.to_string()))
            }
        }
    }
}

/// Verify a signature against a tagged public key.
///
/// Algorithm mismatches and undecodable keys are reported as such, not as
/// a failed verification.
pub fn verify_with_public_key(
    data: &CanonicalBytes,
    signature: &SignatureMaterial,
    public_key: &PublicKeyMaterial,
) -> Result<(), CryptoError> {
    if signature.algorithm() != public_key.algorithm() {
        return Err(CryptoError::AlgorithmMismatch {
            key: public_key.algorithm().tag(),
            signature: signature.algorithm().tag(),
        });
    }
    VerifyingKey::from_public_key(public_key)?.verify(data, signature)
}

/// SHA-256 fingerprint of a public key's raw bytes, lowercase hex.
pub fn fingerprint(public_key: &PublicKeyMaterial) -> String {
    hex::encode(Sha256::digest(public_key.as_bytes()))
}
