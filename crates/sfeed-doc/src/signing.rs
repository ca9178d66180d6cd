//! # Signing Pipeline
//!
//! Producer: validate, canonicalize without `signature`, sign with the
//! family's active private key, attach. The input is never modified; a
//! signed copy is returned.
//!
//! Consumer: canonicalize without `signature` and verify against the
//! author's public key. Verification never returns `Err`. A malformed key or
//! signature (`INVALID_KEY_FORMAT`) is reported separately from a signature
//! that does not match (`SIGNATURE_MISMATCH`).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use sfeed_core::{CanonicalBytes, KeyId, PublicKeyMaterial, SignatureMaterial};
use sfeed_crypto::{verify_with_public_key, BlobRepository, CryptoError, KeyManager, KeyPair};
use sfeed_schema::{validate, ValidationResult};

use crate::document::Feed;
use crate::error::SignError;

/// Name of the field that carries a signature and is excluded from the
/// signed bytes.
pub const SIGNATURE_FIELD: &str = "signature";

/// Why verification failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerifyFailure {
    MissingSignature,
    MissingPublicKey,
    /// A key or signature is mis-tagged, mis-sized or not a curve point.
    InvalidKeyFormat,
    /// Well-formed key and signature that do not match the content.
    SignatureMismatch,
    CanonicalizationFailed,
}

impl VerifyFailure {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::MissingSignature => "MISSING_SIGNATURE",
            Self::MissingPublicKey => "MISSING_PUBLIC_KEY",
            Self::InvalidKeyFormat => "INVALID_KEY_FORMAT",
            Self::SignatureMismatch => "SIGNATURE_MISMATCH",
            Self::CanonicalizationFailed => "CANONICALIZATION_FAILED",
        }
    }
}

impl std::fmt::Display for VerifyFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of verifying one signed object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyOutcome {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<VerifyFailure>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl VerifyOutcome {
    fn ok() -> Self {
        Self {
            valid: true,
            reason: None,
            detail: None,
        }
    }

    fn fail(reason: VerifyFailure, detail: impl Into<String>) -> Self {
        Self {
            valid: false,
            reason: Some(reason),
            detail: Some(detail.into()),
        }
    }
}

/// Verification outcome for one signed item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemVerification {
    pub index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub outcome: VerifyOutcome,
}

/// Structure, feed signature and item signatures of one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentVerification {
    pub validation: ValidationResult,
    pub signature: VerifyOutcome,
    /// One entry per item that carries a signature.
    pub items: Vec<ItemVerification>,
}

impl DocumentVerification {
    pub fn is_valid(&self) -> bool {
        self.validation.valid && self.signature.valid && self.items.iter().all(|i| i.outcome.valid)
    }
}

/// Signs documents with keys held by a [`KeyManager`].
pub struct SigningPipeline<'a, R: BlobRepository> {
    keys: &'a KeyManager<R>,
}

impl<'a, R: BlobRepository> SigningPipeline<'a, R> {
    pub fn new(keys: &'a KeyManager<R>) -> Self {
        Self { keys }
    }

    /// Validate and sign a document with the active key of `key_id`'s
    /// family. Returns the signed copy.
    pub fn sign(&self, document: &Value, key_id: &KeyId) -> Result<Value, SignError> {
        self.check(document)?;
        let key = self.signing_key(document, key_id)?;
        let mut signed = document.clone();
        attach_signature(&mut signed, &key)?;
        tracing::debug!(key_id = %key.key_id, "signed document");
        Ok(signed)
    }

    /// Sign every item, then the document. The document signature covers
    /// the item signatures.
    pub fn sign_items(&self, document: &Value, key_id: &KeyId) -> Result<Value, SignError> {
        self.check(document)?;
        let key = self.signing_key(document, key_id)?;
        let mut signed = document.clone();
        let mut count = 0usize;
        if let Some(items) = signed.get_mut("items").and_then(Value::as_array_mut) {
            for item in items.iter_mut() {
                attach_signature(item, &key)?;
                count += 1;
            }
        }
        attach_signature(&mut signed, &key)?;
        tracing::debug!(key_id = %key.key_id, items = count, "signed document and items");
        Ok(signed)
    }

    /// Typed form of [`sign`](Self::sign).
    pub fn sign_feed(&self, feed: &Feed, key_id: &KeyId) -> Result<Feed, SignError> {
        let signed = self.sign(&feed.to_value()?, key_id)?;
        Ok(Feed::from_value(signed)?)
    }

    fn check(&self, document: &Value) -> Result<(), SignError> {
        let result = validate(document);
        if result.valid {
            Ok(())
        } else {
            Err(SignError::Invalid(Box::new(result)))
        }
    }

    fn signing_key(&self, document: &Value, key_id: &KeyId) -> Result<KeyPair, SignError> {
        let key = self
            .keys
            .get_active_key_pair(key_id)?
            .ok_or_else(|| SignError::NoActiveKey(key_id.clone()))?;
        if let Some(claimed) = author_key_text(document) {
            // Validation has already checked the format.
            if let Ok(claimed) = PublicKeyMaterial::parse(claimed) {
                if claimed != key.public_key {
                    return Err(SignError::PublicKeyMismatch {
                        document: claimed,
                        key: key.public_key.clone(),
                    });
                }
            }
        }
        Ok(key)
    }
}

fn attach_signature(target: &mut Value, key: &KeyPair) -> Result<(), SignError> {
    let canonical = CanonicalBytes::excluding_field(target, SIGNATURE_FIELD)?;
    let signature = key.private_key.sign(&canonical);
    if let Some(obj) = target.as_object_mut() {
        obj.insert(
            SIGNATURE_FIELD.to_string(),
            Value::String(signature.to_tagged_string()),
        );
    }
    Ok(())
}

fn author_key_text(document: &Value) -> Option<&str> {
    document.get("author")?.get("public_key")?.as_str()
}

/// Verify a document's signature against its author's public key.
pub fn verify(document: &Value) -> VerifyOutcome {
    let Some(key_text) = author_key_text(document) else {
        return VerifyOutcome::fail(
            VerifyFailure::MissingPublicKey,
            "document has no author.public_key",
        );
    };
    match PublicKeyMaterial::parse(key_text) {
        Ok(key) => verify_with_key(document, &key),
        Err(e) => VerifyOutcome::fail(VerifyFailure::InvalidKeyFormat, format!("public key: {e}")),
    }
}

/// Verify a signed object against a known public key.
pub fn verify_with_key(document: &Value, public_key: &PublicKeyMaterial) -> VerifyOutcome {
    let Some(sig_value) = document.get(SIGNATURE_FIELD) else {
        return VerifyOutcome::fail(VerifyFailure::MissingSignature, "no signature field");
    };
    let Some(sig_text) = sig_value.as_str() else {
        return VerifyOutcome::fail(VerifyFailure::InvalidKeyFormat, "signature is not a string");
    };
    let signature = match SignatureMaterial::parse(sig_text) {
        Ok(sig) => sig,
        Err(e) => {
            return VerifyOutcome::fail(VerifyFailure::InvalidKeyFormat, format!("signature: {e}"))
        }
    };
    let canonical = match CanonicalBytes::excluding_field(document, SIGNATURE_FIELD) {
        Ok(c) => c,
        Err(e) => return VerifyOutcome::fail(VerifyFailure::CanonicalizationFailed, e.to_string()),
    };
    let outcome = match verify_with_public_key(&canonical, &signature, public_key) {
        Ok(()) => VerifyOutcome::ok(),
        Err(CryptoError::VerificationFailed(e)) => {
            VerifyOutcome::fail(VerifyFailure::SignatureMismatch, e)
        }
        Err(e) => VerifyOutcome::fail(VerifyFailure::InvalidKeyFormat, e.to_string()),
    };
    tracing::debug!(valid = outcome.valid, reason = ?outcome.reason, "verified signature");
    outcome
}

/// Validate a document and verify its signature and every item signature.
/// Items verify against the document author's key.
pub fn verify_document(document: &Value) -> DocumentVerification {
    let validation = validate(document);
    let signature = verify(document);
    let author_key = author_key_text(document).and_then(|k| PublicKeyMaterial::parse(k).ok());

    let mut items = Vec::new();
    if let Some(entries) = document.get("items").and_then(Value::as_array) {
        for (index, item) in entries.iter().enumerate() {
            if item.get(SIGNATURE_FIELD).is_none() {
                continue;
            }
            let outcome = match &author_key {
                Some(key) => verify_with_key(item, key),
                None => VerifyOutcome::fail(
                    VerifyFailure::MissingPublicKey,
                    "document has no usable author.public_key",
                ),
            };
            items.push(ItemVerification {
                index,
                id: item.get("id").and_then(Value::as_str).map(str::to_string),
                outcome,
            });
        }
    }

    DocumentVerification {
        validation,
        signature,
        items,
    }
}
