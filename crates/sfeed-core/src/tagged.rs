//! # Tagged Key Material
//!
//! Public keys and signatures travel as `<algorithm>:<base64>` strings. They
//! are parsed exactly once, at the boundary, into tagged variants carrying a
//! fixed-length byte buffer. Nothing downstream slices prefixed strings.
//!
//! Only `ed25519` is recognized. Other tags are reserved for future
//! algorithms and fail to parse with [`TaggedValueError::UnknownAlgorithm`].

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TaggedValueError;

/// Signature algorithms known to the format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyAlgorithm {
    /// Ed25519 (RFC 8032).
    Ed25519,
}

impl KeyAlgorithm {
    /// The tag used in `<algorithm>:<base64>` strings.
    pub const fn tag(&self) -> &'static str {
        match self {
            Self::Ed25519 => "ed25519",
        }
    }

    /// Raw public key length in bytes.
    pub const fn public_key_len(&self) -> usize {
        match self {
            Self::Ed25519 => 32,
        }
    }

    /// Raw signature length in bytes.
    pub const fn signature_len(&self) -> usize {
        match self {
            Self::Ed25519 => 64,
        }
    }

    /// Resolve an algorithm from its tag.
    pub fn from_tag(tag: &str) -> Result<Self, TaggedValueError> {
        match tag {
            "ed25519" => Ok(Self::Ed25519),
            other => Err(TaggedValueError::UnknownAlgorithm(other.to_string())),
        }
    }
}

impl std::fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// Split `<algorithm>:<base64>` and decode both halves.
fn split_tagged(s: &str) -> Result<(KeyAlgorithm, Vec<u8>), TaggedValueError> {
    let (tag, payload) = s.split_once(':').ok_or(TaggedValueError::MissingSeparator)?;
    let algorithm = KeyAlgorithm::from_tag(tag)?;
    let bytes = STANDARD
        .decode(payload)
        .map_err(|e| TaggedValueError::InvalidBase64(e.to_string()))?;
    Ok((algorithm, bytes))
}

fn encode_tagged(algorithm: KeyAlgorithm, bytes: &[u8]) -> String {
    format!("{}:{}", algorithm.tag(), STANDARD.encode(bytes))
}

// ---------------------------------------------------------------------------
// PublicKeyMaterial
// ---------------------------------------------------------------------------

/// A public key tagged with its algorithm.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum PublicKeyMaterial {
    /// 32-byte Ed25519 verifying key.
    Ed25519([u8; 32]),
}

impl PublicKeyMaterial {
    /// Parse `ed25519:<base64 of 32 bytes>`.
    pub fn parse(s: &str) -> Result<Self, TaggedValueError> {
        let (algorithm, bytes) = split_tagged(s)?;
        match algorithm {
            KeyAlgorithm::Ed25519 => {
                let arr: [u8; 32] =
                    bytes
                        .as_slice()
                        .try_into()
                        .map_err(|_| TaggedValueError::WrongLength {
                            algorithm: algorithm.tag(),
                            what: "public key",
                            expected: algorithm.public_key_len(),
                            actual: bytes.len(),
                        })?;
                Ok(Self::Ed25519(arr))
            }
        }
    }

    /// The algorithm of this key.
    pub fn algorithm(&self) -> KeyAlgorithm {
        match self {
            Self::Ed25519(_) => KeyAlgorithm::Ed25519,
        }
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Ed25519(b) => b,
        }
    }

    /// Render as `<algorithm>:<base64>`.
    pub fn to_tagged_string(&self) -> String {
        encode_tagged(self.algorithm(), self.as_bytes())
    }
}

impl std::fmt::Display for PublicKeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_tagged_string())
    }
}

impl std::fmt::Debug for PublicKeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PublicKeyMaterial({})", self.to_tagged_string())
    }
}

impl std::str::FromStr for PublicKeyMaterial {
    type Err = TaggedValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for PublicKeyMaterial {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_tagged_string())
    }
}

impl<'de> Deserialize<'de> for PublicKeyMaterial {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// SignatureMaterial
// ---------------------------------------------------------------------------

/// A signature tagged with its algorithm.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum SignatureMaterial {
    /// 64-byte Ed25519 signature.
    Ed25519([u8; 64]),
}

impl SignatureMaterial {
    /// Parse `ed25519:<base64 of 64 bytes>`.
    pub fn parse(s: &str) -> Result<Self, TaggedValueError> {
        let (algorithm, bytes) = split_tagged(s)?;
        match algorithm {
            KeyAlgorithm::Ed25519 => {
                let arr: [u8; 64] =
                    bytes
                        .as_slice()
                        .try_into()
                        .map_err(|_| TaggedValueError::WrongLength {
                            algorithm: algorithm.tag(),
                            what: "signature",
                            expected: algorithm.signature_len(),
                            actual: bytes.len(),
                        })?;
                Ok(Self::Ed25519(arr))
            }
        }
    }

    /// The algorithm that produced this signature.
    pub fn algorithm(&self) -> KeyAlgorithm {
        match self {
            Self::Ed25519(_) => KeyAlgorithm::Ed25519,
        }
    }

    /// Raw signature bytes.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Ed25519(b) => b,
        }
    }

    /// Render as `<algorithm>:<base64>`.
    pub fn to_tagged_string(&self) -> String {
        encode_tagged(self.algorithm(), self.as_bytes())
    }
}

impl std::fmt::Display for SignatureMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_tagged_string())
    }
}

impl std::fmt::Debug for SignatureMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = self.to_tagged_string();
        write!(f, "SignatureMaterial({}...)", &s[..s.len().min(20)])
    }
}

impl Serialize for SignatureMaterial {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_tagged_string())
    }
}

impl<'de> Deserialize<'de> for SignatureMaterial {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
