//! # Error Types
//!
//! Errors raised by the foundational types. All errors use `thiserror`
//! for derive-based `Display` and `Error` implementations.
//!
//! Higher crates define their own enums and wrap these via `#[from]`.

use thiserror::Error;

/// Error during canonical serialization.
#[derive(Error, Debug)]
pub enum CanonicalizationError {
    /// The value nests deeper than the canonicalizer will follow.
    ///
    /// A `serde_json::Value` cannot be cyclic, so unbounded nesting is the
    /// only way to make the serializer recurse without end. It fails fast
    /// at this ceiling instead.
    #[error("value nesting exceeds the canonical depth limit of {limit}")]
    DepthExceeded {
        /// The configured depth ceiling.
        limit: usize,
    },

    /// Conversion of a Rust value into JSON failed.
    #[error("serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    /// Canonical output could not be parsed back into a JSON value.
    #[error("canonical text is not valid JSON: {0}")]
    InvalidCanonicalText(String),
}

/// Error while parsing a tagged `<algorithm>:<base64>` string.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaggedValueError {
    /// No `:` separator between the algorithm tag and the payload.
    #[error("expected `<algorithm>:<base64>`, found no `:` separator")]
    MissingSeparator,

    /// The algorithm tag is not one this build recognizes.
    #[error("unsupported algorithm tag `{0}`; expected `ed25519`")]
    UnknownAlgorithm(String),

    /// The payload is not standard base64.
    #[error("payload is not valid standard base64: {0}")]
    InvalidBase64(String),

    /// The decoded payload has the wrong length for the algorithm.
    #[error("{algorithm} {what} must be {expected} bytes, got {actual}")]
    WrongLength {
        /// Algorithm tag the length was checked against.
        algorithm: &'static str,
        /// What was being decoded ("public key", "signature").
        what: &'static str,
        /// Required byte length.
        expected: usize,
        /// Decoded byte length.
        actual: usize,
    },
}

impl TaggedValueError {
    /// Whether the failure is in the outer `<algorithm>:<base64>` shape, as
    /// opposed to a well-shaped value of the wrong size.
    pub fn is_pattern_error(&self) -> bool {
        !matches!(self, Self::WrongLength { .. })
    }
}

/// Error constructing or parsing a domain identifier or timestamp.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentifierError {
    /// A key identifier failed validation.
    #[error("invalid key id {id:?}: {reason}")]
    InvalidKeyId {
        /// The rejected identifier.
        id: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// A timestamp string failed to parse.
    #[error("invalid timestamp {value:?}: {reason}")]
    InvalidTimestamp {
        /// The rejected input.
        value: String,
        /// Parser diagnostic.
        reason: String,
    },

    /// An export envelope carried an unsupported version.
    #[error("unsupported envelope version {0:?}; expected \"1.0\"")]
    UnsupportedEnvelopeVersion(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_exceeded_names_limit() {
        let err = CanonicalizationError::DepthExceeded { limit: 128 };
        assert!(err.to_string().contains("128"));
    }

    #[test]
    fn wrong_length_is_not_a_pattern_error() {
        let err = TaggedValueError::WrongLength {
            algorithm: "ed25519",
            what: "public key",
            expected: 32,
            actual: 31,
        };
        assert!(!err.is_pattern_error());
        assert!(err.to_string().contains("32 bytes"));
        assert!(TaggedValueError::MissingSeparator.is_pattern_error());
    }

    #[test]
    fn unknown_algorithm_suggests_ed25519() {
        let err = TaggedValueError::UnknownAlgorithm("rsa".into());
        assert!(err.to_string().contains("ed25519"));
    }
}
