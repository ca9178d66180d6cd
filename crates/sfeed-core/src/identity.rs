//! # Key Identifiers
//!
//! `KeyId` is the validated identifier for a key pair. Identifiers double as
//! file names in durable key stores, so the constructor restricts them to a
//! path-safe alphabet.
//!
//! ## Rotation families
//!
//! A rotation family is rooted at an id such as `alice`. Rotations produce
//! `alice_v2`, `alice_v3`, and so on. [`KeyId::family_root()`] recovers the
//! root from any member; [`KeyId::versioned()`] builds a member.

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::IdentifierError;

/// Maximum identifier length.
pub const MAX_KEY_ID_LEN: usize = 128;

/// Separator between a family root and a rotation version.
const VERSION_SEPARATOR: &str = "_v";

/// Validated key pair identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct KeyId(String);

impl KeyId {
    /// Validate and wrap an identifier.
    ///
    /// Accepts 1 to 128 characters from `[A-Za-z0-9_.-]`, not starting with
    /// `.` or `-`.
    pub fn new(id: impl Into<String>) -> Result<Self, IdentifierError> {
        let id = id.into();
        let reject = |reason| IdentifierError::InvalidKeyId {
            id: id.clone(),
            reason,
        };
        if id.is_empty() {
            return Err(reject("must not be empty"));
        }
        if id.len() > MAX_KEY_ID_LEN {
            return Err(reject("must be at most 128 characters"));
        }
        if id.starts_with('.') || id.starts_with('-') {
            return Err(reject("must not start with '.' or '-'"));
        }
        if !id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        {
            return Err(reject("may only contain ASCII letters, digits, '_', '.' and '-'"));
        }
        Ok(Self(id))
    }

    /// Build the family member `<root>_v<version>`.
    ///
    /// Version 1 is the root itself.
    pub fn versioned(root: &KeyId, version: u32) -> Result<Self, IdentifierError> {
        if version <= 1 {
            return Ok(root.clone());
        }
        Self::new(format!("{}{VERSION_SEPARATOR}{version}", root.0))
    }

    /// Access the identifier text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The rotation version encoded in the id, if it has a `_v<n>` suffix
    /// with `n >= 2`.
    pub fn version_suffix(&self) -> Option<u32> {
        let (_, suffix) = self.0.rsplit_once(VERSION_SEPARATOR)?;
        if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        suffix.parse::<u32>().ok().filter(|v| *v >= 2)
    }

    /// The family root: the id with any `_v<n>` rotation suffix removed.
    pub fn family_root(&self) -> KeyId {
        match self.version_suffix() {
            Some(_) => {
                let (root, _) = self
                    .0
                    .rsplit_once(VERSION_SEPARATOR)
                    .unwrap_or((self.0.as_str(), ""));
                KeyId(root.to_string())
            }
            None => self.clone(),
        }
    }

    /// Whether `self` belongs to the rotation family rooted at `root`.
    pub fn is_in_family_of(&self, root: &KeyId) -> bool {
        self == root || (self.version_suffix().is_some() && &self.family_root() == root)
    }
}

impl std::fmt::Display for KeyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for KeyId {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for KeyId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for KeyId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::new(s).map_err(serde::de::Error::custom)
    }
}
