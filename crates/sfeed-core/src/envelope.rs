//! # Export Envelope
//!
//! One wrapper shape for every bulk export and import: key backups, public
//! key listings and document collections all travel as
//!
//! ```json
//! {"version": "1.0", "exported": "2026-01-15T12:00:00Z", "entries": [...]}
//! ```
//!
//! Export and import go through the same type so the two paths cannot drift.

use serde::{Deserialize, Serialize};

use crate::error::IdentifierError;
use crate::temporal::Timestamp;

/// Envelope format version written by this build.
pub const ENVELOPE_VERSION: &str = "1.0";

/// Versioned, timestamped collection wrapper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportEnvelope<T> {
    /// Envelope format version.
    pub version: String,
    /// When the export was produced.
    pub exported: Timestamp,
    /// Exported entries, in export order.
    pub entries: Vec<T>,
}

impl<T> ExportEnvelope<T> {
    /// Wrap entries with the current version and time.
    pub fn new(entries: Vec<T>) -> Self {
        Self {
            version: ENVELOPE_VERSION.to_string(),
            exported: Timestamp::now(),
            entries,
        }
    }

    /// Check the envelope version before importing.
    pub fn check_version(&self) -> Result<(), IdentifierError> {
        if self.version == ENVELOPE_VERSION {
            Ok(())
        } else {
            Err(IdentifierError::UnsupportedEnvelopeVersion(
                self.version.clone(),
            ))
        }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the envelope carries no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
