//! Export and import of document collections.
//!
//! A collection is an [`ExportEnvelope`] of raw documents. Import checks
//! each document on its own: one bad document is reported and the rest are
//! still accepted.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use sfeed_core::ExportEnvelope;
use sfeed_schema::{validate, ValidationResult};

use crate::error::CollectionError;
use crate::signing::{verify_document, VerifyOutcome};

/// Wrap documents in a versioned envelope.
pub fn export(documents: &[Value]) -> ExportEnvelope<Value> {
    ExportEnvelope::new(documents.to_vec())
}

/// Why a document was turned away on import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RejectReason {
    Invalid { validation: ValidationResult },
    Unverified { outcome: VerifyOutcome },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedDocument {
    pub index: usize,
    pub reason: RejectReason,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportReport {
    pub accepted: Vec<Value>,
    pub rejected: Vec<RejectedDocument>,
}

/// Check every document in an envelope. With `require_signatures`, a
/// document whose own signature or any item signature fails is rejected.
pub fn import(
    envelope: ExportEnvelope<Value>,
    require_signatures: bool,
) -> Result<ImportReport, CollectionError> {
    envelope.check_version()?;
    let mut report = ImportReport::default();
    for (index, document) in envelope.entries.into_iter().enumerate() {
        match check(&document, require_signatures) {
            None => report.accepted.push(document),
            Some(reason) => {
                tracing::warn!(index, "rejected document on import");
                report.rejected.push(RejectedDocument { index, reason });
            }
        }
    }
    tracing::info!(
        accepted = report.accepted.len(),
        rejected = report.rejected.len(),
        "imported collection"
    );
    Ok(report)
}

/// Parse an envelope from JSON text, then [`import`] it.
pub fn import_str(text: &str, require_signatures: bool) -> Result<ImportReport, CollectionError> {
    let envelope: ExportEnvelope<Value> = serde_json::from_str(text)?;
    import(envelope, require_signatures)
}

fn check(document: &Value, require_signatures: bool) -> Option<RejectReason> {
    if !require_signatures {
        let validation = validate(document);
        return (!validation.valid).then_some(RejectReason::Invalid { validation });
    }
    let report = verify_document(document);
    if !report.validation.valid {
        return Some(RejectReason::Invalid {
            validation: report.validation,
        });
    }
    if !report.signature.valid {
        return Some(RejectReason::Unverified {
            outcome: report.signature,
        });
    }
    report
        .items
        .into_iter()
        .find(|i| !i.outcome.valid)
        .map(|i| RejectReason::Unverified { outcome: i.outcome })
}
