//! # Validation Results
//!
//! Validation never fails with `Err`. It returns a [`ValidationResult`]
//! carrying every error and warning found in one pass, in evaluation order.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable, machine-readable issue codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueCode {
    MissingRequiredField,
    InvalidPattern,
    InvalidFormat,
    InvalidType,
    MissingContent,
    TooShort,
    TooLong,
    UnknownField,
    InvalidJson,
    DuplicateId,
    MissingRecommendedField,
    UnsignedDocument,
}

impl IssueCode {
    /// The wire form, e.g. `MISSING_REQUIRED_FIELD`.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::MissingRequiredField => "MISSING_REQUIRED_FIELD",
            Self::InvalidPattern => "INVALID_PATTERN",
            Self::InvalidFormat => "INVALID_FORMAT",
            Self::InvalidType => "INVALID_TYPE",
            Self::MissingContent => "MISSING_CONTENT",
            Self::TooShort => "TOO_SHORT",
            Self::TooLong => "TOO_LONG",
            Self::UnknownField => "UNKNOWN_FIELD",
            Self::InvalidJson => "INVALID_JSON",
            Self::DuplicateId => "DUPLICATE_ID",
            Self::MissingRecommendedField => "MISSING_RECOMMENDED_FIELD",
            Self::UnsignedDocument => "UNSIGNED_DOCUMENT",
        }
    }
}

impl fmt::Display for IssueCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One error or warning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub code: IssueCode,
    /// Dot-delimited path, e.g. `items.0.url`. Empty for the document root.
    #[serde(rename = "field")]
    pub path: String,
    pub message: String,
    /// Suggested remediations. Never empty.
    pub suggestions: Vec<String>,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = if self.path.is_empty() { "(root)" } else { &self.path };
        write!(f, "[{}] {}: {}", self.code, path, self.message)
    }
}

/// Outcome of validating one document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    pub(crate) fn from_issues(errors: Vec<ValidationIssue>, warnings: Vec<ValidationIssue>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
            warnings,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Errors with the given code.
    pub fn errors_with_code(&self, code: IssueCode) -> impl Iterator<Item = &ValidationIssue> {
        self.errors.iter().filter(move |e| e.code == code)
    }

    /// Whether an error with `code` exists at exactly `path`.
    pub fn has_error(&self, code: IssueCode, path: &str) -> bool {
        self.errors.iter().any(|e| e.code == code && e.path == path)
    }

    /// Whether a warning with `code` exists at exactly `path`.
    pub fn has_warning(&self, code: IssueCode, path: &str) -> bool {
        self.warnings.iter().any(|w| w.code == code && w.path == path)
    }
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.valid {
            write!(f, "valid")?;
        } else {
            write!(f, "invalid ({} errors)", self.errors.len())?;
        }
        for e in &self.errors {
            write!(f, "\n  {e}")?;
        }
        for w in &self.warnings {
            write!(f, "\n  warning {w}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationResult {}

#[cfg(test)]
mod tests {
    use super::*;

    fn issue(code: IssueCode, path: &str) -> ValidationIssue {
        ValidationIssue {
            code,
            path: path.into(),
            message: "m".into(),
            suggestions: vec!["s".into()],
        }
    }

    #[test]
    fn code_wire_form_matches_as_str() {
        for code in [
            IssueCode::MissingRequiredField,
            IssueCode::InvalidPattern,
            IssueCode::UnsignedDocument,
            IssueCode::DuplicateId,
        ] {
            let v = serde_json::to_value(code).unwrap();
            assert_eq!(v, code.as_str());
        }
    }

    #[test]
    fn valid_tracks_errors_only() {
        let r = ValidationResult::from_issues(vec![], vec![issue(IssueCode::UnsignedDocument, "signature")]);
        assert!(r.is_valid());
        assert!(r.has_warning(IssueCode::UnsignedDocument, "signature"));
        let r = ValidationResult::from_issues(vec![issue(IssueCode::TooLong, "title")], vec![]);
        assert!(!r.is_valid());
        assert!(r.has_error(IssueCode::TooLong, "title"));
    }

    #[test]
    fn issue_serializes_path_as_field() {
        let v = serde_json::to_value(issue(IssueCode::TooLong, "items.0.title")).unwrap();
        assert_eq!(v["field"], "items.0.title");
        assert_eq!(v["code"], "TOO_LONG");
    }

    #[test]
    fn display_lists_errors() {
        let r = ValidationResult::from_issues(vec![issue(IssueCode::TooLong, "title")], vec![]);
        let text = r.to_string();
        assert!(text.contains("invalid (1 errors)"));
        assert!(text.contains("[TOO_LONG] title"));
    }
}
