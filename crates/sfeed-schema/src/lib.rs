//! # sfeed-schema: Document Validation
//!
//! Structural and semantic checks for signedfeed documents. Validation is
//! pure: it never mutates its input and never returns `Err`. Every problem
//! found is reported in one [`ValidationResult`] with a stable
//! [`IssueCode`], a dot-delimited field path and suggested fixes.
//!
//! The recognized fields live in declarative tables ([`rules`]); a single
//! evaluator ([`validate`]) walks them.

pub mod result;
pub mod rules;
pub mod validate;

pub use result::{IssueCode, ValidationIssue, ValidationResult};
pub use rules::{FieldKind, FieldRule, ObjectKind, ObjectRules};
pub use validate::{
    validate, validate_as, validate_feed, validate_item, validate_str, CURRENT_VERSION,
};
