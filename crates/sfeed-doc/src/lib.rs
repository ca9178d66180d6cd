//! # sfeed-doc: Signed Documents
//!
//! The top of the library stack. Ties validation ([`sfeed_schema`]) and key
//! management ([`sfeed_crypto`]) together into one pipeline:
//!
//! ```text
//! document ──validate──▶ canonicalize (minus "signature") ──sign──▶ signed copy
//! signed   ──canonicalize (minus "signature")──verify(author.public_key)──▶ outcome
//! ```
//!
//! Also provides a typed model ([`document`]) for building feeds and the
//! envelope-based collection import/export ([`collection`]).

pub mod collection;
pub mod document;
pub mod error;
pub mod signing;

pub use collection::{export, import, import_str, ImportReport, RejectReason, RejectedDocument};
pub use document::{Attachment, Author, Extensions, Feed, Interactions, Item};
pub use error::{CollectionError, SignError};
pub use signing::{
    verify, verify_document, verify_with_key, DocumentVerification, ItemVerification,
    SigningPipeline, VerifyFailure, VerifyOutcome, SIGNATURE_FIELD,
};
