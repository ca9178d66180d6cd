//! # sfeed-core: Foundational Types for signedfeed
//!
//! The leaf of the workspace DAG. Every other crate depends on it; it depends
//! on nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **`CanonicalBytes` newtype.** Signing and verification accept only
//!    [`CanonicalBytes`], so a signature is never computed over bytes that
//!    depend on field order.
//!
//! 2. **Tagged key material.** Public keys and signatures are parsed once
//!    into [`PublicKeyMaterial`] / [`SignatureMaterial`] at the boundary.
//!
//! 3. **Validated identifiers.** [`KeyId`] is path-safe by construction and
//!    knows its rotation family.
//!
//! 4. **UTC-only timestamps.** [`Timestamp`] has one textual form per instant.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `sfeed-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod canonical;
pub mod envelope;
pub mod error;
pub mod identity;
pub mod tagged;
pub mod temporal;

// Re-export primary types for ergonomic imports.
pub use canonical::{canonicalize, CanonicalBytes, MAX_CANONICAL_DEPTH};
pub use envelope::{ExportEnvelope, ENVELOPE_VERSION};
pub use error::{CanonicalizationError, IdentifierError, TaggedValueError};
pub use identity::KeyId;
pub use tagged::{KeyAlgorithm, PublicKeyMaterial, SignatureMaterial};
pub use temporal::Timestamp;
