//! # sfeed-crypto: Keys, Signatures and Encrypted Key Storage
//!
//! - **Ed25519** ([`ed25519`]): signing and verification over
//!   [`CanonicalBytes`](sfeed_core::CanonicalBytes) only.
//! - **Storage cipher** ([`cipher`]): Argon2id key derivation from an
//!   installation secret and XChaCha20-Poly1305 authenticated encryption.
//! - **Key store** ([`keystore`]): sealed key pairs over an in-memory or
//!   directory-backed repository, with archival, backup and rekey.
//! - **Key manager** ([`manager`]): creation, rotation, deprecation and
//!   validation of key families.
//!
//! ## Crate Policy
//!
//! - Private key material never appears in `Debug` output.
//! - Default reads return [`KeyPairInfo`], which has no private field.
//! - No `unwrap()` outside tests.

pub mod cache;
pub mod cipher;
pub mod ed25519;
pub mod error;
pub mod keypair;
pub mod keystore;
pub mod manager;

pub use cache::KeyCache;
pub use cipher::{EncryptedBlob, InstallationSalt, KdfParams, StorageCipher};
pub use ed25519::{fingerprint, verify_with_public_key, SigningKey, VerifyingKey};
pub use error::{CryptoError, KeyManagerError, KeyStoreError};
pub use keypair::{KeyMetadata, KeyPair, KeyPairInfo, KeyStatus};
pub use keystore::{
    ArchivedBlob, BlobRepository, DeleteOutcome, FileRepository, KeyStore, MemoryRepository,
    RekeyReport, RestoreReport, SealedBackup,
};
pub use manager::{KeyManager, KeyValidation};
