//! Storage-medium abstraction for encrypted key blobs.
//!
//! A repository stores opaque [`EncryptedBlob`]s by [`KeyId`], an archive
//! of removed blobs, the installation salt and a sealed check value that
//! ties the installation to one secret. It never sees plaintext.

use serde::{Deserialize, Serialize};

use sfeed_core::{KeyId, Timestamp};

use crate::cipher::{EncryptedBlob, InstallationSalt};
use crate::error::KeyStoreError;

/// A timestamped copy of a blob taken before deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchivedBlob {
    pub key_id: KeyId,
    pub archived_at: Timestamp,
    pub blob: EncryptedBlob,
}

/// Backing medium for the key store.
///
/// Implementations must be safe to share across threads. Reads for
/// different ids may run concurrently; writers for one id are serialized by
/// the caller.
pub trait BlobRepository: Send + Sync {
    /// The persisted installation salt, if one has been written.
    fn load_salt(&self) -> Result<Option<InstallationSalt>, KeyStoreError>;

    /// Persist the installation salt.
    fn save_salt(&self, salt: &InstallationSalt) -> Result<(), KeyStoreError>;

    /// The sealed installation check value, if one has been written.
    fn load_check(&self) -> Result<Option<EncryptedBlob>, KeyStoreError>;

    /// Write or replace the sealed installation check value.
    fn save_check(&self, check: &EncryptedBlob) -> Result<(), KeyStoreError>;

    /// Write or replace the blob for `key_id`.
    fn put(&self, key_id: &KeyId, blob: &EncryptedBlob) -> Result<(), KeyStoreError>;

    /// Read the blob for `key_id`. `Ok(None)` when absent.
    fn get(&self, key_id: &KeyId) -> Result<Option<EncryptedBlob>, KeyStoreError>;

    /// Every stored id, sorted.
    fn ids(&self) -> Result<Vec<KeyId>, KeyStoreError>;

    /// Remove the blob for `key_id`. Returns whether it existed.
    fn remove(&self, key_id: &KeyId) -> Result<bool, KeyStoreError>;

    /// Append a copy to the archive namespace.
    fn archive(&self, record: &ArchivedBlob) -> Result<(), KeyStoreError>;

    /// Archived copies for `key_id`, oldest first.
    fn archived(&self, key_id: &KeyId) -> Result<Vec<ArchivedBlob>, KeyStoreError>;
}
