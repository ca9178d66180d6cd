//! In-memory repository.
//!
//! Synchronous `parking_lot` locks, never poisoned. Used by tests and by
//! callers that only need a key store for the life of the process.

use std::collections::BTreeMap;

use parking_lot::RwLock;

use sfeed_core::KeyId;

use super::repository::{ArchivedBlob, BlobRepository};
use crate::cipher::{EncryptedBlob, InstallationSalt};
use crate::error::KeyStoreError;

/// Thread-safe in-memory blob repository.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    salt: RwLock<Option<InstallationSalt>>,
    check: RwLock<Option<EncryptedBlob>>,
    blobs: RwLock<BTreeMap<KeyId, EncryptedBlob>>,
    archive: RwLock<Vec<ArchivedBlob>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live blobs.
    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }
}

impl BlobRepository for MemoryRepository {
    fn load_salt(&self) -> Result<Option<InstallationSalt>, KeyStoreError> {
        Ok(self.salt.read().clone())
    }

    fn save_salt(&self, salt: &InstallationSalt) -> Result<(), KeyStoreError> {
        *self.salt.write() = Some(salt.clone());
        Ok(())
    }

    fn load_check(&self) -> Result<Option<EncryptedBlob>, KeyStoreError> {
        Ok(self.check.read().clone())
    }

    fn save_check(&self, check: &EncryptedBlob) -> Result<(), KeyStoreError> {
        *self.check.write() = Some(check.clone());
        Ok(())
    }

    fn put(&self, key_id: &KeyId, blob: &EncryptedBlob) -> Result<(), KeyStoreError> {
        self.blobs.write().insert(key_id.clone(), blob.clone());
        Ok(())
    }

    fn get(&self, key_id: &KeyId) -> Result<Option<EncryptedBlob>, KeyStoreError> {
        Ok(self.blobs.read().get(key_id).cloned())
    }

    fn ids(&self) -> Result<Vec<KeyId>, KeyStoreError> {
        Ok(self.blobs.read().keys().cloned().collect())
    }

    fn remove(&self, key_id: &KeyId) -> Result<bool, KeyStoreError> {
        Ok(self.blobs.write().remove(key_id).is_some())
    }

    fn archive(&self, record: &ArchivedBlob) -> Result<(), KeyStoreError> {
        self.archive.write().push(record.clone());
        Ok(())
    }

    fn archived(&self, key_id: &KeyId) -> Result<Vec<ArchivedBlob>, KeyStoreError> {
        Ok(self
            .archive
            .read()
            .iter()
            .filter(|r| &r.key_id == key_id)
            .cloned()
            .collect())
    }
}
