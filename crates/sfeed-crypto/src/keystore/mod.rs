//! # Encrypted Key Store
//!
//! [`KeyStore`] seals [`KeyPair`] records with the [`StorageCipher`] and
//! hands the resulting blobs to a [`BlobRepository`]. The repository decides
//! the medium; the store decides what is confidential.
//!
//! ## Failure semantics
//!
//! - `load` of an absent id is `Ok(None)`. A blob that fails to decrypt or
//!   authenticate is `Err(Integrity)`, never `Ok(None)`.
//! - `list` skips entries that fail to decrypt and logs each one.
//! - `delete` archives before removing. A failed archive is logged and
//!   reported in [`DeleteOutcome`], and the removal still happens.
//! - `restore` is tolerant per entry and reports counts.
//! - `open` with a secret other than the installation's is
//!   `Err(WrongSecret)`, checked against a sealed value next to the salt.
//! - `rekey` rewrites nothing unless every blob opens under the current
//!   secret.

mod file;
mod memory;
mod repository;

pub use file::FileRepository;
pub use memory::MemoryRepository;
pub use repository::{ArchivedBlob, BlobRepository};

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use sfeed_core::{ExportEnvelope, KeyId, Timestamp};

use crate::cipher::{EncryptedBlob, InstallationSalt, KdfParams, StorageCipher};
use crate::error::KeyStoreError;
use crate::keypair::{KeyPair, StoredKeyRecord};

/// Associated data bound into every backup envelope.
const BACKUP_AAD: &[u8] = b"sfeed-key-backup";

/// Associated data and plaintext of the installation check value.
const CHECK_AAD: &[u8] = b"sfeed-installation-check";
const CHECK_PLAINTEXT: &[u8] = b"signedfeed key store";

/// Result of [`KeyStore::delete`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteOutcome {
    /// Whether a live blob was removed.
    pub removed: bool,
    /// Whether a copy reached the archive before removal.
    pub archived: bool,
}

/// Result of [`KeyStore::restore`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RestoreReport {
    /// Entries written to the store.
    pub restored: usize,
    /// Entries that were malformed or whose id already exists.
    pub skipped: usize,
}

/// Result of [`KeyStore::rekey`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RekeyReport {
    /// Blobs re-encrypted under the new secret. Zero when `failed` is not
    /// empty.
    pub rekeyed: usize,
    /// Ids whose blobs could not be opened under the old secret.
    pub failed: Vec<KeyId>,
}

/// A key backup sealed under a passphrase with its own salt.
///
/// Independent of the installation salt and secret, so a backup can be
/// restored into a different installation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedBackup {
    pub kdf: KdfParams,
    /// Backup salt, hex.
    pub salt: String,
    #[serde(flatten)]
    pub blob: EncryptedBlob,
}

/// Confidential key persistence over a blob repository.
#[derive(Debug)]
pub struct KeyStore<R: BlobRepository> {
    repo: R,
    salt: InstallationSalt,
    kdf: KdfParams,
    cipher: StorageCipher,
}

impl<R: BlobRepository> KeyStore<R> {
    /// Open a store, creating and persisting the installation salt on first
    /// use, and derive the storage key from `secret`.
    ///
    /// The first open seals a check value under `secret`. Later opens must
    /// present the same secret or fail with [`KeyStoreError::WrongSecret`].
    pub fn open(repo: R, secret: &[u8], kdf: KdfParams) -> Result<Self, KeyStoreError> {
        let salt = match repo.load_salt()? {
            Some(salt) => salt,
            None => {
                let salt = InstallationSalt::generate();
                repo.save_salt(&salt)?;
                tracing::info!("generated new installation salt");
                salt
            }
        };
        let cipher = StorageCipher::derive(secret, &salt, &kdf)?;
        match repo.load_check()? {
            Some(check) => verify_check(&cipher, &check)?,
            None => {
                repo.save_check(&cipher.seal(CHECK_PLAINTEXT, CHECK_AAD)?)?;
                tracing::info!("sealed installation check value");
            }
        }
        Ok(Self {
            repo,
            salt,
            kdf,
            cipher,
        })
    }

    /// The backing repository.
    pub fn repository(&self) -> &R {
        &self.repo
    }

    /// Seal and write a key pair under its own id.
    pub fn store(&self, key_pair: &KeyPair) -> Result<(), KeyStoreError> {
        let blob = seal_record(&self.cipher, key_pair)?;
        self.repo.put(&key_pair.key_id, &blob)?;
        tracing::debug!(key_id = %key_pair.key_id, "stored key pair");
        Ok(())
    }

    /// Load and decrypt a key pair.
    pub fn load(&self, key_id: &KeyId) -> Result<Option<KeyPair>, KeyStoreError> {
        let Some(blob) = self.repo.get(key_id)? else {
            return Ok(None);
        };
        let plaintext = self.cipher.open(&blob, key_id.as_str().as_bytes(), key_id.as_str())?;
        let record: StoredKeyRecord =
            serde_json::from_slice(&plaintext).map_err(|e| KeyStoreError::InvalidKeyFormat {
                key_id: key_id.to_string(),
                reason: format!("record does not parse: {e}"),
            })?;
        if &record.key_id != key_id {
            return Err(KeyStoreError::integrity(
                key_id,
                format!("blob holds key {}", record.key_id),
            ));
        }
        record.into_key_pair().map(Some)
    }

    /// Whether a blob exists for `key_id`, readable or not.
    pub fn contains(&self, key_id: &KeyId) -> Result<bool, KeyStoreError> {
        Ok(self.repo.ids()?.contains(key_id))
    }

    /// Every key pair that decrypts, sorted by id. Others are logged and
    /// skipped.
    pub fn load_all(&self) -> Result<Vec<KeyPair>, KeyStoreError> {
        let mut pairs = Vec::new();
        for id in self.repo.ids()? {
            match self.load(&id) {
                Ok(Some(kp)) => pairs.push(kp),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(key_id = %id, error = %e, "skipping unreadable key");
                }
            }
        }
        Ok(pairs)
    }

    /// Ids of every key pair that decrypts.
    pub fn list(&self) -> Result<Vec<KeyId>, KeyStoreError> {
        Ok(self.load_all()?.into_iter().map(|kp| kp.key_id).collect())
    }

    /// Archive then remove the blob for `key_id`.
    pub fn delete(&self, key_id: &KeyId) -> Result<DeleteOutcome, KeyStoreError> {
        let Some(blob) = self.repo.get(key_id)? else {
            return Ok(DeleteOutcome {
                removed: false,
                archived: false,
            });
        };
        let record = ArchivedBlob {
            key_id: key_id.clone(),
            archived_at: Timestamp::now(),
            blob,
        };
        let archived = match self.repo.archive(&record) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(key_id = %key_id, error = %e, "archival failed; deleting anyway");
                false
            }
        };
        let removed = self.repo.remove(key_id)?;
        tracing::info!(key_id = %key_id, archived, "deleted key pair");
        Ok(DeleteOutcome { removed, archived })
    }

    /// Export every readable key pair sealed under `passphrase`.
    pub fn backup(&self, passphrase: &[u8]) -> Result<SealedBackup, KeyStoreError> {
        let records: Vec<StoredKeyRecord> =
            self.load_all()?.iter().map(KeyPair::to_record).collect();
        let envelope = ExportEnvelope::new(records);
        let plaintext = Zeroizing::new(serde_json::to_vec(&envelope)?);

        let salt = InstallationSalt::generate();
        let cipher = StorageCipher::derive(passphrase, &salt, &self.kdf)?;
        let blob = cipher.seal(&plaintext, BACKUP_AAD)?;
        tracing::info!(keys = envelope.len(), "created key backup");
        Ok(SealedBackup {
            kdf: self.kdf.clone(),
            salt: salt.to_hex(),
            blob,
        })
    }

    /// Import a backup. Ids that already exist are kept as they are and
    /// counted as skipped, as are entries that do not parse.
    pub fn restore(
        &self,
        backup: &SealedBackup,
        passphrase: &[u8],
    ) -> Result<RestoreReport, KeyStoreError> {
        let salt = InstallationSalt::from_hex(&backup.salt)
            .map_err(|e| KeyStoreError::BackupIntegrity(e.to_string()))?;
        let cipher = StorageCipher::derive(passphrase, &salt, &backup.kdf)?;
        let plaintext = cipher
            .open(&backup.blob, BACKUP_AAD, "backup")
            .map_err(|e| KeyStoreError::BackupIntegrity(e.to_string()))?;
        let envelope: ExportEnvelope<serde_json::Value> = serde_json::from_slice(&plaintext)
            .map_err(|e| KeyStoreError::BackupIntegrity(format!("envelope does not parse: {e}")))?;
        envelope
            .check_version()
            .map_err(|e| KeyStoreError::BackupIntegrity(e.to_string()))?;

        let existing = self.repo.ids()?;
        let mut report = RestoreReport::default();
        for entry in envelope.entries {
            let key_pair = match serde_json::from_value::<StoredKeyRecord>(entry)
                .map_err(KeyStoreError::from)
                .and_then(StoredKeyRecord::into_key_pair)
            {
                Ok(kp) => kp,
                Err(e) => {
                    tracing::warn!(error = %e, "skipping malformed backup entry");
                    report.skipped += 1;
                    continue;
                }
            };
            if existing.contains(&key_pair.key_id) {
                tracing::warn!(key_id = %key_pair.key_id, "key exists; not overwritten by restore");
                report.skipped += 1;
                continue;
            }
            match self.store(&key_pair) {
                Ok(()) => report.restored += 1,
                Err(e) => {
                    tracing::warn!(key_id = %key_pair.key_id, error = %e, "restore write failed");
                    report.skipped += 1;
                }
            }
        }
        tracing::info!(restored = report.restored, skipped = report.skipped, "restored key backup");
        Ok(report)
    }

    /// Re-encrypt every blob under a new installation secret.
    ///
    /// Every blob is opened under the current secret first. If any fails,
    /// nothing is rewritten, the failures are listed in the report and the
    /// store keeps the current secret.
    pub fn rekey(&mut self, new_secret: &[u8]) -> Result<RekeyReport, KeyStoreError> {
        let mut report = RekeyReport::default();
        let mut opened = Vec::new();
        for id in self.repo.ids()? {
            let plaintext = self
                .repo
                .get(&id)
                .and_then(|blob| blob.ok_or_else(|| KeyStoreError::integrity(&id, "vanished")))
                .and_then(|blob| self.cipher.open(&blob, id.as_str().as_bytes(), id.as_str()));
            match plaintext {
                Ok(plaintext) => opened.push((id, plaintext)),
                Err(e) => {
                    tracing::warn!(key_id = %id, error = %e, "cannot open key under current secret");
                    report.failed.push(id);
                }
            }
        }
        if !report.failed.is_empty() {
            tracing::warn!(failed = report.failed.len(), "rekey aborted; store unchanged");
            return Ok(report);
        }

        let next = StorageCipher::derive(new_secret, &self.salt, &self.kdf)?;
        let resealed = opened
            .iter()
            .map(|(id, plaintext)| {
                next.seal(plaintext, id.as_str().as_bytes())
                    .map(|blob| (id, blob))
            })
            .collect::<Result<Vec<_>, KeyStoreError>>()?;
        for (id, blob) in resealed {
            self.repo.put(id, &blob)?;
            report.rekeyed += 1;
        }
        self.repo.save_check(&next.seal(CHECK_PLAINTEXT, CHECK_AAD)?)?;
        self.cipher = next;
        tracing::info!(rekeyed = report.rekeyed, "rekeyed key store");
        Ok(report)
    }
}

fn verify_check(cipher: &StorageCipher, check: &EncryptedBlob) -> Result<(), KeyStoreError> {
    match cipher.open(check, CHECK_AAD, "installation") {
        Ok(plaintext) if plaintext.as_slice() == CHECK_PLAINTEXT => Ok(()),
        _ => Err(KeyStoreError::WrongSecret),
    }
}

fn seal_record(cipher: &StorageCipher, key_pair: &KeyPair) -> Result<EncryptedBlob, KeyStoreError> {
    let plaintext = Zeroizing::new(serde_json::to_vec(&key_pair.to_record())?);
    cipher.seal(&plaintext, key_pair.key_id.as_str().as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::light_params;
    use crate::keypair::KeyMetadata;

    fn store() -> KeyStore<MemoryRepository> {
        KeyStore::open(MemoryRepository::new(), b"install-secret", light_params()).unwrap()
    }

    fn pair(id: &str) -> KeyPair {
        KeyPair::generate(KeyId::new(id).unwrap(), 1, KeyMetadata::default())
    }

    #[test]
    fn store_load_roundtrip() {
        let ks = store();
        let kp = pair("alice");
        ks.store(&kp).unwrap();
        let back = ks.load(&kp.key_id).unwrap().unwrap();
        assert_eq!(back.public_key, kp.public_key);
        assert_eq!(back.private_key.public_key(), kp.public_key);
    }

    #[test]
    fn load_missing_is_none() {
        assert!(store().load(&KeyId::new("ghost").unwrap()).unwrap().is_none());
    }

    #[test]
    fn blob_under_wrong_id_is_integrity_error() {
        let ks = store();
        let kp = pair("alice");
        ks.store(&kp).unwrap();
        let blob = ks.repository().get(&kp.key_id).unwrap().unwrap();
        let mallory = KeyId::new("mallory").unwrap();
        ks.repository().put(&mallory, &blob).unwrap();
        assert!(matches!(ks.load(&mallory), Err(KeyStoreError::Integrity { .. })));
    }

    #[test]
    fn list_skips_corrupt_entries() {
        let ks = store();
        ks.store(&pair("a")).unwrap();
        ks.store(&pair("b")).unwrap();
        let b = KeyId::new("b").unwrap();
        let mut blob = ks.repository().get(&b).unwrap().unwrap();
        blob.auth_tag = "00".repeat(16);
        ks.repository().put(&b, &blob).unwrap();
        let ids: Vec<String> = ks.list().unwrap().iter().map(|k| k.to_string()).collect();
        assert_eq!(ids, ["a"]);
        assert!(ks.contains(&b).unwrap());
    }

    #[test]
    fn delete_archives_first() {
        let ks = store();
        let kp = pair("alice");
        ks.store(&kp).unwrap();
        let outcome = ks.delete(&kp.key_id).unwrap();
        assert_eq!(
            outcome,
            DeleteOutcome {
                removed: true,
                archived: true
            }
        );
        assert!(ks.load(&kp.key_id).unwrap().is_none());
        assert_eq!(ks.repository().archived(&kp.key_id).unwrap().len(), 1);
        assert!(!ks.delete(&kp.key_id).unwrap().removed);
    }

    #[test]
    fn reopen_with_same_secret_reads_keys() {
        let ks = store();
        let kp = pair("alice");
        ks.store(&kp).unwrap();
        let KeyStore { repo, .. } = ks;
        let reopened = KeyStore::open(repo, b"install-secret", light_params()).unwrap();
        assert!(reopened.load(&kp.key_id).unwrap().is_some());
    }

    #[test]
    fn reopen_with_wrong_secret_is_refused() {
        let ks = store();
        let kp = pair("alice");
        ks.store(&kp).unwrap();
        let KeyStore { repo, .. } = ks;
        assert!(matches!(
            KeyStore::open(repo, b"other", light_params()),
            Err(KeyStoreError::WrongSecret)
        ));
    }

    #[test]
    fn wrong_secret_is_refused_before_any_key_exists() {
        let KeyStore { repo, .. } = store();
        assert!(repo.is_empty());
        assert!(matches!(
            KeyStore::open(repo, b"other", light_params()),
            Err(KeyStoreError::WrongSecret)
        ));
    }

    /// Memory repository whose archive always fails.
    #[derive(Debug, Default)]
    struct NoArchive(MemoryRepository);

    impl BlobRepository for NoArchive {
        fn load_salt(&self) -> Result<Option<InstallationSalt>, KeyStoreError> {
            self.0.load_salt()
        }
        fn save_salt(&self, salt: &InstallationSalt) -> Result<(), KeyStoreError> {
            self.0.save_salt(salt)
        }
        fn load_check(&self) -> Result<Option<EncryptedBlob>, KeyStoreError> {
            self.0.load_check()
        }
        fn save_check(&self, check: &EncryptedBlob) -> Result<(), KeyStoreError> {
            self.0.save_check(check)
        }
        fn put(&self, key_id: &KeyId, blob: &EncryptedBlob) -> Result<(), KeyStoreError> {
            self.0.put(key_id, blob)
        }
        fn get(&self, key_id: &KeyId) -> Result<Option<EncryptedBlob>, KeyStoreError> {
            self.0.get(key_id)
        }
        fn ids(&self) -> Result<Vec<KeyId>, KeyStoreError> {
            self.0.ids()
        }
        fn remove(&self, key_id: &KeyId) -> Result<bool, KeyStoreError> {
            self.0.remove(key_id)
        }
        fn archive(&self, _record: &ArchivedBlob) -> Result<(), KeyStoreError> {
            let denied = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
            Err(denied.into())
        }
        fn archived(&self, key_id: &KeyId) -> Result<Vec<ArchivedBlob>, KeyStoreError> {
            self.0.archived(key_id)
        }
    }

    #[test]
    fn delete_removes_even_when_archive_fails() {
        let ks = KeyStore::open(NoArchive::default(), b"install-secret", light_params()).unwrap();
        let kp = pair("alice");
        ks.store(&kp).unwrap();
        let outcome = ks.delete(&kp.key_id).unwrap();
        assert_eq!(
            outcome,
            DeleteOutcome {
                removed: true,
                archived: false
            }
        );
        assert!(ks.load(&kp.key_id).unwrap().is_none());
        assert!(ks.repository().archived(&kp.key_id).unwrap().is_empty());
    }

    #[test]
    fn restore_skips_malformed_entries() {
        let good = pair("good");
        let mut bad_material = pair("bad").to_record();
        bad_material.private_key = "rsa:AAAA".into();
        let envelope = ExportEnvelope::new(vec![
            serde_json::to_value(good.to_record()).unwrap(),
            serde_json::json!({"keyId": "junk", "version": "one"}),
            serde_json::to_value(&bad_material).unwrap(),
        ]);
        let salt = InstallationSalt::generate();
        let cipher = StorageCipher::derive(b"pass", &salt, &light_params()).unwrap();
        let blob = cipher
            .seal(&serde_json::to_vec(&envelope).unwrap(), BACKUP_AAD)
            .unwrap();
        let backup = SealedBackup {
            kdf: light_params(),
            salt: salt.to_hex(),
            blob,
        };

        let target = store();
        let report = target.restore(&backup, b"pass").unwrap();
        assert_eq!(report, RestoreReport { restored: 1, skipped: 2 });
        assert!(target.load(&good.key_id).unwrap().is_some());
        assert!(!target.contains(&KeyId::new("junk").unwrap()).unwrap());
        assert!(!target.contains(&KeyId::new("bad").unwrap()).unwrap());
    }

    #[test]
    fn backup_restore_counts() {
        let source = store();
        source.store(&pair("a")).unwrap();
        source.store(&pair("b")).unwrap();
        let backup = source.backup(b"passphrase").unwrap();

        let target = store();
        target.store(&pair("a")).unwrap();
        let report = target.restore(&backup, b"passphrase").unwrap();
        assert_eq!(report, RestoreReport { restored: 1, skipped: 1 });
        assert!(target.load(&KeyId::new("b").unwrap()).unwrap().is_some());
    }

    #[test]
    fn restore_with_wrong_passphrase_fails() {
        let source = store();
        source.store(&pair("a")).unwrap();
        let backup = source.backup(b"right").unwrap();
        assert!(matches!(
            store().restore(&backup, b"wrong"),
            Err(KeyStoreError::BackupIntegrity(_))
        ));
    }

    #[test]
    fn rekey_moves_to_new_secret() {
        let mut ks = store();
        let kp = pair("alice");
        ks.store(&kp).unwrap();
        let report = ks.rekey(b"new-secret").unwrap();
        assert_eq!(report.rekeyed, 1);
        assert!(report.failed.is_empty());
        assert!(ks.load(&kp.key_id).unwrap().is_some());

        let KeyStore { repo, .. } = ks;
        let reopened = KeyStore::open(repo, b"new-secret", light_params()).unwrap();
        assert!(reopened.load(&kp.key_id).unwrap().is_some());
        let KeyStore { repo, .. } = reopened;
        assert!(matches!(
            KeyStore::open(repo, b"install-secret", light_params()),
            Err(KeyStoreError::WrongSecret)
        ));
    }

    #[test]
    fn rekey_with_unreadable_blob_changes_nothing() {
        let mut ks = store();
        let a = pair("a");
        ks.store(&a).unwrap();
        ks.store(&pair("b")).unwrap();
        let b = KeyId::new("b").unwrap();
        let mut blob = ks.repository().get(&b).unwrap().unwrap();
        blob.auth_tag = "00".repeat(16);
        ks.repository().put(&b, &blob).unwrap();
        let a_before = ks.repository().get(&a.key_id).unwrap();

        let report = ks.rekey(b"new-secret").unwrap();
        assert_eq!(report.rekeyed, 0);
        assert_eq!(report.failed, vec![b]);
        assert_eq!(ks.repository().get(&a.key_id).unwrap(), a_before);
        assert!(ks.load(&a.key_id).unwrap().is_some());

        let KeyStore { repo, .. } = ks;
        assert!(matches!(
            KeyStore::open(repo, b"new-secret", light_params()),
            Err(KeyStoreError::WrongSecret)
        ));
    }
}
