//! Durable directory-backed repository.
//!
//! Layout under the root directory:
//!
//! ```text
//! installation.salt              hex salt, written once
//! installation.check             sealed check value for the secret
//! keys/<key_id>.json             {"encrypted", "iv", "authTag"}
//! archive/<key_id>_<ts>.json     {"keyId", "archivedAt", "blob"}
//! ```
//!
//! Every write goes to a temporary sibling first and is renamed into place,
//! so a crash never leaves a half-written blob under its final name. On
//! unix, files are created with mode `0600`.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use sfeed_core::KeyId;

use super::repository::{ArchivedBlob, BlobRepository};
use crate::cipher::{EncryptedBlob, InstallationSalt};
use crate::error::KeyStoreError;

const SALT_FILE: &str = "installation.salt";
const CHECK_FILE: &str = "installation.check";
const KEYS_DIR: &str = "keys";
const ARCHIVE_DIR: &str = "archive";
const BLOB_EXT: &str = "json";

/// Blob repository rooted at a directory.
#[derive(Debug, Clone)]
pub struct FileRepository {
    root: PathBuf,
}

impl FileRepository {
    /// Open a repository rooted at `root`, creating the directory layout.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, KeyStoreError> {
        let root = root.into();
        fs::create_dir_all(root.join(KEYS_DIR))?;
        fs::create_dir_all(root.join(ARCHIVE_DIR))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the live blob for `key_id`.
    pub fn key_path(&self, key_id: &KeyId) -> PathBuf {
        self.root
            .join(KEYS_DIR)
            .join(format!("{}.{BLOB_EXT}", key_id.as_str()))
    }

    fn archive_dir(&self) -> PathBuf {
        self.root.join(ARCHIVE_DIR)
    }

    /// A free archive path for `key_id` at `stamp`. Same-second deletes of
    /// one id get a numeric suffix.
    fn archive_path(&self, key_id: &KeyId, stamp: &str) -> PathBuf {
        let dir = self.archive_dir();
        let mut path = dir.join(format!("{}_{stamp}.{BLOB_EXT}", key_id.as_str()));
        let mut n = 1;
        while path.exists() {
            path = dir.join(format!("{}_{stamp}-{n}.{BLOB_EXT}", key_id.as_str()));
            n += 1;
        }
        path
    }
}

/// Write `bytes` to `path` through a temporary file and rename.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), KeyStoreError> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::InvalidInput, "no file name"))?;
    let tmp = path.with_file_name(format!(".{file_name}.tmp"));

    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let result = (|| -> std::io::Result<()> {
        let mut f = options.open(&tmp)?;
        f.write_all(bytes)?;
        f.sync_all()?;
        fs::rename(&tmp, path)
    })();
    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    Ok(result?)
}

impl BlobRepository for FileRepository {
    fn load_salt(&self) -> Result<Option<InstallationSalt>, KeyStoreError> {
        let path = self.root.join(SALT_FILE);
        match fs::read_to_string(&path) {
            Ok(text) => InstallationSalt::from_hex(&text).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save_salt(&self, salt: &InstallationSalt) -> Result<(), KeyStoreError> {
        write_atomic(&self.root.join(SALT_FILE), salt.to_hex().as_bytes())
    }

    fn load_check(&self) -> Result<Option<EncryptedBlob>, KeyStoreError> {
        let path = self.root.join(CHECK_FILE);
        let bytes = match fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| KeyStoreError::integrity(CHECK_FILE, format!("not a valid blob: {e}")))
    }

    fn save_check(&self, check: &EncryptedBlob) -> Result<(), KeyStoreError> {
        let bytes = serde_json::to_vec_pretty(check)?;
        write_atomic(&self.root.join(CHECK_FILE), &bytes)
    }

    fn put(&self, key_id: &KeyId, blob: &EncryptedBlob) -> Result<(), KeyStoreError> {
        let bytes = serde_json::to_vec_pretty(blob)?;
        write_atomic(&self.key_path(key_id), &bytes)
    }

    fn get(&self, key_id: &KeyId) -> Result<Option<EncryptedBlob>, KeyStoreError> {
        let path = self.key_path(key_id);
        let bytes = match fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| KeyStoreError::integrity(key_id, format!("key file is not a valid blob: {e}")))
    }

    fn ids(&self) -> Result<Vec<KeyId>, KeyStoreError> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(self.root.join(KEYS_DIR))? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(BLOB_EXT) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match KeyId::new(stem) {
                Ok(id) => ids.push(id),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "ignoring key file with invalid name");
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    fn remove(&self, key_id: &KeyId) -> Result<bool, KeyStoreError> {
        match fs::remove_file(self.key_path(key_id)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn archive(&self, record: &ArchivedBlob) -> Result<(), KeyStoreError> {
        fs::create_dir_all(self.archive_dir())?;
        let path = self.archive_path(&record.key_id, &record.archived_at.to_compact());
        let bytes = serde_json::to_vec_pretty(record)?;
        write_atomic(&path, &bytes)
    }

    fn archived(&self, key_id: &KeyId) -> Result<Vec<ArchivedBlob>, KeyStoreError> {
        let mut records = Vec::new();
        let dir = self.archive_dir();
        if !dir.exists() {
            return Ok(records);
        }
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(BLOB_EXT) {
                continue;
            }
            let bytes = fs::read(&path)?;
            match serde_json::from_slice::<ArchivedBlob>(&bytes) {
                Ok(record) if &record.key_id == key_id => records.push(record),
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "unreadable archive record");
                }
            }
        }
        records.sort_by_key(|r| r.archived_at);
        Ok(records)
    }
}
