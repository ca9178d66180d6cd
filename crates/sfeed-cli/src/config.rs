//! # CLI Configuration
//!
//! Optional YAML file. Every field has a default, so an empty file or no
//! file at all is a working configuration:
//!
//! ```yaml
//! key_dir: .sfeed/keys
//! secret_env: SFEED_KEYSTORE_SECRET
//! backup_passphrase_env: SFEED_BACKUP_PASSPHRASE
//! kdf: { m_cost: 65536, t_cost: 3, p_cost: 4 }
//! cache_ttl_secs: 300
//! ```
//!
//! Secrets are never stored in the file; it only names the environment
//! variables that hold them.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use sfeed_crypto::{FileRepository, KdfParams, KeyManager, KeyStore};

/// Config file read from the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "sfeed.yaml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Directory holding sealed key files.
    pub key_dir: PathBuf,
    /// Environment variable with the installation secret.
    pub secret_env: String,
    /// Environment variable with the backup passphrase.
    pub backup_passphrase_env: String,
    /// Argon2id parameters for the key store.
    pub kdf: KdfParams,
    /// Decrypted key cache lifetime. Absent disables the cache.
    pub cache_ttl_secs: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            key_dir: PathBuf::from(".sfeed/keys"),
            secret_env: "SFEED_KEYSTORE_SECRET".to_string(),
            backup_passphrase_env: "SFEED_BACKUP_PASSPHRASE".to_string(),
            kdf: KdfParams::default(),
            cache_ttl_secs: None,
        }
    }
}

impl Config {
    /// Load from an explicit path, or from [`DEFAULT_CONFIG_FILE`] if it
    /// exists. An explicit path that does not exist is an error; a missing
    /// default file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !default.is_file() {
                    tracing::debug!("no config file; using defaults");
                    return Ok(Self::default());
                }
                default
            }
        };
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;
        let config = Self::from_yaml(&text)
            .with_context(|| format!("invalid config: {}", path.display()))?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        // An empty document parses as null, not as an empty mapping.
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    /// The installation secret from the configured environment variable.
    pub fn secret(&self) -> Result<Zeroizing<String>> {
        read_secret(&self.secret_env)
    }

    /// The backup passphrase from the configured environment variable.
    pub fn backup_passphrase(&self) -> Result<Zeroizing<String>> {
        read_secret(&self.backup_passphrase_env)
    }

    /// Open the directory-backed key store and wrap it in a manager.
    pub fn open_key_manager(&self) -> Result<KeyManager<FileRepository>> {
        let secret = self.secret()?;
        let repo = FileRepository::open(self.key_dir.clone())
            .with_context(|| format!("failed to open key directory: {}", self.key_dir.display()))?;
        let store = KeyStore::open(repo, secret.as_bytes(), self.kdf.clone())
            .context("failed to open key store")?;
        let manager = KeyManager::new(store);
        Ok(match self.cache_ttl_secs {
            Some(secs) => manager.with_cache_ttl(Duration::from_secs(secs)),
            None => manager,
        })
    }
}

/// Read a non-empty secret from the environment.
pub fn read_secret(var: &str) -> Result<Zeroizing<String>> {
    let value = Zeroizing::new(
        std::env::var(var).with_context(|| format!("environment variable {var} is not set"))?,
    );
    if value.is_empty() {
        bail!("environment variable {var} is empty");
    }
    Ok(value)
}
