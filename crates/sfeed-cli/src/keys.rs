//! # Keys Subcommand
//!
//! Key lifecycle over the configured key directory.
//!
//! - `create` / `rotate` / `delete`: lifecycle transitions.
//! - `list` / `show`: public views; private material is never printed.
//! - `validate`: decrypt and check a stored key pair.
//! - `export`: public keys of every family in the export envelope.
//! - `backup` / `restore`: passphrase-sealed copy of every key.
//! - `rekey`: re-encrypt the store under a new installation secret.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};

use sfeed_core::KeyId;
use sfeed_crypto::{BlobRepository, KeyManager, KeyMetadata, KeyPairInfo, SealedBackup};

use crate::config::{read_secret, Config};
use crate::{read_json, write_json};

/// Arguments for `sfeed keys`.
#[derive(Args, Debug)]
pub struct KeysArgs {
    #[command(subcommand)]
    pub command: KeysCommand,
}

#[derive(Subcommand, Debug)]
pub enum KeysCommand {
    /// Create a key pair for a new family.
    Create {
        /// Key id, e.g. `alice`.
        id: String,
    },

    /// Rotate a family to a new key; the current key is deprecated.
    Rotate {
        /// Any id in the family.
        id: String,
        /// Reason recorded in the new key's metadata.
        #[arg(long)]
        reason: Option<String>,
    },

    /// List every stored key.
    List {
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Show one key, or its whole family with `--history`.
    Show {
        id: String,
        #[arg(long)]
        history: bool,
    },

    /// Decrypt a stored key and check that it is usable.
    Validate { id: String },

    /// Delete a key. A copy is kept in the archive.
    Delete { id: String },

    /// Write all public keys in an export envelope.
    Export {
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Write a passphrase-sealed backup of every key.
    Backup {
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Restore keys from a backup. Existing ids are left untouched.
    Restore { backup: PathBuf },

    /// Re-encrypt the store under the secret held in another variable.
    Rekey {
        /// Environment variable holding the new secret.
        #[arg(long)]
        new_secret_env: String,
    },
}

/// Execute `sfeed keys`.
pub fn run_keys(args: &KeysArgs, config: &Config) -> Result<u8> {
    let mut manager = config.open_key_manager()?;
    execute(&args.command, &mut manager, config)
}

/// Run one keys command against an open manager.
pub fn execute<R: BlobRepository>(
    command: &KeysCommand,
    manager: &mut KeyManager<R>,
    config: &Config,
) -> Result<u8> {
    match command {
        KeysCommand::Create { id } => {
            let info = manager.create_key_pair(&parse_id(id)?, KeyMetadata::default())?;
            println!("created {} ({})", info.key_id, info.public_key);
            Ok(0)
        }
        KeysCommand::Rotate { id, reason } => {
            let metadata = KeyMetadata {
                rotation_reason: reason.clone(),
                ..KeyMetadata::default()
            };
            let info = manager.rotate_key(&parse_id(id)?, metadata)?;
            println!("rotated to {} (version {})", info.key_id, info.version);
            Ok(0)
        }
        KeysCommand::List { json } => {
            let keys = manager.list_keys()?;
            if *json {
                write_json(&keys, None)?;
            } else {
                print_table(&keys);
            }
            Ok(0)
        }
        KeysCommand::Show { id, history } => {
            let id = parse_id(id)?;
            if *history {
                let family = manager.key_history(&id)?;
                if family.is_empty() {
                    bail!("key {id} not found");
                }
                write_json(&family, None)?;
            } else {
                let info = manager
                    .get_key_pair(&id)?
                    .with_context(|| format!("key {id} not found"))?;
                write_json(&info, None)?;
            }
            Ok(0)
        }
        KeysCommand::Validate { id } => {
            let outcome = manager.validate_key(&parse_id(id)?);
            match &outcome.reason {
                None => println!("{id}: valid"),
                Some(reason) => println!("{id}: invalid: {reason}"),
            }
            Ok(if outcome.valid { 0 } else { 1 })
        }
        KeysCommand::Delete { id } => {
            let id = parse_id(id)?;
            if !manager.delete_key_pair(&id)? {
                bail!("key {id} not found");
            }
            println!("deleted {id}");
            Ok(0)
        }
        KeysCommand::Export { out } => {
            write_json(&manager.export_public_keys()?, out.as_deref())?;
            Ok(0)
        }
        KeysCommand::Backup { out } => {
            let passphrase = config.backup_passphrase()?;
            let backup = manager.store().backup(passphrase.as_bytes())?;
            write_json(&backup, Some(out))?;
            println!("wrote backup to {}", out.display());
            Ok(0)
        }
        KeysCommand::Restore { backup } => {
            let passphrase = config.backup_passphrase()?;
            let sealed: SealedBackup = serde_json::from_value(read_json(backup)?)
                .with_context(|| format!("{} is not a key backup", backup.display()))?;
            let report = manager.store().restore(&sealed, passphrase.as_bytes())?;
            println!("restored {} keys, skipped {}", report.restored, report.skipped);
            Ok(0)
        }
        KeysCommand::Rekey { new_secret_env } => {
            let secret = read_secret(new_secret_env)?;
            let report = manager.rekey(secret.as_bytes())?;
            if report.failed.is_empty() {
                println!("re-encrypted {} keys", report.rekeyed);
                return Ok(0);
            }
            println!("rekey aborted, store unchanged; unreadable under the current secret:");
            for id in &report.failed {
                println!("  {id}");
            }
            Ok(1)
        }
    }
}

fn parse_id(id: &str) -> Result<KeyId> {
    KeyId::new(id).with_context(|| format!("invalid key id {id:?}"))
}

fn print_table(keys: &[KeyPairInfo]) {
    if keys.is_empty() {
        println!("no keys");
        return;
    }
    for k in keys {
        println!(
            "{:<24} v{:<3} {:<10} {}  {}",
            k.key_id.as_str(),
            k.version,
            k.status.to_string(),
            &k.fingerprint[..16],
            k.created_at,
        );
    }
}
