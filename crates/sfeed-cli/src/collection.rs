//! # Collection Subcommand
//!
//! Bundle documents into an export envelope, or check an envelope and keep
//! the documents that pass.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use sfeed_doc::{export, import_str, RejectReason};

use crate::{read_json, write_json};

/// Arguments for `sfeed collection`.
#[derive(Args, Debug)]
pub struct CollectionArgs {
    #[command(subcommand)]
    pub command: CollectionCommand,
}

#[derive(Subcommand, Debug)]
pub enum CollectionCommand {
    /// Wrap documents in an export envelope.
    Export {
        #[arg(required = true)]
        documents: Vec<PathBuf>,
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Check every document in an envelope.
    Import {
        envelope: PathBuf,
        /// Reject documents whose signatures do not verify.
        #[arg(long)]
        require_signatures: bool,
        /// Write the accepted documents to a new envelope.
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

/// Execute `sfeed collection`.
pub fn run_collection(args: &CollectionArgs) -> Result<u8> {
    match &args.command {
        CollectionCommand::Export { documents, out } => {
            let docs = documents
                .iter()
                .map(|p| read_json(p))
                .collect::<Result<Vec<_>>>()?;
            write_json(&export(&docs), out.as_deref())?;
            Ok(0)
        }
        CollectionCommand::Import {
            envelope,
            require_signatures,
            out,
        } => {
            let text = std::fs::read_to_string(envelope)
                .with_context(|| format!("failed to read {}", envelope.display()))?;
            let report = import_str(&text, *require_signatures)
                .with_context(|| format!("failed to import {}", envelope.display()))?;
            println!(
                "accepted {}, rejected {}",
                report.accepted.len(),
                report.rejected.len()
            );
            for rejected in &report.rejected {
                let why = match &rejected.reason {
                    RejectReason::Invalid { validation } => validation.to_string(),
                    RejectReason::Unverified { outcome } => outcome
                        .reason
                        .map_or_else(|| "unverified".to_string(), |r| r.to_string()),
                };
                println!("  document {}: {why}", rejected.index);
            }
            if let Some(out) = out {
                write_json(&export(&report.accepted), Some(out))?;
            }
            Ok(if report.rejected.is_empty() { 0 } else { 1 })
        }
    }
}
