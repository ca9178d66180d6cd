//! # Sign and Verify Subcommands
//!
//! `sign` validates a document and writes a signed copy. `verify` checks the
//! document signature against `author.public_key` (or `--public-key`) and,
//! for documents with signed items, every item signature.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use serde_json::Value;

use sfeed_core::{KeyId, PublicKeyMaterial};
use sfeed_crypto::{BlobRepository, KeyManager};
use sfeed_doc::{
    verify_document, verify_with_key, DocumentVerification, SignError, SigningPipeline,
    VerifyOutcome,
};

use crate::config::Config;
use crate::{read_json, write_json};

/// Arguments for `sfeed sign`.
#[derive(Args, Debug)]
pub struct SignArgs {
    /// Document to sign.
    pub input: PathBuf,

    /// Key family to sign with. Its active key is used.
    #[arg(long)]
    pub key: String,

    /// Sign every item before signing the document.
    #[arg(long)]
    pub items: bool,

    /// Output path. Defaults to stdout.
    #[arg(short, long)]
    pub out: Option<PathBuf>,
}

/// Arguments for `sfeed verify`.
#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Signed document.
    pub input: PathBuf,

    /// Verify the document signature against this key instead of
    /// `author.public_key`. Item signatures are not checked.
    #[arg(long)]
    pub public_key: Option<String>,

    /// Print the full report as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Execute `sfeed sign`.
pub fn run_sign(args: &SignArgs, config: &Config) -> Result<u8> {
    let manager = config.open_key_manager()?;
    sign_file(args, &manager)
}

/// Sign the file named in `args` with keys from `manager`.
pub fn sign_file<R: BlobRepository>(args: &SignArgs, manager: &KeyManager<R>) -> Result<u8> {
    let key_id = KeyId::new(args.key.as_str())
        .with_context(|| format!("invalid key id {:?}", args.key))?;
    let document = read_json(&args.input)?;
    let pipeline = SigningPipeline::new(manager);
    let result = if args.items {
        pipeline.sign_items(&document, &key_id)
    } else {
        pipeline.sign(&document, &key_id)
    };
    let signed = match result {
        Ok(signed) => signed,
        Err(SignError::Invalid(report)) => {
            eprintln!("{}: {report}", args.input.display());
            return Ok(1);
        }
        Err(e) => {
            return Err(e).with_context(|| format!("failed to sign {}", args.input.display()))
        }
    };
    write_json(&signed, args.out.as_deref())?;
    Ok(0)
}

/// Execute `sfeed verify`.
pub fn run_verify(args: &VerifyArgs) -> Result<u8> {
    let document = read_json(&args.input)?;
    let valid = match &args.public_key {
        Some(key) => {
            let key = PublicKeyMaterial::parse(key).context("invalid --public-key")?;
            let outcome = verify_with_key(&document, &key);
            if args.json {
                write_json(&outcome, None)?;
            } else {
                println!("{}: {}", args.input.display(), describe(&outcome));
            }
            outcome.valid
        }
        None => {
            let report = verify_document(&document);
            if args.json {
                write_json(&report, None)?;
            } else {
                print_report(&args.input.display().to_string(), &document, &report);
            }
            report.is_valid()
        }
    };
    Ok(if valid { 0 } else { 1 })
}

fn describe(outcome: &VerifyOutcome) -> String {
    match (&outcome.reason, &outcome.detail) {
        (None, _) => "signature valid".to_string(),
        (Some(reason), Some(detail)) => format!("{reason}: {detail}"),
        (Some(reason), None) => reason.to_string(),
    }
}

fn print_report(name: &str, document: &Value, report: &DocumentVerification) {
    println!("{name}: {}", describe(&report.signature));
    if !report.validation.valid {
        println!("  structure: {}", report.validation);
    }
    for item in &report.items {
        let id = item.id.as_deref().unwrap_or("?");
        println!("  item {} ({id}): {}", item.index, describe(&item.outcome));
    }
    let unsigned = document
        .get("items")
        .and_then(Value::as_array)
        .map_or(0, |items| items.len() - report.items.len());
    if unsigned > 0 && !report.items.is_empty() {
        println!("  {unsigned} items carry no signature");
    }
}
