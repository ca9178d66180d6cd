//! # Validate Subcommand
//!
//! Structural validation of one or more documents. Exit code 1 if any
//! document has errors; warnings alone do not fail.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use serde_json::Value;

use sfeed_schema::{validate_feed, validate_item, validate_str, ValidationResult};

/// Arguments for `sfeed validate`.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Documents to validate.
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Document kind. `auto` treats objects with `items` as feeds.
    #[arg(long, value_enum, default_value = "auto")]
    pub kind: DocumentKind,

    /// Print results as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum DocumentKind {
    Auto,
    Feed,
    Item,
}

/// Validate document text as the given kind.
pub fn check_text(text: &str, kind: DocumentKind) -> ValidationResult {
    let parsed = match kind {
        DocumentKind::Auto => None,
        _ => serde_json::from_str::<Value>(text).ok(),
    };
    match (kind, parsed) {
        (DocumentKind::Feed, Some(doc)) => validate_feed(&doc),
        (DocumentKind::Item, Some(doc)) => validate_item(&doc),
        // Auto-detection, or text that does not parse (reported as INVALID_JSON).
        _ => validate_str(text),
    }
}

/// Execute `sfeed validate`.
pub fn run_validate(args: &ValidateArgs) -> Result<u8> {
    let mut failed = 0usize;
    let mut reports = serde_json::Map::new();
    for path in &args.paths {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let result = check_text(&text, args.kind);
        if !result.valid {
            failed += 1;
        }
        if args.json {
            reports.insert(path.display().to_string(), serde_json::to_value(&result)?);
        } else {
            println!("{}: {result}", path.display());
        }
    }
    if args.json {
        crate::write_json(&reports, None)?;
    }
    tracing::info!(documents = args.paths.len(), failed, "validation finished");
    Ok(if failed == 0 { 0 } else { 1 })
}
