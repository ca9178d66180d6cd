//! # sfeed-cli: signedfeed Command-Line Interface
//!
//! ## Subcommands
//!
//! - `sfeed keys`: create, rotate, inspect, back up and rekey signing keys.
//! - `sfeed validate`: structural validation of feed and item documents.
//! - `sfeed sign`: sign a document (and optionally each item).
//! - `sfeed verify`: verify document and item signatures.
//! - `sfeed collection`: export and import document collections.
//!
//! Handlers return an exit code: `0` on success, `1` when a document or key
//! was checked and found invalid. Operational failures propagate as errors
//! and exit with `2`.
//!
//! ```bash
//! export SFEED_KEYSTORE_SECRET=...
//! sfeed keys create alice
//! sfeed sign feed.json --key alice --items -o signed.json
//! sfeed verify signed.json
//! ```

pub mod collection;
pub mod config;
pub mod keys;
pub mod sign;
pub mod validate;

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;

/// Read and parse a JSON file.
pub fn read_json(path: &Path) -> Result<Value> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("{} is not valid JSON", path.display()))
}

/// Pretty-print `value` to `out`, or to stdout when `out` is `None`.
pub fn write_json(value: &impl Serialize, out: Option<&Path>) -> Result<()> {
    let mut text = serde_json::to_string_pretty(value).context("failed to serialize output")?;
    text.push('\n');
    match out {
        Some(path) => std::fs::write(path, text)
            .with_context(|| format!("failed to write {}", path.display())),
        None => {
            print!("{text}");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        let value = serde_json::json!({"b": 1, "a": [true, null]});
        write_json(&value, Some(&path)).unwrap();
        assert_eq!(read_json(&path).unwrap(), value);
    }

    #[test]
    fn read_errors_name_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{").unwrap();
        let err = read_json(&path).unwrap_err();
        assert!(format!("{err:#}").contains("broken.json"));
        assert!(read_json(&dir.path().join("missing.json")).is_err());
    }
}
