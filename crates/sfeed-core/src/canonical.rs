//! # Canonical Serialization
//!
//! This module defines `CanonicalBytes`, the sole construction path for the
//! bytes that signedfeed signs and verifies.
//!
//! ## Security Invariant
//!
//! `CanonicalBytes` has a private inner field. The only ways to build one are
//! [`CanonicalBytes::new()`], [`CanonicalBytes::from_value()`] and
//! [`CanonicalBytes::excluding_field()`], all of which run the writer below.
//! Any function that signs or verifies accepts `&CanonicalBytes`, so a raw
//! `serde_json::to_vec()` can never end up under a signature.
//!
//! ## Rules
//!
//! 1. **Objects**: keys sorted by Unicode code point ascending, written
//!    recursively, with no insignificant whitespace.
//! 2. **Arrays**: element order preserved exactly as given.
//! 3. **Strings**: standard JSON string escaping (`"`, `\`, control
//!    characters); everything else passes through as UTF-8.
//! 4. **Numbers**: integers as integers; floats in the shortest decimal form
//!    that round-trips, with integral floats below 10^15 written without a
//!    fractional part so `1.0` and `1` canonicalize identically.
//! 5. **Literals**: `true`, `false`, `null`.
//!
//! Sorting is done explicitly here rather than relying on the iteration order
//! of `serde_json::Map`, which changes if any crate in the build enables
//! serde_json's `preserve_order` feature.
//!
//! ## Determinism
//!
//! For every value `v`: `canonicalize(v) == canonicalize(permute_keys(v))`
//! and `canonicalize(parse(canonicalize(v))) == canonicalize(v)`.

use std::fmt::Write as _;

use serde::Serialize;
use serde_json::{Map, Number, Value};

use crate::error::CanonicalizationError;

/// Maximum nesting depth followed by the canonical writer.
pub const MAX_CANONICAL_DEPTH: usize = 128;

/// Floats with an integral value below this magnitude are written as
/// integers.
const INTEGRAL_FLOAT_LIMIT: f64 = 1e15;

/// Bytes produced exclusively by the canonical writer.
///
/// # Invariants
///
/// - Object keys are sorted by code point at every level.
/// - No whitespace outside string literals.
/// - The bytes are valid UTF-8 and valid JSON.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalBytes(Vec<u8>);

impl CanonicalBytes {
    /// Canonicalize any serializable value.
    ///
    /// # Errors
    ///
    /// `SerializationFailed` if the value cannot be represented as JSON,
    /// `DepthExceeded` if it nests past [`MAX_CANONICAL_DEPTH`].
    pub fn new(obj: &impl Serialize) -> Result<Self, CanonicalizationError> {
        let value = serde_json::to_value(obj)?;
        Self::from_value(&value)
    }

    /// Canonicalize an already-parsed JSON value.
    pub fn from_value(value: &Value) -> Result<Self, CanonicalizationError> {
        let mut out = String::new();
        write_value(&mut out, value, 0, None)?;
        Ok(Self(out.into_bytes()))
    }

    /// Canonicalize an object with one top-level field left out.
    ///
    /// This is the signing input for every signed object in the format: the
    /// object itself minus its `signature` field. Non-object values are
    /// canonicalized unchanged.
    pub fn excluding_field(value: &Value, field: &str) -> Result<Self, CanonicalizationError> {
        let mut out = String::new();
        write_value(&mut out, value, 0, Some(field))?;
        Ok(Self(out.into_bytes()))
    }

    /// Access the canonical bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Access the canonical text.
    pub fn as_str(&self) -> &str {
        // The writer only ever appends `str` data.
        std::str::from_utf8(&self.0).unwrap_or_default()
    }

    /// Returns the length of the canonical byte sequence.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the canonical byte sequence is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parse the canonical text back into a JSON value.
    pub fn to_value(&self) -> Result<Value, CanonicalizationError> {
        serde_json::from_slice(&self.0)
            .map_err(|e| CanonicalizationError::InvalidCanonicalText(e.to_string()))
    }
}

impl AsRef<[u8]> for CanonicalBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Display for CanonicalBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonicalize a JSON value to a string.
pub fn canonicalize(value: &Value) -> Result<String, CanonicalizationError> {
    let mut out = String::new();
    write_value(&mut out, value, 0, None)?;
    Ok(out)
}

fn write_value(
    out: &mut String,
    value: &Value,
    depth: usize,
    skip_field: Option<&str>,
) -> Result<(), CanonicalizationError> {
    if depth >= MAX_CANONICAL_DEPTH {
        return Err(CanonicalizationError::DepthExceeded {
            limit: MAX_CANONICAL_DEPTH,
        });
    }
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        Value::Number(n) => write_number(out, n),
        Value::String(s) => write_string(out, s)?,
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(out, item, depth + 1, None)?;
            }
            out.push(']');
        }
        Value::Object(map) => write_object(out, map, depth, skip_field)?,
    }
    Ok(())
}

fn write_object(
    out: &mut String,
    map: &Map<String, Value>,
    depth: usize,
    skip_field: Option<&str>,
) -> Result<(), CanonicalizationError> {
    let mut entries: Vec<(&String, &Value)> = map
        .iter()
        .filter(|(k, _)| Some(k.as_str()) != skip_field)
        .collect();
    // `str` ordering is byte-wise over UTF-8, which is code point order.
    entries.sort_by(|a, b| a.0.cmp(b.0));

    out.push('{');
    for (i, (key, value)) in entries.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        write_string(out, key)?;
        out.push(':');
        write_value(out, value, depth + 1, None)?;
    }
    out.push('}');
    Ok(())
}

fn write_string(out: &mut String, s: &str) -> Result<(), CanonicalizationError> {
    out.push_str(&serde_json::to_string(s)?);
    Ok(())
}

fn write_number(out: &mut String, n: &Number) {
    if n.is_i64() || n.is_u64() {
        let _ = write!(out, "{n}");
        return;
    }
    match n.as_f64() {
        Some(f) if f == 0.0 => out.push('0'),
        Some(f) if f.fract() == 0.0 && f.abs() < INTEGRAL_FLOAT_LIMIT => {
            let _ = write!(out, "{}", f as i64);
        }
        _ => {
            let _ = write!(out, "{n}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_canonical_bytes_simple_dict() {
        let data = json!({"b": 2, "a": 1, "c": "hello"});
        let cb = CanonicalBytes::new(&data).expect("should canonicalize");
        assert_eq!(cb.as_str(), r#"{"a":1,"b":2,"c":"hello"}"#);
    }

    #[test]
    fn test_canonical_bytes_nested() {
        let data = json!({
            "outer": {"b": 2, "a": 1},
            "list": [3, 2, 1]
        });
        let cb = CanonicalBytes::new(&data).unwrap();
        // Nested objects sorted, arrays untouched.
        assert_eq!(cb.as_str(), r#"{"list":[3,2,1],"outer":{"a":1,"b":2}}"#);
    }

    #[test]
    fn test_code_point_ordering() {
        // U+E000 sorts before U+1F600 by code point but after it by UTF-16
        // code unit; the canonical form follows code points.
        let data = json!({"\u{1F600}": 1, "\u{E000}": 2, "Z": 3, "a": 4});
        let s = canonicalize(&data).unwrap();
        assert_eq!(s, "{\"Z\":3,\"a\":4,\"\u{E000}\":2,\"\u{1F600}\":1}");
    }

    #[test]
    fn test_string_escaping() {
        let data = json!({"s": "line\nbreak \"quoted\" back\\slash \u{0001} café"});
        let s = canonicalize(&data).unwrap();
        assert_eq!(
            s,
            "{\"s\":\"line\\nbreak \\\"quoted\\\" back\\\\slash \\u0001 café\"}"
        );
    }

    #[test]
    fn test_floats_minimal_form() {
        assert_eq!(canonicalize(&json!(1.0)).unwrap(), "1");
        assert_eq!(canonicalize(&json!(-0.0)).unwrap(), "0");
        assert_eq!(canonicalize(&json!(0.1)).unwrap(), "0.1");
        assert_eq!(canonicalize(&json!(2.5e-7)).unwrap(), "2.5e-7");
        assert_eq!(canonicalize(&json!(1.5)).unwrap(), "1.5");
    }

    #[test]
    fn test_integers() {
        assert_eq!(canonicalize(&json!(-42)).unwrap(), "-42");
        assert_eq!(canonicalize(&json!(u64::MAX)).unwrap(), u64::MAX.to_string());
    }

    #[test]
    fn test_literals() {
        let data = json!({"t": true, "f": false, "n": null});
        assert_eq!(canonicalize(&data).unwrap(), r#"{"f":false,"n":null,"t":true}"#);
    }

    #[test]
    fn test_empty_containers() {
        assert_eq!(CanonicalBytes::new(&json!({})).unwrap().as_bytes(), b"{}");
        assert_eq!(CanonicalBytes::new(&json!([])).unwrap().as_bytes(), b"[]");
    }

    #[test]
    fn test_excluding_field_only_top_level() {
        let data = json!({
            "signature": "ed25519:AAAA",
            "title": "t",
            "items": [{"signature": "kept", "id": "x"}]
        });
        let cb = CanonicalBytes::excluding_field(&data, "signature").unwrap();
        assert_eq!(
            cb.as_str(),
            r#"{"items":[{"id":"x","signature":"kept"}],"title":"t"}"#
        );
    }

    #[test]
    fn test_excluding_field_equals_removal() {
        let mut data = json!({"b": 1, "signature": "x", "a": [1, 2]});
        let excluded = CanonicalBytes::excluding_field(&data, "signature").unwrap();
        data.as_object_mut().unwrap().remove("signature");
        assert_eq!(excluded, CanonicalBytes::from_value(&data).unwrap());
    }

    #[test]
    fn test_depth_limit_fails_fast() {
        let mut value = json!(0);
        for _ in 0..(MAX_CANONICAL_DEPTH + 5) {
            value = json!([value]);
        }
        match CanonicalBytes::from_value(&value) {
            Err(CanonicalizationError::DepthExceeded { limit }) => {
                assert_eq!(limit, MAX_CANONICAL_DEPTH)
            }
            other => panic!("expected DepthExceeded, got {other:?}"),
        }
    }

    #[test]
    fn test_order_independence_from_text() {
        let a: Value = serde_json::from_str(r#"{"x":{"q":1,"p":[true,null]},"a":"v"}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"a":"v","x":{"p":[true,null],"q":1}}"#).unwrap();
        assert_eq!(canonicalize(&a).unwrap(), canonicalize(&b).unwrap());
    }

    #[test]
    fn test_matches_jcs_for_ascii_integer_documents() {
        let data = json!({
            "version": "https://signedfeed.org/version/1.0",
            "items": [{"id": "https://a.example/1", "n": 3}],
            "author": {"name": "A", "public_key": "ed25519:AA=="}
        });
        let ours = canonicalize(&data).unwrap();
        let jcs = serde_jcs::to_string(&data).unwrap();
        assert_eq!(ours, jcs);
    }

    #[test]
    fn test_to_value_roundtrip() {
        let data = json!({"k": [1, "two", {"three": 3}]});
        let cb = CanonicalBytes::from_value(&data).unwrap();
        assert_eq!(cb.to_value().unwrap(), data);
    }
}
