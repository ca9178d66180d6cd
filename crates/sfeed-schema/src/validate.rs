//! # Document Validation
//!
//! One generic evaluator walks the rule tables in [`crate::rules`]. For each
//! object it runs, in order:
//!
//! 1. required fields
//! 2. types and patterns
//! 3. the content union
//! 4. length bounds
//! 5. nested objects and lists
//! 6. unknown fields (names starting with `_` are extensions and pass)
//! 7. recommended-field warnings
//!
//! A `null` value counts as absent. Fields that already failed a type or
//! pattern check are not length-checked or descended into, so one mistake
//! yields one error.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use sfeed_core::{PublicKeyMaterial, SignatureMaterial, TaggedValueError, Timestamp};

use crate::result::{IssueCode, ValidationIssue, ValidationResult};
use crate::rules::{FieldKind, FieldRule, ObjectKind, ObjectRules, MAX_TAG_LEN};

/// Current document format version.
pub const CURRENT_VERSION: &str = "https://signedfeed.org/version/1.0";

static VERSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https://signedfeed\.org/version/\d+\.\d+$").expect("version regex is valid")
});

static LANGUAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z]{2,3}(-[A-Za-z0-9]{2,8})*$").expect("language regex is valid")
});

static MIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9!#$&^_.+-]*/[A-Za-z0-9][A-Za-z0-9!#$&^_.+-]*$")
        .expect("mime regex is valid")
});

static TRAILING_COMMA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",\s*[}\]]").expect("trailing comma regex is valid"));

/// Validate a document, detecting whether it is a feed or a single item.
pub fn validate(document: &Value) -> ValidationResult {
    validate_as(document, detect_kind(document))
}

/// Validate a document as a feed.
pub fn validate_feed(document: &Value) -> ValidationResult {
    validate_as(document, ObjectKind::Feed)
}

/// Validate a document as a standalone item.
pub fn validate_item(document: &Value) -> ValidationResult {
    validate_as(document, ObjectKind::Item)
}

/// Parse and validate JSON text. Parse failures are an `INVALID_JSON`
/// error in the result.
pub fn validate_str(text: &str) -> ValidationResult {
    match serde_json::from_str::<Value>(text) {
        Ok(document) => validate(&document),
        Err(e) => {
            let mut suggestions = Vec::new();
            let trailing = TRAILING_COMMA_RE.is_match(text);
            if trailing {
                suggestions.push("Remove the trailing comma before the closing '}' or ']'".into());
            }
            if e.is_eof() {
                suggestions.push("The text ends early; check for unclosed brackets or quotes".into());
            }
            if !trailing {
                suggestions.push("Check for trailing commas".into());
            }
            suggestions.push("Use double quotes for all keys and strings".into());
            ValidationResult::from_issues(
                vec![ValidationIssue {
                    code: IssueCode::InvalidJson,
                    path: String::new(),
                    message: format!("document is not valid JSON: {e}"),
                    suggestions,
                }],
                Vec::new(),
            )
        }
    }
}

/// Validate a document against the rules for `kind`.
pub fn validate_as(document: &Value, kind: ObjectKind) -> ValidationResult {
    let mut eval = Evaluator::default();
    eval.object(document, kind.rules(), "");
    if document.is_object() && present(document.as_object(), "signature").is_none() {
        eval.warn(
            IssueCode::UnsignedDocument,
            "signature",
            "document is not signed and cannot be verified",
            ["Sign the document with the author's active key"],
        );
    }
    ValidationResult::from_issues(eval.errors, eval.warnings)
}

fn detect_kind(document: &Value) -> ObjectKind {
    let Some(obj) = document.as_object() else {
        return ObjectKind::Feed;
    };
    let feed_markers = ["items", "feed_url", "home_page_url", "version", "author"];
    let item_markers = ["date_published", "content_text", "content_html", "content_markdown"];
    if feed_markers.iter().any(|k| obj.contains_key(*k)) {
        ObjectKind::Feed
    } else if item_markers.iter().any(|k| obj.contains_key(*k)) {
        ObjectKind::Item
    } else {
        ObjectKind::Feed
    }
}

fn present<'a>(obj: Option<&'a Map<String, Value>>, name: &str) -> Option<&'a Value> {
    obj?.get(name).filter(|v| !v.is_null())
}

fn join(parent: &str, child: impl std::fmt::Display) -> String {
    if parent.is_empty() {
        child.to_string()
    } else {
        format!("{parent}.{child}")
    }
}

#[derive(Default)]
struct Evaluator {
    errors: Vec<ValidationIssue>,
    warnings: Vec<ValidationIssue>,
}

impl Evaluator {
    fn error<const N: usize>(
        &mut self,
        code: IssueCode,
        path: &str,
        message: impl Into<String>,
        suggestions: [&str; N],
    ) {
        self.error_owned(
            code,
            path,
            message,
            suggestions.iter().map(|s| s.to_string()).collect(),
        );
    }

    fn error_owned(
        &mut self,
        code: IssueCode,
        path: &str,
        message: impl Into<String>,
        suggestions: Vec<String>,
    ) {
        self.errors.push(ValidationIssue {
            code,
            path: path.to_string(),
            message: message.into(),
            suggestions,
        });
    }

    fn warn<const N: usize>(
        &mut self,
        code: IssueCode,
        path: &str,
        message: impl Into<String>,
        suggestions: [&str; N],
    ) {
        self.warnings.push(ValidationIssue {
            code,
            path: path.to_string(),
            message: message.into(),
            suggestions: suggestions.iter().map(|s| s.to_string()).collect(),
        });
    }

    fn object(&mut self, value: &Value, rules: &'static ObjectRules, path: &str) {
        let Some(obj) = value.as_object() else {
            let what = if path.is_empty() { "document" } else { path };
            self.error(
                IssueCode::InvalidType,
                path,
                format!("{what} must be a JSON object"),
                ["Wrap the fields in '{ ... }'"],
            );
            return;
        };
        let mut failed: HashSet<&'static str> = HashSet::new();

        for rule in rules.fields.iter().filter(|r| r.required) {
            if present(Some(obj), rule.name).is_none() {
                self.error(
                    IssueCode::MissingRequiredField,
                    &join(path, rule.name),
                    format!("required field '{}' is missing", rule.name),
                    [&format!("Add the '{}' field", rule.name) as &str],
                );
                failed.insert(rule.name);
            }
        }

        for rule in rules.fields {
            if let Some(v) = present(Some(obj), rule.name) {
                if !self.check_value(rule, v, &join(path, rule.name)) {
                    failed.insert(rule.name);
                }
            }
        }

        if !rules.content_union.is_empty()
            && !rules
                .content_union
                .iter()
                .any(|name| present(Some(obj), name).is_some())
        {
            let fields = rules.content_union.join(", ");
            self.error_owned(
                IssueCode::MissingContent,
                path,
                format!("at least one of {fields} is required"),
                rules
                    .content_union
                    .iter()
                    .map(|name| format!("Add a '{name}' field"))
                    .collect(),
            );
        }

        for rule in rules.fields {
            if failed.contains(rule.name) {
                continue;
            }
            if let Some(v) = present(Some(obj), rule.name) {
                self.check_length(rule, v, &join(path, rule.name));
            }
        }

        for rule in rules.fields {
            if failed.contains(rule.name) {
                continue;
            }
            let Some(v) = present(Some(obj), rule.name) else {
                continue;
            };
            let field_path = join(path, rule.name);
            match rule.kind {
                FieldKind::Object(kind) => self.object(v, kind.rules(), &field_path),
                FieldKind::List(kind) => self.list(v, kind.rules(), &field_path),
                _ => {}
            }
        }

        for key in obj.keys() {
            if key.starts_with('_') || rules.field(key).is_some() {
                continue;
            }
            let mut suggestions = Vec::new();
            if let Some(known) = near_match(rules, key) {
                suggestions.push(format!("Did you mean '{known}'?"));
            }
            suggestions.push(format!("Rename it to '_{key}' to keep it as an extension field"));
            suggestions.push("Remove the field".to_string());
            self.error_owned(
                IssueCode::UnknownField,
                &join(path, key),
                format!("unknown field '{key}'"),
                suggestions,
            );
        }

        for name in rules.recommended {
            if present(Some(obj), name).is_none() {
                self.warn(
                    IssueCode::MissingRecommendedField,
                    &join(path, name),
                    format!("recommended field '{name}' is missing"),
                    [&format!("Add a '{name}' field") as &str],
                );
            }
        }
    }

    fn list(&mut self, value: &Value, rules: &'static ObjectRules, path: &str) {
        let Some(entries) = value.as_array() else {
            return;
        };
        let tracks_ids = rules.field("id").is_some();
        let mut seen: HashMap<&str, usize> = HashMap::new();
        for (i, entry) in entries.iter().enumerate() {
            let entry_path = join(path, i);
            self.object(entry, rules, &entry_path);
            if !tracks_ids {
                continue;
            }
            let Some(id) = entry.get("id").and_then(Value::as_str) else {
                continue;
            };
            if let Some(first) = seen.get(id) {
                self.error_owned(
                    IssueCode::DuplicateId,
                    &join(&entry_path, "id"),
                    format!("id '{id}' is already used by {}", join(path, first)),
                    vec!["Give every entry a unique id".to_string()],
                );
            } else {
                seen.insert(id, i);
            }
        }
    }

    /// Type and pattern checks. Returns false if the value is unusable.
    fn check_value(&mut self, rule: &FieldRule, value: &Value, path: &str) -> bool {
        let type_ok = match rule.kind {
            FieldKind::Object(_) => value.is_object(),
            FieldKind::List(_) | FieldKind::TagList => value.is_array(),
            FieldKind::Count => value.is_number(),
            _ => value.is_string(),
        };
        if !type_ok {
            self.error(
                IssueCode::InvalidType,
                path,
                format!("'{}' must be a JSON {}", rule.name, rule.kind.json_type()),
                [&format!("Change '{}' to a {}", rule.name, rule.kind.json_type()) as &str],
            );
            return false;
        }

        match rule.kind {
            FieldKind::Count => {
                if value.as_u64().is_none() {
                    self.error(
                        IssueCode::InvalidFormat,
                        path,
                        format!("'{}' must be a non-negative integer", rule.name),
                        ["Use a whole number such as 0 or 12"],
                    );
                    return false;
                }
                true
            }
            FieldKind::TagList => {
                self.check_tags(value, path);
                true
            }
            FieldKind::Object(_) | FieldKind::List(_) => true,
            _ => match value.as_str() {
                Some(s) => self.check_string(rule, s, path),
                None => false,
            },
        }
    }

    fn check_string(&mut self, rule: &FieldRule, s: &str, path: &str) -> bool {
        match rule.kind {
            FieldKind::HttpsUrl => self.check_url(rule.name, s, path),
            FieldKind::Version => {
                if VERSION_RE.is_match(s) {
                    return true;
                }
                self.error(
                    IssueCode::InvalidPattern,
                    path,
                    "version must match https://signedfeed.org/version/<major>.<minor>",
                    [&format!("Use \"{CURRENT_VERSION}\"") as &str],
                );
                false
            }
            FieldKind::LanguageTag => {
                if LANGUAGE_RE.is_match(s) {
                    return true;
                }
                self.error(
                    IssueCode::InvalidPattern,
                    path,
                    format!("'{s}' is not a valid language tag"),
                    ["Use a BCP-47 tag such as \"en\" or \"pt-BR\""],
                );
                false
            }
            FieldKind::DateTime => match Timestamp::parse(s) {
                Ok(_) => true,
                Err(_) => {
                    self.error(
                        IssueCode::InvalidFormat,
                        path,
                        format!("'{}' must be an RFC 3339 date-time with a time and offset", rule.name),
                        ["Use a value such as \"2026-01-15T12:00:00Z\""],
                    );
                    false
                }
            },
            FieldKind::PublicKey => match PublicKeyMaterial::parse(s) {
                Ok(_) => true,
                Err(e) => {
                    self.tagged_error(&e, "public key", path);
                    false
                }
            },
            FieldKind::Signature => match SignatureMaterial::parse(s) {
                Ok(_) => true,
                Err(e) => {
                    self.tagged_error(&e, "signature", path);
                    false
                }
            },
            FieldKind::MimeType => {
                if MIME_RE.is_match(s) {
                    return true;
                }
                self.error(
                    IssueCode::InvalidPattern,
                    path,
                    format!("'{s}' is not a type/subtype MIME type"),
                    ["Use a MIME type such as \"image/png\" or \"audio/mpeg\""],
                );
                false
            }
            _ => true,
        }
    }

    fn check_url(&mut self, name: &str, s: &str, path: &str) -> bool {
        let url = match url::Url::parse(s) {
            Ok(url) => url,
            Err(e) => {
                self.error(
                    IssueCode::InvalidFormat,
                    path,
                    format!("'{name}' is not a valid absolute URL: {e}"),
                    ["Use an absolute URL such as \"https://example.com/feed.json\""],
                );
                return false;
            }
        };
        if url.scheme() == "https" {
            return true;
        }
        let mut suggestions = Vec::new();
        let mut upgraded = url.clone();
        if url.scheme() == "http" && upgraded.set_scheme("https").is_ok() {
            suggestions.push(format!("Use \"{upgraded}\""));
        }
        suggestions.push("Serve the resource over HTTPS".to_string());
        self.error_owned(
            IssueCode::InvalidPattern,
            path,
            format!("'{name}' must use HTTPS, got a {}:// URL", url.scheme()),
            suggestions,
        );
        false
    }

    fn tagged_error(&mut self, err: &TaggedValueError, what: &str, path: &str) {
        let (code, suggestion) = match err {
            TaggedValueError::MissingSeparator => (
                IssueCode::InvalidPattern,
                format!("Prefix the {what} with \"ed25519:\""),
            ),
            TaggedValueError::UnknownAlgorithm(_) => (
                IssueCode::InvalidPattern,
                "Only the \"ed25519:\" algorithm prefix is supported".to_string(),
            ),
            TaggedValueError::InvalidBase64(_) => (
                IssueCode::InvalidPattern,
                format!("Encode the {what} bytes as standard base64 after \"ed25519:\""),
            ),
            TaggedValueError::WrongLength { expected, .. } => (
                IssueCode::InvalidFormat,
                format!("An ed25519 {what} is exactly {expected} bytes"),
            ),
        };
        self.error_owned(
            code,
            path,
            format!("invalid {what}: {err}"),
            vec![suggestion, format!("Expected form: \"ed25519:<base64>\"")],
        );
    }

    fn check_tags(&mut self, value: &Value, path: &str) {
        let Some(tags) = value.as_array() else {
            return;
        };
        for (i, tag) in tags.iter().enumerate() {
            let tag_path = join(path, i);
            match tag.as_str() {
                None => self.error(
                    IssueCode::InvalidType,
                    &tag_path,
                    "tags must be strings",
                    ["Quote the tag value"],
                ),
                Some("") => self.error(
                    IssueCode::TooShort,
                    &tag_path,
                    "tag must be at least 1 character",
                    ["Remove the empty tag"],
                ),
                Some(t) if t.chars().count() > MAX_TAG_LEN => self.error(
                    IssueCode::TooLong,
                    &tag_path,
                    format!("tag must be at most {MAX_TAG_LEN} characters"),
                    [&format!("Shorten the tag to {MAX_TAG_LEN} characters or fewer") as &str],
                ),
                Some(_) => {}
            }
        }
    }

    fn check_length(&mut self, rule: &FieldRule, value: &Value, path: &str) {
        let (len, unit) = match (rule.kind, value) {
            (FieldKind::TagList, Value::Array(a)) => (a.len(), "entries"),
            (_, Value::String(s)) => (s.chars().count(), "characters"),
            _ => return,
        };
        if let Some(min) = rule.min_len {
            if len < min {
                let fix = if rule.required {
                    format!("Provide a non-empty '{}'", rule.name)
                } else {
                    format!("Remove '{}' or give it a value", rule.name)
                };
                self.error_owned(
                    IssueCode::TooShort,
                    path,
                    format!("'{}' must be at least {min} {unit}", rule.name),
                    vec![fix],
                );
            }
        }
        if let Some(max) = rule.max_len {
            if len > max {
                self.error_owned(
                    IssueCode::TooLong,
                    path,
                    format!("'{}' must be at most {max} {unit}, got {len}", rule.name),
                    vec![format!("Shorten '{}' to {max} {unit} or fewer", rule.name)],
                );
            }
        }
    }
}

/// A declared field that differs from `key` only in case or separators.
fn near_match(rules: &ObjectRules, key: &str) -> Option<&'static str> {
    let normalized = key.to_ascii_lowercase().replace('-', "_");
    rules
        .fields
        .iter()
        .map(|r| r.name)
        .find(|name| *name == normalized || name.replace('_', "") == normalized.replace('_', ""))
}
