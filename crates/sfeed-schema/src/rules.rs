//! # Field Rule Tables
//!
//! Every recognized field of every object kind is one [`FieldRule`] row.
//! The evaluator in [`crate::validate`] walks these tables; it has no
//! per-field logic of its own. Adding a field means adding a row.

/// What a field's value must look like.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Any string.
    Text,
    /// Absolute `https://` URL.
    HttpsUrl,
    /// `https://signedfeed.org/version/<major>.<minor>`.
    Version,
    /// BCP-47 subset, e.g. `en` or `pt-BR`.
    LanguageTag,
    /// RFC 3339 date-time with offset.
    DateTime,
    /// `<algorithm>:<base64>` public key.
    PublicKey,
    /// `<algorithm>:<base64>` signature.
    Signature,
    /// `type/subtype`.
    MimeType,
    /// Non-negative integer.
    Count,
    /// Array of short strings.
    TagList,
    /// Nested object.
    Object(ObjectKind),
    /// Array of nested objects.
    List(ObjectKind),
}

impl FieldKind {
    /// JSON type name used in `INVALID_TYPE` messages.
    pub const fn json_type(&self) -> &'static str {
        match self {
            Self::Count => "integer",
            Self::TagList | Self::List(_) => "array",
            Self::Object(_) => "object",
            _ => "string",
        }
    }
}

/// Object kinds with their own rule table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Feed,
    Item,
    Author,
    Attachment,
    Interactions,
}

impl ObjectKind {
    /// The rule table for this kind.
    pub fn rules(&self) -> &'static ObjectRules {
        match self {
            Self::Feed => &FEED,
            Self::Item => &ITEM,
            Self::Author => &AUTHOR,
            Self::Attachment => &ATTACHMENT,
            Self::Interactions => &INTERACTIONS,
        }
    }
}

/// One row of a rule table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRule {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    /// Minimum length in characters (strings) or entries (tag lists).
    pub min_len: Option<usize>,
    /// Maximum length in characters (strings) or entries (tag lists).
    pub max_len: Option<usize>,
}

impl FieldRule {
    const fn required(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: true,
            min_len: None,
            max_len: None,
        }
    }

    const fn optional(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: false,
            min_len: None,
            max_len: None,
        }
    }

    const fn bounded(mut self, min: usize, max: usize) -> Self {
        self.min_len = Some(min);
        self.max_len = Some(max);
        self
    }
}

/// The full rule set for one object kind.
#[derive(Debug)]
pub struct ObjectRules {
    pub kind: ObjectKind,
    pub fields: &'static [FieldRule],
    /// At least one of these must be present. Empty means no union rule.
    pub content_union: &'static [&'static str],
    /// Optional fields whose absence is a warning.
    pub recommended: &'static [&'static str],
}

impl ObjectRules {
    pub fn field(&self, name: &str) -> Option<&'static FieldRule> {
        self.fields.iter().find(|r| r.name == name)
    }
}

/// Maximum length of a tag.
pub const MAX_TAG_LEN: usize = 50;

use FieldKind::*;

pub static FEED: ObjectRules = ObjectRules {
    kind: ObjectKind::Feed,
    fields: &[
        FieldRule::required("version", Version),
        FieldRule::required("title", Text).bounded(1, 200),
        FieldRule::required("home_page_url", HttpsUrl),
        FieldRule::required("feed_url", HttpsUrl),
        FieldRule::optional("description", Text).bounded(1, 2000),
        FieldRule::optional("icon", HttpsUrl),
        FieldRule::optional("language", LanguageTag),
        FieldRule::required("author", Object(ObjectKind::Author)),
        FieldRule::required("items", List(ObjectKind::Item)),
        FieldRule::optional("signature", Signature),
    ],
    content_union: &[],
    recommended: &["description", "icon"],
};

pub static ITEM: ObjectRules = ObjectRules {
    kind: ObjectKind::Item,
    fields: &[
        FieldRule::required("id", HttpsUrl),
        FieldRule::required("url", HttpsUrl),
        FieldRule::optional("title", Text).bounded(1, 200),
        FieldRule::optional("content_text", Text).bounded(1, 100_000),
        FieldRule::optional("content_html", Text).bounded(1, 100_000),
        FieldRule::optional("content_markdown", Text).bounded(1, 100_000),
        FieldRule::optional("summary", Text).bounded(1, 500),
        FieldRule::required("date_published", DateTime),
        FieldRule::optional("date_modified", DateTime),
        FieldRule::optional("tags", TagList).bounded(0, 20),
        FieldRule::optional("attachments", List(ObjectKind::Attachment)),
        FieldRule::optional("interactions", Object(ObjectKind::Interactions)),
        FieldRule::optional("signature", Signature),
    ],
    content_union: &["content_text", "content_html", "content_markdown"],
    recommended: &[],
};

pub static AUTHOR: ObjectRules = ObjectRules {
    kind: ObjectKind::Author,
    fields: &[
        FieldRule::required("name", Text).bounded(1, 100),
        FieldRule::optional("url", HttpsUrl),
        FieldRule::optional("avatar", HttpsUrl),
        FieldRule::required("public_key", PublicKey),
    ],
    content_union: &[],
    recommended: &[],
};

pub static ATTACHMENT: ObjectRules = ObjectRules {
    kind: ObjectKind::Attachment,
    fields: &[
        FieldRule::required("url", HttpsUrl),
        FieldRule::required("mime_type", MimeType),
        FieldRule::optional("title", Text).bounded(1, 200),
        FieldRule::optional("size_in_bytes", Count),
        FieldRule::optional("width", Count),
        FieldRule::optional("height", Count),
        FieldRule::optional("alt_text", Text).bounded(1, 1000),
    ],
    content_union: &[],
    recommended: &[],
};

pub static INTERACTIONS: ObjectRules = ObjectRules {
    kind: ObjectKind::Interactions,
    fields: &[
        FieldRule::required("replies_count", Count),
        FieldRule::required("likes_count", Count),
        FieldRule::required("shares_count", Count),
        FieldRule::optional("replies_url", HttpsUrl),
    ],
    content_union: &[],
    recommended: &[],
};
