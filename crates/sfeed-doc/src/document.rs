//! # Typed Document Model
//!
//! Producer-side types for building feeds and items. They serialize to the
//! JSON shape the validator and pipeline consume. Dates are kept as the
//! strings they were written with, an empty `tags` or `attachments` array
//! stays present, and every object keeps its unknown fields, so parsing a
//! valid signed document and writing it back does not change the signed
//! bytes. The one exception is an optional field written as an explicit
//! `null`, which the validator treats as absent and the model drops.
//!
//! Fields not in the model are captured in `extensions`. The validator
//! rejects those without a leading `_`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use sfeed_core::{PublicKeyMaterial, SignatureMaterial, Timestamp};
use sfeed_schema::CURRENT_VERSION;

/// Extension fields, keyed by name.
pub type Extensions = BTreeMap<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    pub public_key: PublicKeyMaterial,
    #[serde(flatten)]
    pub extensions: Extensions,
}

impl Author {
    pub fn new(name: impl Into<String>, public_key: PublicKeyMaterial) -> Self {
        Self {
            name: name.into(),
            url: None,
            avatar: None,
            public_key,
            extensions: Extensions::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub url: String,
    pub mime_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_in_bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt_text: Option<String>,
    #[serde(flatten)]
    pub extensions: Extensions,
}

/// Social counters. Carried as data only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Interactions {
    pub replies_count: u64,
    pub likes_count: u64,
    pub shares_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replies_url: Option<String>,
    #[serde(flatten)]
    pub extensions: Extensions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Globally unique HTTPS identity URL.
    pub id: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_html: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_markdown: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub date_published: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_modified: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<Attachment>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interactions: Option<Interactions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<SignatureMaterial>,
    #[serde(flatten)]
    pub extensions: Extensions,
}

impl Item {
    /// An item whose identity URL is also its content URL.
    pub fn new(id: impl Into<String>, published: Timestamp) -> Self {
        let id = id.into();
        Self {
            url: id.clone(),
            id,
            title: None,
            content_text: None,
            content_html: None,
            content_markdown: None,
            summary: None,
            date_published: published.to_iso8601(),
            date_modified: None,
            tags: None,
            attachments: None,
            interactions: None,
            signature: None,
            extensions: Extensions::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.content_text = Some(text.into());
        self
    }

    pub fn with_html(mut self, html: impl Into<String>) -> Self {
        self.content_html = Some(html.into());
        self
    }

    pub fn with_markdown(mut self, markdown: impl Into<String>) -> Self {
        self.content_markdown = Some(markdown.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.get_or_insert_with(Vec::new).push(attachment);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feed {
    pub version: String,
    pub title: String,
    pub home_page_url: String,
    pub feed_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    pub author: Author,
    pub items: Vec<Item>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<SignatureMaterial>,
    #[serde(flatten)]
    pub extensions: Extensions,
}

impl Feed {
    /// An empty feed at the current format version.
    pub fn new(
        title: impl Into<String>,
        home_page_url: impl Into<String>,
        feed_url: impl Into<String>,
        author: Author,
    ) -> Self {
        Self {
            version: CURRENT_VERSION.to_string(),
            title: title.into(),
            home_page_url: home_page_url.into(),
            feed_url: feed_url.into(),
            description: None,
            icon: None,
            language: None,
            author,
            items: Vec::new(),
            signature: None,
            extensions: Extensions::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn with_item(mut self, item: Item) -> Self {
        self.items.push(item);
        self
    }

    /// The JSON value form used by validation and signing.
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sfeed_schema::{validate, IssueCode};

    fn author() -> Author {
        Author::new("Ada", PublicKeyMaterial::Ed25519([3u8; 32]))
    }

    fn feed() -> Feed {
        let published = Timestamp::parse("2026-01-15T12:00:00Z").unwrap();
        Feed::new(
            "Notes",
            "https://example.org/",
            "https://example.org/feed.json",
            author(),
        )
        .with_description("Things")
        .with_icon("https://example.org/icon.png")
        .with_item(
            Item::new("https://example.org/1", published)
                .with_text("hello")
                .with_tags(["a", "b"]),
        )
    }

    #[test]
    fn built_feed_validates() {
        let r = validate(&feed().to_value().unwrap());
        assert!(r.valid, "{r}");
    }

    #[test]
    fn optional_fields_are_omitted() {
        let v = feed().to_value().unwrap();
        assert!(v.get("language").is_none());
        assert!(v.get("signature").is_none());
        assert!(v["items"][0].get("attachments").is_none());
        assert_eq!(v["items"][0]["date_published"], "2026-01-15T12:00:00Z");
    }

    #[test]
    fn extensions_roundtrip_and_are_validated() {
        let mut f = feed();
        f.extensions.insert("_theme".into(), serde_json::json!("dark"));
        f.extensions.insert("theme".into(), serde_json::json!("dark"));
        let v = f.to_value().unwrap();
        let back = Feed::from_value(v.clone()).unwrap();
        assert_eq!(back, f);
        let r = validate(&v);
        assert!(r.has_error(IssueCode::UnknownField, "theme"));
        assert!(!r.has_error(IssueCode::UnknownField, "_theme"));
    }

    #[test]
    fn empty_arrays_and_nested_extensions_survive_roundtrip() {
        let mut v = feed().to_value().unwrap();
        v["items"][0]["tags"] = serde_json::json!([]);
        v["items"][0]["attachments"] = serde_json::json!([]);
        v["items"][0]["interactions"] = serde_json::json!({
            "replies_count": 1,
            "likes_count": 2,
            "shares_count": 3,
            "_src": "mirror"
        });
        assert!(validate(&v).valid);
        let back = Feed::from_value(v.clone()).unwrap();
        let interactions = back.items[0].interactions.as_ref().unwrap();
        assert_eq!(interactions.extensions["_src"], "mirror");
        assert_eq!(back.items[0].tags, Some(Vec::new()));
        assert_eq!(back.to_value().unwrap(), v);
    }

    #[test]
    fn offset_dates_survive_roundtrip() {
        let mut v = feed().to_value().unwrap();
        v["items"][0]["date_published"] = serde_json::json!("2026-01-15T14:00:00+02:00");
        let back = Feed::from_value(v.clone()).unwrap().to_value().unwrap();
        assert_eq!(back, v);
    }
}
