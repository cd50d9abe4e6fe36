// src/news/normalize.rs
use std::borrow::Cow;

use serde::Serialize;
use serde_json::{Map, Value};
use time::format_description::well_known::{Rfc2822, Rfc3339};
use time::{OffsetDateTime, UtcOffset};

use super::sources::SourceCatalogEntry;

/// Canonical news item. `raw` is the feed entry exactly as parsed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsItem {
    pub source: String,
    pub label: String,
    pub weight: f64,
    pub focus: Vec<String>,
    pub title: Option<String>,
    pub link: Option<String>,
    pub author: Option<Vec<String>>,
    pub summary: Option<String>,
    pub published_at: Option<String>,
    pub raw: Value,
}

/// Map one raw entry plus its source metadata into a `NewsItem`.
/// Never fails: unknown shapes degrade to `None`.
pub fn normalize_entry(meta: &SourceCatalogEntry, entry: &Value) -> NewsItem {
    NewsItem {
        source: meta.id.clone(),
        label: meta.label.clone(),
        weight: meta.weight,
        focus: meta.focus.clone(),
        title: field_text(entry, &["title"]),
        link: link_of(entry),
        author: authors_of(entry),
        summary: field_text(entry, &["description", "summary", "content", "content:encoded"]),
        published_at: field_text(entry, &["pubDate", "published", "dc:date", "updated"])
            .as_deref()
            .and_then(to_iso),
        raw: entry.clone(),
    }
}

/// Text of an element value: a string, an object's `#text`, or the first
/// array element's text.
fn text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Object(o) => o.get("#text").and_then(Value::as_str).map(str::to_string),
        Value::Array(items) => items.first().and_then(text),
        _ => None,
    }
}

fn field_text(entry: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| entry.get(*k).and_then(text))
}

/// RSS `<link>` text, or the Atom `<link href>` marked alternate (or without
/// `rel`), else the first link's href.
fn link_of(entry: &Value) -> Option<String> {
    fn href(o: &Map<String, Value>) -> Option<String> {
        o.get("@href")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| o.get("#text").and_then(Value::as_str).map(str::to_string))
    }
    fn is_alternate(o: &Map<String, Value>) -> bool {
        o.get("@rel")
            .and_then(Value::as_str)
            .map_or(true, |rel| rel == "alternate")
    }

    match entry.get("link")? {
        Value::String(s) => Some(s.clone()),
        Value::Object(o) => href(o),
        Value::Array(items) => items
            .iter()
            .find_map(|v| match v {
                Value::String(s) => Some(s.clone()),
                Value::Object(o) if is_alternate(o) => href(o),
                _ => None,
            })
            .or_else(|| items.iter().find_map(|v| v.as_object().and_then(href))),
        _ => None,
    }
}

/// Author-field shapes seen in the wild.
enum AuthorShape<'a> {
    /// `<author>Jane</author>`, `<dc:creator>Jane</dc:creator>`
    Plain(&'a str),
    /// `<author><name>Jane</name></author>`
    Record(&'a Map<String, Value>),
    /// `authors` list or repeated author elements: records and/or strings
    Sequence(&'a [Value]),
    Absent,
}

impl<'a> AuthorShape<'a> {
    fn of(v: Option<&'a Value>) -> Self {
        match v {
            Some(Value::String(s)) => Self::Plain(s),
            Some(Value::Object(o)) => Self::Record(o),
            Some(Value::Array(items)) => Self::Sequence(items),
            _ => Self::Absent,
        }
    }

    fn names(&self) -> Vec<String> {
        match self {
            Self::Plain(s) => non_blank(s).into_iter().collect(),
            Self::Record(o) => record_name(o).into_iter().collect(),
            Self::Sequence(items) => items
                .iter()
                .filter_map(|v| match v {
                    Value::String(s) => non_blank(s),
                    Value::Object(o) => record_name(o),
                    _ => None,
                })
                .collect(),
            Self::Absent => Vec::new(),
        }
    }
}

fn non_blank(s: &str) -> Option<String> {
    let t = s.trim();
    (!t.is_empty()).then(|| t.to_string())
}

fn record_name(o: &Map<String, Value>) -> Option<String> {
    o.get("name")
        .and_then(text)
        .or_else(|| o.get("#text").and_then(Value::as_str).map(str::to_string))
        .and_then(|s| non_blank(&s))
}

/// First author-bearing field that yields at least one name.
fn authors_of(entry: &Value) -> Option<Vec<String>> {
    ["authors", "author", "dc:creator", "creator"]
        .iter()
        .map(|k| AuthorShape::of(entry.get(*k)).names())
        .find(|names| !names.is_empty())
}

/// RFC 2822 (RSS) with an RFC 3339 fallback (Atom, Dublin Core), rendered as
/// RFC 3339 in UTC at whole seconds so string order matches time order.
pub fn to_iso(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let parsed = OffsetDateTime::parse(&utc_zone_as_offset(raw), &Rfc2822)
        .or_else(|_| OffsetDateTime::parse(raw, &Rfc3339))
        .ok()?;
    parsed
        .to_offset(UtcOffset::UTC)
        .replace_nanosecond(0)
        .ok()?
        .format(&Rfc3339)
        .ok()
}

/// `time` accepts `GMT` but not the `UT`/`UTC` zone names feeds also emit.
fn utc_zone_as_offset(raw: &str) -> Cow<'_, str> {
    match raw.rsplit_once(' ') {
        Some((head, "UT" | "UTC")) => Cow::Owned(format!("{head} +0000")),
        _ => Cow::Borrowed(raw),
    }
}
