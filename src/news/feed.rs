// src/news/feed.rs
//! RSS 2.0 / RSS 1.0 (RDF) / Atom reader.
//!
//! Every `<item>` or `<entry>` becomes a JSON object that keeps the entry's
//! elements as they appear in the document:
//! - text-only element -> string
//! - element with attributes or children -> object (`@attr`, child keys,
//!   `#text` for non-blank text)
//! - repeated child elements -> array

use std::time::Instant;

use metrics::histogram;
use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::Reader;
use serde_json::{Map, Value};

use crate::error::{AggregatorError, AggregatorResult};

const FEED_ROOTS: [&str; 3] = ["rss", "rdf:RDF", "feed"];

struct Node {
    name: String,
    attrs: Map<String, Value>,
    children: Vec<(String, Value)>,
    text: String,
}

impl Node {
    fn open(e: &BytesStart<'_>) -> Self {
        let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
        let mut attrs = Map::new();
        // Malformed attributes are skipped rather than failing the feed.
        for attr in e.attributes().flatten() {
            let key = format!("@{}", String::from_utf8_lossy(attr.key.as_ref()));
            let value = match attr.unescape_value() {
                Ok(v) => v.into_owned(),
                Err(_) => decode_entities(&String::from_utf8_lossy(&attr.value)),
            };
            attrs.insert(key, Value::String(value));
        }
        Self {
            name,
            attrs,
            children: Vec::new(),
            text: String::new(),
        }
    }

    fn into_value(self) -> Value {
        let text = self.text.trim();
        if self.attrs.is_empty() && self.children.is_empty() {
            return Value::String(text.to_string());
        }
        let mut obj = self.attrs;
        for (key, value) in self.children {
            match obj.get_mut(&key) {
                Some(Value::Array(items)) => items.push(value),
                Some(existing) => {
                    let first = existing.take();
                    *existing = Value::Array(vec![first, value]);
                }
                None => {
                    obj.insert(key, value);
                }
            }
        }
        if !text.is_empty() {
            obj.insert("#text".to_string(), Value::String(text.to_string()));
        }
        Value::Object(obj)
    }

    fn into_entry(self) -> Value {
        match self.into_value() {
            Value::String(s) if !s.is_empty() => {
                let mut obj = Map::new();
                obj.insert("#text".to_string(), Value::String(s));
                Value::Object(obj)
            }
            Value::Object(obj) => Value::Object(obj),
            _ => Value::Object(Map::new()),
        }
    }
}

fn is_entry(name: &str) -> bool {
    matches!(name, "item" | "entry" | "rss:item" | "atom:entry")
}

fn decode_entities(raw: &str) -> String {
    html_escape::decode_html_entities(raw).into_owned()
}

/// XML unescape first; HTML entities (`&nbsp;`, `&mdash;`, ...) that XML does
/// not know fall back to the html-escape decoder.
fn text_of(t: &BytesText<'_>) -> String {
    match t.unescape() {
        Ok(s) => s.into_owned(),
        Err(_) => decode_entities(&String::from_utf8_lossy(t)),
    }
}

/// Parse a feed document into raw entries, in document order.
///
/// CPU-bound; callers on the async runtime run it on the blocking pool.
pub fn parse_feed(xml: &str) -> AggregatorResult<Vec<Value>> {
    let t0 = Instant::now();
    let mut reader = Reader::from_str(xml);

    let mut stack: Vec<Node> = Vec::new();
    let mut entries = Vec::new();
    let mut saw_root = false;

    loop {
        let event = reader.read_event().map_err(|e| {
            AggregatorError::Parse(format!(
                "Invalid feed XML at position {}: {e}",
                reader.buffer_position()
            ))
        })?;

        match event {
            Event::Start(e) => {
                let node = Node::open(&e);
                if !saw_root {
                    check_root(&node.name)?;
                    saw_root = true;
                }
                stack.push(node);
            }
            Event::Empty(e) => {
                let node = Node::open(&e);
                if !saw_root {
                    check_root(&node.name)?;
                    saw_root = true;
                }
                close(node, &mut stack, &mut entries);
            }
            Event::Text(t) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&text_of(&t));
                }
            }
            Event::CData(c) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(&c));
                }
            }
            Event::End(_) => {
                if let Some(node) = stack.pop() {
                    close(node, &mut stack, &mut entries);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_root {
        return Err(AggregatorError::Parse("Empty feed document".into()));
    }

    histogram!("news_feed_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
    Ok(entries)
}

fn check_root(name: &str) -> AggregatorResult<()> {
    if FEED_ROOTS.contains(&name) {
        Ok(())
    } else {
        Err(AggregatorError::Parse(format!(
            "Unsupported feed document root <{name}>"
        )))
    }
}

/// Entries are collected (and detached from the tree); everything else is
/// attached to its parent.
fn close(node: Node, stack: &mut [Node], entries: &mut Vec<Value>) {
    if is_entry(&node.name) && !stack.is_empty() {
        entries.push(node.into_entry());
    } else if let Some(parent) = stack.last_mut() {
        let name = node.name.clone();
        parent.children.push((name, node.into_value()));
    }
}
