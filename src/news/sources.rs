// src/news/sources.rs
//! Static news source catalog.
//!
//! Built-in list, optionally replaced by a file:
//! 1) `$NEWS_SOURCES_PATH` (must exist)
//! 2) `config/news_sources.toml`
//! 3) `config/news_sources.json`
//! 4) built-in defaults

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::error::{AggregatorError, AggregatorResult};

fn default_weight() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceCatalogEntry {
    pub id: String,
    #[serde(default)]
    pub label: String,
    pub feed: String,
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default)]
    pub focus: Vec<String>,
}

impl SourceCatalogEntry {
    fn builtin(id: &str, label: &str, feed: &str, weight: f64, focus: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            feed: feed.to_string(),
            weight,
            focus: focus.iter().map(|f| f.to_string()).collect(),
        }
    }
}

/// Immutable, ordered catalog. Serializes as a map keyed by id, in catalog
/// order.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceCatalog {
    entries: Vec<SourceCatalogEntry>,
}

impl Default for SourceCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl SourceCatalog {
    pub fn builtin() -> Self {
        let entries = vec![
            SourceCatalogEntry::builtin(
                "coindesk",
                "CoinDesk",
                "https://www.coindesk.com/arc/outboundfeeds/rss/",
                1.0,
                &["markets", "regulation"],
            ),
            SourceCatalogEntry::builtin(
                "cointelegraph",
                "Cointelegraph",
                "https://cointelegraph.com/rss",
                0.9,
                &["markets", "altcoins"],
            ),
            SourceCatalogEntry::builtin(
                "theblock",
                "The Block",
                "https://www.theblock.co/rss.xml",
                0.9,
                &["institutional", "defi"],
            ),
            SourceCatalogEntry::builtin(
                "decrypt",
                "Decrypt",
                "https://decrypt.co/feed",
                0.8,
                &["web3", "culture"],
            ),
            SourceCatalogEntry::builtin(
                "bitcoinmagazine",
                "Bitcoin Magazine",
                "https://bitcoinmagazine.com/.rss/full/",
                0.8,
                &["bitcoin"],
            ),
            SourceCatalogEntry::builtin(
                "cryptoslate",
                "CryptoSlate",
                "https://cryptoslate.com/feed/",
                0.7,
                &["altcoins", "research"],
            ),
        ];
        Self { entries }
    }

    /// Drop entries with a blank id or feed, keep the first of duplicate ids,
    /// default a blank label to the id.
    pub fn from_entries(items: Vec<SourceCatalogEntry>) -> AggregatorResult<Self> {
        let mut seen = HashSet::new();
        let mut entries = Vec::with_capacity(items.len());
        for mut it in items {
            it.id = it.id.trim().to_string();
            it.feed = it.feed.trim().to_string();
            if it.id.is_empty() || it.feed.is_empty() || !seen.insert(it.id.clone()) {
                continue;
            }
            if it.label.trim().is_empty() {
                it.label = it.id.clone();
            }
            entries.push(it);
        }
        if entries.is_empty() {
            return Err(AggregatorError::Configuration(
                "news source catalog is empty".into(),
            ));
        }
        Ok(Self { entries })
    }

    /// Load using an explicit path, then the `config/` fallbacks, then the
    /// built-in list.
    pub fn load_with(explicit: Option<&str>) -> AggregatorResult<Self> {
        let loaded = match explicit {
            Some(p) => {
                let pb = PathBuf::from(p.trim());
                if !pb.exists() {
                    return Err(AggregatorError::Configuration(format!(
                        "NEWS_SOURCES_PATH points to non-existent path {}",
                        pb.display()
                    )));
                }
                Some(load_entries_from(&pb))
            }
            None => ["config/news_sources.toml", "config/news_sources.json"]
                .iter()
                .map(PathBuf::from)
                .find(|p| p.exists())
                .map(|p| load_entries_from(&p)),
        };

        match loaded {
            None => Ok(Self::builtin()),
            Some(Ok(items)) => {
                let catalog = Self::from_entries(items)?;
                tracing::info!(sources = catalog.len(), "news source catalog loaded from file");
                Ok(catalog)
            }
            Some(Err(e)) => Err(AggregatorError::Configuration(format!("{e:#}"))),
        }
    }

    pub fn get(&self, id: &str) -> Option<&SourceCatalogEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn ids(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for SourceCatalog {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for e in &self.entries {
            map.serialize_entry(&e.id, e)?;
        }
        map.end()
    }
}

/// Read catalog entries from TOML (`[[sources]]`) or a JSON array.
pub fn load_entries_from(path: &Path) -> Result<Vec<SourceCatalogEntry>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading news sources from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_entries(&content, &ext).with_context(|| format!("parsing {}", path.display()))
}

fn parse_entries(s: &str, hint_ext: &str) -> Result<Vec<SourceCatalogEntry>> {
    #[derive(Deserialize)]
    struct TomlCatalog {
        sources: Vec<SourceCatalogEntry>,
    }

    if hint_ext == "json" {
        return Ok(serde_json::from_str(s)?);
    }
    if let Ok(v) = toml::from_str::<TomlCatalog>(s) {
        return Ok(v.sources);
    }
    if let Ok(v) = serde_json::from_str::<Vec<SourceCatalogEntry>>(s) {
        return Ok(v);
    }
    Err(anyhow!("unsupported news sources format"))
}
