// src/config/provider.rs
use reqwest::header::{HeaderMap, HeaderValue, ORIGIN, REFERER};

use crate::error::{AggregatorError, AggregatorResult};

/// Ordered base URLs for one logical provider. Tried strictly in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderHostList {
    provider: String,
    hosts: Vec<String>,
}

impl ProviderHostList {
    pub fn new<I, S>(provider: impl Into<String>, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let hosts = hosts
            .into_iter()
            .map(|h| h.as_ref().trim().trim_end_matches('/').to_string())
            .filter(|h| !h.is_empty())
            .collect();
        Self {
            provider: provider.into(),
            hosts,
        }
    }

    /// Parse a comma-separated host list; blank entries are dropped.
    pub fn parse(provider: impl Into<String>, raw: &str) -> Self {
        Self::new(provider, raw.split(','))
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn hosts(&self) -> &[String] {
        &self.hosts
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}

/// Origin/Referer headers some exchanges expect from browser-like clients.
pub fn header_overrides(origin: &str, referer: &str) -> AggregatorResult<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(ORIGIN, header_value("origin", origin)?);
    headers.insert(REFERER, header_value("referer", referer)?);
    Ok(headers)
}

pub(crate) fn header_value(name: &str, value: &str) -> AggregatorResult<HeaderValue> {
    HeaderValue::from_str(value).map_err(|_| {
        AggregatorError::Configuration(format!("invalid {name} header value: {value:?}"))
    })
}
