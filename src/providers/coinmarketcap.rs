// src/providers/coinmarketcap.rs
use reqwest::header::{HeaderMap, HeaderName};
use serde_json::Value;

use crate::config::{provider::header_value, provider::ProviderHostList, CmcConfig};
use crate::error::{AggregatorError, AggregatorResult};
use crate::upstream::HostFailoverFetcher;

const QUOTES_PATH: &str = "/v1/cryptocurrency/quotes/latest";
const GLOBAL_METRICS_PATH: &str = "/v1/global-metrics/quotes/latest";
const API_KEY_HEADER: &str = "x-cmc_pro_api_key";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmcMetric {
    Quotes,
    GlobalMetrics,
}

impl CmcMetric {
    pub fn parse(raw: &str) -> AggregatorResult<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "quotes" => Ok(Self::Quotes),
            "global-metrics" => Ok(Self::GlobalMetrics),
            other => Err(AggregatorError::ClientInput(format!(
                "Unsupported metric: {other}"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Quotes => "quotes",
            Self::GlobalMetrics => "global-metrics",
        }
    }
}

/// Split a comma-separated symbol list, dropping blanks.
pub fn parse_symbol_list(raw: Option<&str>) -> Vec<String> {
    raw.map(crate::config::split_list).unwrap_or_default()
}

#[derive(Clone)]
pub struct CmcClient {
    fetcher: HostFailoverFetcher,
    hosts: ProviderHostList,
    api_key: Option<String>,
}

impl CmcClient {
    pub fn new(fetcher: HostFailoverFetcher, cfg: &CmcConfig) -> Self {
        Self {
            fetcher,
            hosts: cfg.hosts.clone(),
            api_key: cfg.api_key.clone(),
        }
    }

    pub async fn quotes(&self, symbols: &[String], convert: &str) -> AggregatorResult<Value> {
        let symbols: Vec<&str> = symbols
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect();
        if symbols.is_empty() {
            return Err(AggregatorError::ClientInput(
                "symbols query param is required for quotes metric".into(),
            ));
        }
        let headers = self.auth_headers()?;
        let params = [
            ("symbol", Some(symbols.join(","))),
            ("convert", Some(convert.to_string())),
        ];
        let payload = self
            .fetcher
            .fetch(&self.hosts, QUOTES_PATH, &params, &headers)
            .await?;
        Ok(payload.into())
    }

    pub async fn global_metrics(&self, convert: &str) -> AggregatorResult<Value> {
        let headers = self.auth_headers()?;
        let params = [("convert", Some(convert.to_string()))];
        let payload = self
            .fetcher
            .fetch(&self.hosts, GLOBAL_METRICS_PATH, &params, &headers)
            .await?;
        Ok(payload.into())
    }

    /// Fails fast, before any network call, when no key is configured.
    fn auth_headers(&self) -> AggregatorResult<HeaderMap> {
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AggregatorError::Configuration("CMC_API_KEY missing".into()))?;
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static(API_KEY_HEADER),
            header_value("X-CMC_PRO_API_KEY", key)?,
        );
        Ok(headers)
    }
}
