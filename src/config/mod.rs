// src/config/mod.rs
//! Process-wide configuration, built once at start and passed explicitly
//! into every component.

pub mod provider;

use std::time::Duration;

use reqwest::header::HeaderMap;

use crate::error::{AggregatorError, AggregatorResult};
use crate::news::sources::SourceCatalog;

pub use provider::{header_overrides, ProviderHostList};

pub const DEFAULT_BINANCE_SPOT_HOSTS: &str =
    "https://api.binance.com,https://api1.binance.com,https://data.binance.com";
pub const DEFAULT_BINANCE_FUTURES_HOSTS: &str =
    "https://fapi.binance.com,https://futures.binance.com";
pub const DEFAULT_BYBIT_HOSTS: &str = "https://api.bybit.com";
pub const DEFAULT_CMC_HOSTS: &str = "https://pro-api.coinmarketcap.com";
pub const DEFAULT_USER_AGENT: &str = "market-news-gateway/0.1";

const DEFAULT_HTTP_TIMEOUT_SECS: f64 = 8.0;
const DEFAULT_PARSE_WORKERS: usize = 4;

#[derive(Debug, Clone)]
pub struct BinanceConfig {
    pub spot_hosts: ProviderHostList,
    pub futures_hosts: ProviderHostList,
    /// Origin/Referer overrides sent with every request.
    pub headers: HeaderMap,
}

#[derive(Debug, Clone)]
pub struct BybitConfig {
    pub hosts: ProviderHostList,
    pub headers: HeaderMap,
    /// Market segment ("linear", "spot", "inverse", "option").
    pub category: String,
}

#[derive(Debug, Clone)]
pub struct CmcConfig {
    pub hosts: ProviderHostList,
    /// Missing key degrades only CoinMarketCap calls (fail fast, no network).
    pub api_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub binance: BinanceConfig,
    pub bybit: BybitConfig,
    pub cmc: CmcConfig,
    pub http_timeout: Duration,
    pub user_agent: String,
    pub cors_origins: Vec<String>,
    pub news_parse_workers: usize,
    pub news_sources: SourceCatalog,
}

impl AppConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> AggregatorResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from any key lookup (env, test map, ...).
    pub fn from_lookup<F>(lookup: F) -> AggregatorResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| -> String {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let binance = BinanceConfig {
            spot_hosts: ProviderHostList::parse(
                "binance-spot",
                &get("BINANCE_SPOT_HOSTS", DEFAULT_BINANCE_SPOT_HOSTS),
            ),
            futures_hosts: ProviderHostList::parse(
                "binance-futures",
                &get("BINANCE_FUTURES_HOSTS", DEFAULT_BINANCE_FUTURES_HOSTS),
            ),
            headers: header_overrides(
                &get("BINANCE_ORIGIN", "https://www.binance.com"),
                &get("BINANCE_REFERER", "https://www.binance.com"),
            )?,
        };

        let bybit = BybitConfig {
            hosts: ProviderHostList::parse("bybit", &get("BYBIT_BASE_URL", DEFAULT_BYBIT_HOSTS)),
            headers: header_overrides(
                &get("BYBIT_ORIGIN", "https://www.bybit.com"),
                &get("BYBIT_REFERER", "https://www.bybit.com"),
            )?,
            category: get("BYBIT_CATEGORY", "linear"),
        };

        let api_key = lookup("CMC_API_KEY")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
        if api_key.is_none() {
            tracing::warn!("CMC_API_KEY is not set; CoinMarketCap endpoints will fail");
        }
        let cmc = CmcConfig {
            hosts: ProviderHostList::parse("coinmarketcap", &get("CMC_BASE_URL", DEFAULT_CMC_HOSTS)),
            api_key,
        };

        let http_timeout = parse_timeout(lookup("GATEWAY_HTTP_TIMEOUT"))?;
        let news_parse_workers = parse_workers(lookup("NEWS_PARSE_WORKERS"))?;

        let cors_origins = split_list(&get("GATEWAY_CORS_ORIGINS", "*"));

        let sources_path = lookup("NEWS_SOURCES_PATH").filter(|p| !p.trim().is_empty());
        let news_sources = SourceCatalog::load_with(sources_path.as_deref())?;

        Ok(Self {
            binance,
            bybit,
            cmc,
            http_timeout,
            user_agent: get("GATEWAY_USER_AGENT", DEFAULT_USER_AGENT),
            cors_origins,
            news_parse_workers,
            news_sources,
        })
    }
}

pub(crate) fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_timeout(raw: Option<String>) -> AggregatorResult<Duration> {
    let Some(raw) = raw.filter(|v| !v.trim().is_empty()) else {
        return Ok(Duration::from_secs_f64(DEFAULT_HTTP_TIMEOUT_SECS));
    };
    let secs: f64 = raw.trim().parse().map_err(|_| {
        AggregatorError::Configuration(format!("GATEWAY_HTTP_TIMEOUT is not a number: {raw}"))
    })?;
    if secs <= 0.0 {
        return Err(AggregatorError::Configuration(
            "GATEWAY_HTTP_TIMEOUT must be positive".into(),
        ));
    }
    Duration::try_from_secs_f64(secs).map_err(|e| {
        AggregatorError::Configuration(format!("GATEWAY_HTTP_TIMEOUT out of range: {e}"))
    })
}

fn parse_workers(raw: Option<String>) -> AggregatorResult<usize> {
    match raw.filter(|v| !v.trim().is_empty()) {
        None => Ok(DEFAULT_PARSE_WORKERS),
        Some(v) => match v.trim().parse::<usize>() {
            Ok(n) if n > 0 => Ok(n),
            _ => Err(AggregatorError::Configuration(format!(
                "NEWS_PARSE_WORKERS must be a positive integer, got {v}"
            ))),
        },
    }
}
