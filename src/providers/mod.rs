// src/providers/mod.rs
pub mod binance;
pub mod bybit;
pub mod coinmarketcap;
pub mod interval;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::error::{AggregatorError, AggregatorResult};
use crate::upstream::{HostFailoverFetcher, HttpTransport};

pub use binance::{BinanceClient, Market};
pub use bybit::BybitClient;
pub use coinmarketcap::{CmcClient, CmcMetric};

/// Per-exchange metric served by the single-provider endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Klines,
    Orderbook,
    Trades,
}

impl MetricKind {
    pub fn parse(raw: &str) -> AggregatorResult<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "klines" => Ok(Self::Klines),
            "orderbook" => Ok(Self::Orderbook),
            "trades" => Ok(Self::Trades),
            other => Err(AggregatorError::ClientInput(format!(
                "Unsupported metric: {other}"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Klines => "klines",
            Self::Orderbook => "orderbook",
            Self::Trades => "trades",
        }
    }
}

/// Candle request in the provider's own interval vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KlinesQuery {
    pub symbol: String,
    pub interval: String,
    pub limit: Option<u32>,
    pub start: Option<i64>,
    pub end: Option<i64>,
}

impl KlinesQuery {
    pub fn new(symbol: impl Into<String>, interval: impl Into<String>, limit: Option<u32>) -> Self {
        Self {
            symbol: symbol.into(),
            interval: interval.into(),
            limit,
            start: None,
            end: None,
        }
    }
}

/// Every market-data adapter, sharing one fetcher (and its connection pool).
#[derive(Clone)]
pub struct Providers {
    pub binance: BinanceClient,
    pub bybit: BybitClient,
    pub cmc: CmcClient,
}

impl Providers {
    pub fn new(config: &AppConfig, transport: Arc<dyn HttpTransport>) -> Self {
        let fetcher = HostFailoverFetcher::new(transport, config.http_timeout);
        Self {
            binance: BinanceClient::new(fetcher.clone(), &config.binance),
            bybit: BybitClient::new(fetcher.clone(), &config.bybit),
            cmc: CmcClient::new(fetcher, &config.cmc),
        }
    }
}

/// `limit or default` semantics: absent and zero both mean "use the default".
pub(crate) fn limit_or(limit: Option<u32>, default: u32) -> u32 {
    limit.filter(|l| *l > 0).unwrap_or(default)
}
