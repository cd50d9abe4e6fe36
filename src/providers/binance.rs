// src/providers/binance.rs
use reqwest::header::HeaderMap;
use serde_json::Value;

use super::{limit_or, KlinesQuery};
use crate::config::{provider::ProviderHostList, BinanceConfig};
use crate::error::AggregatorResult;
use crate::upstream::HostFailoverFetcher;

/// Binance market segment; each has its own host list and path prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Market {
    Spot,
    Futures,
}

impl Market {
    /// "spot" selects spot; anything else is USDⓈ-M futures.
    pub fn parse(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("spot") {
            Self::Spot
        } else {
            Self::Futures
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Spot => "spot",
            Self::Futures => "futures",
        }
    }

    fn path(&self, endpoint: &str) -> String {
        match self {
            Self::Spot => format!("/api/v3/{endpoint}"),
            Self::Futures => format!("/fapi/v1/{endpoint}"),
        }
    }
}

#[derive(Clone)]
pub struct BinanceClient {
    fetcher: HostFailoverFetcher,
    spot_hosts: ProviderHostList,
    futures_hosts: ProviderHostList,
    headers: HeaderMap,
}

impl BinanceClient {
    pub fn new(fetcher: HostFailoverFetcher, cfg: &BinanceConfig) -> Self {
        Self {
            fetcher,
            spot_hosts: cfg.spot_hosts.clone(),
            futures_hosts: cfg.futures_hosts.clone(),
            headers: cfg.headers.clone(),
        }
    }

    pub async fn klines(&self, market: Market, q: &KlinesQuery) -> AggregatorResult<Value> {
        let params = [
            ("symbol", Some(q.symbol.clone())),
            ("interval", Some(q.interval.clone())),
            ("limit", q.limit.map(|l| l.to_string())),
            ("startTime", q.start.map(|s| s.to_string())),
            ("endTime", q.end.map(|e| e.to_string())),
        ];
        self.get(market, "klines", &params).await
    }

    pub async fn orderbook(
        &self,
        market: Market,
        symbol: &str,
        limit: Option<u32>,
    ) -> AggregatorResult<Value> {
        let params = [
            ("symbol", Some(symbol.to_string())),
            ("limit", Some(limit_or(limit, 100).to_string())),
        ];
        self.get(market, "depth", &params).await
    }

    pub async fn trades(
        &self,
        market: Market,
        symbol: &str,
        limit: Option<u32>,
    ) -> AggregatorResult<Value> {
        let params = [
            ("symbol", Some(symbol.to_string())),
            ("limit", Some(limit_or(limit, 200).to_string())),
        ];
        self.get(market, "trades", &params).await
    }

    async fn get(
        &self,
        market: Market,
        endpoint: &str,
        params: &[(&str, Option<String>)],
    ) -> AggregatorResult<Value> {
        let hosts = match market {
            Market::Spot => &self.spot_hosts,
            Market::Futures => &self.futures_hosts,
        };
        let payload = self
            .fetcher
            .fetch(hosts, &market.path(endpoint), params, &self.headers)
            .await?;
        Ok(payload.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::upstream::testing::{Scripted, ScriptedTransport};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn client(t: Arc<ScriptedTransport>) -> BinanceClient {
        let cfg = AppConfig::from_lookup(|k| match k {
            "BINANCE_SPOT_HOSTS" => Some("https://spot-a.test,https://spot-b.test".into()),
            "BINANCE_FUTURES_HOSTS" => Some("https://fut-a.test,https://fut-b.test".into()),
            _ => None,
        })
        .unwrap();
        BinanceClient::new(HostFailoverFetcher::new(t, Duration::from_secs(1)), &cfg.binance)
    }

    #[test]
    fn market_parse_defaults_to_futures() {
        assert_eq!(Market::parse("SPOT"), Market::Spot);
        assert_eq!(Market::parse("futures"), Market::Futures);
        assert_eq!(Market::parse("margin"), Market::Futures);
    }

    #[tokio::test]
    async fn futures_klines_fail_over_to_second_host() {
        let t = Arc::new(
            ScriptedTransport::default()
                .route("https://fut-a.test", Scripted::Fail("Request timed out after 1.0s".into()))
                .route("https://fut-b.test/fapi/v1/klines", Scripted::Json(json!([[1, "2"]]))),
        );
        let mut q = KlinesQuery::new("BTCUSDT", "1h", Some(3));
        q.start = Some(1_700_000_000_000);
        let got = client(t.clone()).klines(Market::Futures, &q).await.unwrap();
        assert_eq!(got, json!([[1, "2"]]));
        assert!(t.calls()[1].contains("startTime=1700000000000"));
        assert_eq!(t.hits("https://spot"), 0);
    }

    #[tokio::test]
    async fn spot_depth_uses_spot_hosts_and_default_limit() {
        let t = Arc::new(
            ScriptedTransport::default()
                .route("https://spot-a.test/api/v3/depth", Scripted::Json(json!({"bids": []}))),
        );
        client(t.clone())
            .orderbook(Market::Spot, "ETHUSDT", None)
            .await
            .unwrap();
        assert_eq!(
            t.calls(),
            vec!["https://spot-a.test/api/v3/depth?symbol=ETHUSDT&limit=100".to_string()]
        );
    }
}
