// src/providers/bybit.rs
use reqwest::header::HeaderMap;
use serde_json::{json, Value};

use super::{limit_or, KlinesQuery};
use crate::config::{provider::ProviderHostList, BybitConfig};
use crate::error::{AggregatorError, AggregatorResult};
use crate::upstream::{HostFailoverFetcher, Payload};

const KLINE_PATH: &str = "/v5/market/kline";
const ORDERBOOK_PATH: &str = "/v5/market/orderbook";
const TRADES_PATH: &str = "/v5/market/recent-trade";

/// Bybit v5 public market endpoints.
#[derive(Clone)]
pub struct BybitClient {
    fetcher: HostFailoverFetcher,
    hosts: ProviderHostList,
    headers: HeaderMap,
    category: String,
}

impl BybitClient {
    pub fn new(fetcher: HostFailoverFetcher, cfg: &BybitConfig) -> Self {
        Self {
            fetcher,
            hosts: cfg.hosts.clone(),
            headers: cfg.headers.clone(),
            category: cfg.category.clone(),
        }
    }

    /// Candles as Bybit returns them (`result.list`, newest first).
    pub async fn klines(&self, q: &KlinesQuery) -> AggregatorResult<Value> {
        let params = [
            ("category", Some(self.category.clone())),
            ("symbol", Some(q.symbol.clone())),
            ("interval", Some(q.interval.clone())),
            ("limit", q.limit.map(|l| l.to_string())),
            ("start", q.start.map(|s| s.to_string())),
            ("end", q.end.map(|e| e.to_string())),
        ];
        let payload = self
            .fetcher
            .fetch(&self.hosts, KLINE_PATH, &params, &self.headers)
            .await?;
        result_field(payload, Some("list"))
    }

    pub async fn orderbook(&self, symbol: &str, limit: Option<u32>) -> AggregatorResult<Value> {
        let params = [
            ("category", Some(self.category.clone())),
            ("symbol", Some(symbol.to_string())),
            ("limit", Some(limit_or(limit, 50).to_string())),
        ];
        let payload = self
            .fetcher
            .fetch(&self.hosts, ORDERBOOK_PATH, &params, &self.headers)
            .await?;
        result_field(payload, None)
    }

    pub async fn recent_trades(&self, symbol: &str, limit: Option<u32>) -> AggregatorResult<Value> {
        let params = [
            ("category", Some(self.category.clone())),
            ("symbol", Some(symbol.to_string())),
            ("limit", Some(limit_or(limit, 200).to_string())),
        ];
        let payload = self
            .fetcher
            .fetch(&self.hosts, TRADES_PATH, &params, &self.headers)
            .await?;
        result_field(payload, Some("list"))
    }
}

/// Unwrap Bybit's `{retCode, retMsg, result}` envelope.
///
/// A non-zero `retCode` arrives with HTTP 200, so it is turned into an
/// upstream failure here. A missing `result` (or `result.list`) yields an
/// empty object (or list).
fn result_field(payload: Payload, field: Option<&str>) -> AggregatorResult<Value> {
    let Payload::Json(body) = payload else {
        return Err(AggregatorError::upstream("Bybit returned a non-JSON body"));
    };

    if let Some(code) = body.get("retCode").and_then(Value::as_i64) {
        if code != 0 {
            let msg = body
                .get("retMsg")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            return Err(AggregatorError::upstream(format!(
                "Bybit error {code}: {msg}"
            )));
        }
    }

    let result = body.get("result").cloned().unwrap_or_else(|| json!({}));
    Ok(match field {
        Some(name) => result.get(name).cloned().unwrap_or_else(|| json!([])),
        None => result,
    })
}
