// src/snapshot.rs
//! Unified market snapshot: seven provider calls joined into one document.

use futures::future::BoxFuture;
use futures::FutureExt;
use metrics::counter;
use serde::Serialize;
use serde_json::Value;

use crate::error::{AggregatorError, AggregatorResult};
use crate::fanout::join_in_slot_order;
use crate::providers::interval::{BINANCE_INTERVALS, BYBIT_INTERVALS};
use crate::providers::{KlinesQuery, Market, Providers};
use crate::report::{AggregateStatus, SourceError};
use crate::settle::{settle, SettledOutcome};

/// Slot labels, in the order errors are reported.
pub const SNAPSHOT_SLOTS: [&str; 7] = [
    "bybit.klines",
    "bybit.orderbook",
    "bybit.trades",
    "binance.klines",
    "binance.orderbook",
    "binance.trades",
    "coinmarketcap.quotes",
];

pub const DEFAULT_INTERVAL: &str = "1h";
pub const DEFAULT_LIMIT: u32 = 200;
pub const DEFAULT_CONVERT: &str = "USD";

const BYBIT_ORDERBOOK_DEPTH: u32 = 50;
const BYBIT_TRADES_MAX: u32 = 200;
const BINANCE_ORDERBOOK_DEPTH: u32 = 100;
const BINANCE_TRADES_MAX: u32 = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotRequest {
    pub symbol: String,
    /// Common form ("1h", "1d"); translated per provider.
    pub interval: Option<String>,
    pub limit: u32,
    pub convert: String,
}

impl SnapshotRequest {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            interval: None,
            limit: DEFAULT_LIMIT,
            convert: DEFAULT_CONVERT.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExchangeSnapshot {
    pub klines: Option<Value>,
    pub orderbook: Option<Value>,
    pub trades: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotData {
    pub symbol: String,
    pub interval: String,
    pub convert: String,
    pub bybit: ExchangeSnapshot,
    pub binance: ExchangeSnapshot,
    pub coinmarketcap: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnifiedSnapshot {
    pub status: AggregateStatus,
    pub errors: Vec<SourceError>,
    pub data: SnapshotData,
}

impl UnifiedSnapshot {
    /// 200 when every slot succeeded, 207 Multi-Status otherwise.
    pub fn http_status(&self) -> u16 {
        match self.status {
            AggregateStatus::Ok => 200,
            AggregateStatus::Partial => 207,
        }
    }
}

#[derive(Clone)]
pub struct SnapshotAggregator {
    providers: Providers,
}

impl SnapshotAggregator {
    pub fn new(providers: Providers) -> Self {
        Self { providers }
    }

    pub async fn snapshot(&self, req: SnapshotRequest) -> AggregatorResult<UnifiedSnapshot> {
        let symbol = req.symbol.trim().to_string();
        if symbol.is_empty() {
            return Err(AggregatorError::ClientInput(
                "symbol query param is required".into(),
            ));
        }
        let interval = req
            .interval
            .as_deref()
            .map(str::trim)
            .filter(|i| !i.is_empty())
            .unwrap_or(DEFAULT_INTERVAL)
            .to_string();

        let outcomes = join_in_slot_order(self.branches(&symbol, &interval, &req)).await;

        let mut errors = Vec::new();
        let mut slots: Vec<Option<Value>> = Vec::with_capacity(SNAPSHOT_SLOTS.len());
        for (label, outcome) in SNAPSHOT_SLOTS.iter().zip(outcomes) {
            let outcome = outcome.unwrap_or_else(|| {
                SettledOutcome::Error("provider task did not complete".to_string())
            });
            if let Some(message) = outcome.error() {
                tracing::warn!(target: "snapshot", slot = *label, %symbol, error = message, "slot failed");
                errors.push(SourceError::new(*label, message));
            }
            slots.push(outcome.into_data());
        }

        let status = AggregateStatus::from_errors(&errors);
        counter!("snapshot_requests_total", "status" => status.as_str()).increment(1);

        let mut slots = slots.into_iter();
        let mut next = || slots.next().flatten();
        let bybit = ExchangeSnapshot {
            klines: next(),
            orderbook: next(),
            trades: next(),
        };
        let binance = ExchangeSnapshot {
            klines: next(),
            orderbook: next(),
            trades: next(),
        };
        let coinmarketcap = next();

        Ok(UnifiedSnapshot {
            status,
            errors,
            data: SnapshotData {
                symbol,
                interval,
                convert: req.convert,
                bybit,
                binance,
                coinmarketcap,
            },
        })
    }

    /// One settled future per slot, in `SNAPSHOT_SLOTS` order.
    fn branches(
        &self,
        symbol: &str,
        interval: &str,
        req: &SnapshotRequest,
    ) -> Vec<BoxFuture<'static, SettledOutcome>> {
        let limit = req.limit;
        let bybit_q = KlinesQuery::new(symbol, BYBIT_INTERVALS.normalize(Some(interval)), Some(limit));
        let binance_q =
            KlinesQuery::new(symbol, BINANCE_INTERVALS.normalize(Some(interval)), Some(limit));
        let cmc_symbols = vec![symbol.replace("USDT", "")];
        let convert = req.convert.clone();

        let bybit = &self.providers.bybit;
        let binance = &self.providers.binance;
        let cmc = self.providers.cmc.clone();

        vec![
            {
                let c = bybit.clone();
                async move { settle(c.klines(&bybit_q)).await }.boxed()
            },
            {
                let (c, s) = (bybit.clone(), symbol.to_string());
                async move { settle(c.orderbook(&s, Some(BYBIT_ORDERBOOK_DEPTH))).await }.boxed()
            },
            {
                let (c, s) = (bybit.clone(), symbol.to_string());
                async move { settle(c.recent_trades(&s, Some(limit.min(BYBIT_TRADES_MAX)))).await }
                    .boxed()
            },
            {
                let c = binance.clone();
                async move { settle(c.klines(Market::Futures, &binance_q)).await }.boxed()
            },
            {
                let (c, s) = (binance.clone(), symbol.to_string());
                async move {
                    settle(c.orderbook(Market::Futures, &s, Some(BINANCE_ORDERBOOK_DEPTH))).await
                }
                .boxed()
            },
            {
                let (c, s) = (binance.clone(), symbol.to_string());
                async move {
                    settle(c.trades(Market::Futures, &s, Some(limit.min(BINANCE_TRADES_MAX)))).await
                }
                .boxed()
            },
            async move { settle(cmc.quotes(&cmc_symbols, &convert)).await }.boxed(),
        ]
    }
}
