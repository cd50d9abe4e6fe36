// src/api.rs
use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, FromRequestParts, Query, State},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};

use crate::config::{split_list, AppConfig};
use crate::error::AggregatorError;
use crate::news::{NewsAggregateResult, NewsAggregator, NewsMode, NewsQuery};
use crate::news::{DEFAULT_LIMIT_PER_SOURCE, DEFAULT_MAX_ITEMS};
use crate::providers::coinmarketcap::parse_symbol_list;
use crate::providers::interval::{BINANCE_INTERVALS, BYBIT_INTERVALS};
use crate::providers::{CmcMetric, KlinesQuery, Market, MetricKind, Providers};
use crate::snapshot::{SnapshotAggregator, SnapshotRequest, UnifiedSnapshot};
use crate::snapshot::{DEFAULT_CONVERT, DEFAULT_LIMIT};
use crate::upstream::HttpTransport;

#[derive(Clone)]
pub struct AppState {
    pub providers: Providers,
    pub snapshot: SnapshotAggregator,
    pub news: NewsAggregator,
}

impl AppState {
    pub fn new(config: &AppConfig, transport: Arc<dyn HttpTransport>) -> Self {
        let providers = Providers::new(config, transport.clone());
        Self {
            snapshot: SnapshotAggregator::new(providers.clone()),
            news: NewsAggregator::new(config, transport),
            providers,
        }
    }
}

pub fn router(state: AppState, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/bybit", get(bybit))
        .route("/api/binance", get(binance))
        .route("/api/cmc", get(cmc))
        .route("/api/market", get(market))
        .route("/api/news", get(news))
        .layer(cors_layer(cors_origins))
        .with_state(state)
}

/// `*` (or nothing configured) allows any origin; otherwise only the listed
/// origins, with credentials.
fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return CorsLayer::very_permissive();
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

/// `{"detail": message}` with a status picked by error kind.
#[derive(Debug)]
pub struct ApiError(AggregatorError);

impl From<AggregatorError> for ApiError {
    fn from(e: AggregatorError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            AggregatorError::ClientInput(_) => StatusCode::BAD_REQUEST,
            AggregatorError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AggregatorError::Upstream { .. } | AggregatorError::Parse(_) => StatusCode::BAD_GATEWAY,
        };
        if status.is_server_error() {
            tracing::warn!(status = status.as_u16(), error = %self.0, "request failed");
        }
        (status, Json(json!({ "detail": self.0.to_string() }))).into_response()
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self(AggregatorError::ClientInput(rejection.body_text()))
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// `Query` whose rejection (e.g. `limit=abc`) is answered as `{"detail"}`.
#[derive(FromRequestParts)]
#[from_request(via(Query), rejection(ApiError))]
struct ApiQuery<T>(T);

fn required_symbol(raw: Option<&str>) -> Result<String, AggregatorError> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AggregatorError::ClientInput("symbol query param is required".into()))
}

#[derive(Debug, Deserialize)]
struct BybitParams {
    symbol: Option<String>,
    metric: Option<String>,
    interval: Option<String>,
    limit: Option<u32>,
    start: Option<i64>,
    end: Option<i64>,
}

async fn bybit(State(state): State<AppState>, ApiQuery(q): ApiQuery<BybitParams>) -> ApiResult<Json<Value>> {
    let metric = MetricKind::parse(q.metric.as_deref().unwrap_or("klines"))?;
    let symbol = required_symbol(q.symbol.as_deref())?;
    let client = &state.providers.bybit;

    let data = match metric {
        MetricKind::Klines => {
            let mut kq = KlinesQuery::new(
                symbol.as_str(),
                BYBIT_INTERVALS.normalize(q.interval.as_deref()),
                q.limit,
            );
            kq.start = q.start;
            kq.end = q.end;
            client.klines(&kq).await?
        }
        MetricKind::Orderbook => client.orderbook(&symbol, q.limit).await?,
        MetricKind::Trades => client.recent_trades(&symbol, q.limit).await?,
    };

    Ok(Json(json!({
        "source": "bybit",
        "metric": metric.as_str(),
        "symbol": symbol,
        "data": data,
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinanceParams {
    symbol: Option<String>,
    market: Option<String>,
    metric: Option<String>,
    interval: Option<String>,
    limit: Option<u32>,
    start_time: Option<i64>,
    end_time: Option<i64>,
}

async fn binance(
    State(state): State<AppState>,
    ApiQuery(q): ApiQuery<BinanceParams>,
) -> ApiResult<Json<Value>> {
    let metric = MetricKind::parse(q.metric.as_deref().unwrap_or("klines"))?;
    let symbol = required_symbol(q.symbol.as_deref())?;
    let market = Market::parse(q.market.as_deref().unwrap_or("futures"));
    let client = &state.providers.binance;

    let data = match metric {
        MetricKind::Klines => {
            let mut kq = KlinesQuery::new(
                symbol.as_str(),
                BINANCE_INTERVALS.normalize(q.interval.as_deref()),
                q.limit,
            );
            kq.start = q.start_time;
            kq.end = q.end_time;
            client.klines(market, &kq).await?
        }
        MetricKind::Orderbook => client.orderbook(market, &symbol, q.limit).await?,
        MetricKind::Trades => client.trades(market, &symbol, q.limit).await?,
    };

    Ok(Json(json!({
        "source": "binance",
        "market": market.as_str(),
        "metric": metric.as_str(),
        "symbol": symbol,
        "data": data,
    })))
}

#[derive(Debug, Deserialize)]
struct CmcParams {
    metric: Option<String>,
    symbols: Option<String>,
    convert: Option<String>,
}

async fn cmc(State(state): State<AppState>, ApiQuery(q): ApiQuery<CmcParams>) -> ApiResult<Json<Value>> {
    let metric = CmcMetric::parse(q.metric.as_deref().unwrap_or("quotes"))?;
    let convert = q
        .convert
        .filter(|c| !c.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_CONVERT.to_string());
    let client = &state.providers.cmc;

    let data = match metric {
        CmcMetric::Quotes => {
            client
                .quotes(&parse_symbol_list(q.symbols.as_deref()), &convert)
                .await?
        }
        CmcMetric::GlobalMetrics => client.global_metrics(&convert).await?,
    };

    Ok(Json(json!({
        "source": "coinmarketcap",
        "metric": metric.as_str(),
        "convert": convert,
        "data": data,
    })))
}

#[derive(Debug, Deserialize)]
struct MarketParams {
    symbol: Option<String>,
    interval: Option<String>,
    limit: Option<u32>,
    convert: Option<String>,
}

async fn market(
    State(state): State<AppState>,
    ApiQuery(q): ApiQuery<MarketParams>,
) -> ApiResult<(StatusCode, Json<UnifiedSnapshot>)> {
    let mut req = SnapshotRequest::new(q.symbol.unwrap_or_default());
    req.interval = q.interval;
    req.limit = q.limit.unwrap_or(DEFAULT_LIMIT);
    if let Some(convert) = q.convert.filter(|c| !c.trim().is_empty()) {
        req.convert = convert;
    }

    let snap = state.snapshot.snapshot(req).await?;
    let status = StatusCode::from_u16(snap.http_status()).unwrap_or(StatusCode::MULTI_STATUS);
    Ok((status, Json(snap)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewsParams {
    source: Option<String>,
    mode: Option<String>,
    limit_per_source: Option<usize>,
    max_items: Option<usize>,
}

async fn news(
    State(state): State<AppState>,
    ApiQuery(q): ApiQuery<NewsParams>,
) -> ApiResult<Json<NewsAggregateResult>> {
    let sources = q
        .source
        .as_deref()
        .map(split_list)
        .filter(|list| !list.is_empty());
    let limit_per_source = q.limit_per_source.unwrap_or(DEFAULT_LIMIT_PER_SOURCE);

    let result = match NewsMode::parse(q.mode.as_deref()) {
        NewsMode::Single => state.news.single(sources, limit_per_source).await?,
        NewsMode::Aggregate => {
            state
                .news
                .aggregate(NewsQuery {
                    sources,
                    limit_per_source,
                    max_items: q.max_items.unwrap_or(DEFAULT_MAX_ITEMS),
                })
                .await
        }
    };
    Ok(Json(result))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kinds_map_to_statuses() {
        let status = |e: AggregatorError| ApiError::from(e).into_response().status();
        assert_eq!(
            status(AggregatorError::ClientInput("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status(AggregatorError::Configuration("CMC_API_KEY missing".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status(AggregatorError::upstream_status(503)),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn blank_symbol_is_client_input() {
        assert!(matches!(
            required_symbol(Some("  ")),
            Err(AggregatorError::ClientInput(_))
        ));
        assert_eq!(required_symbol(Some(" BTCUSDT ")).unwrap(), "BTCUSDT");
    }
}
