//! Market & News Gateway: binary entrypoint
//! Boots the Axum HTTP server: configuration, tracing, metrics, routes.

use anyhow::Context;
use market_news_gateway::{app, metrics::Metrics, AppConfig};
use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Compact logs by default, JSON lines with LOG_FORMAT=json.
/// `try_init` leaves an already installed subscriber (e.g. the runtime's) in place.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("market_news_gateway=info,warn"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    let _ = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    init_tracing();

    let config = AppConfig::from_env().context("loading configuration")?;
    tracing::info!(
        sources = config.news_sources.len(),
        timeout_ms = config.http_timeout.as_millis() as u64,
        "configuration loaded"
    );

    let router = app(&config)?;
    let router = match Metrics::init() {
        Ok(metrics) => router.merge(metrics.router()),
        Err(e) => {
            tracing::warn!(error = %e, "metrics recorder not installed; /metrics disabled");
            router
        }
    };

    Ok(router.into())
}
