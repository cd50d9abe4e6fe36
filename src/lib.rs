// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod config;
pub mod error;
pub mod fanout;
pub mod metrics;
pub mod news;
pub mod providers;
pub mod report;
pub mod settle;
pub mod snapshot;
pub mod upstream;

use std::sync::Arc;

use anyhow::Context;
use axum::Router;

pub use crate::api::{router, AppState};
pub use crate::config::AppConfig;
pub use crate::error::{AggregatorError, AggregatorResult};

use crate::upstream::{HttpTransport, ReqwestTransport};

/// Full HTTP surface (without `/metrics`) over the shared reqwest client.
pub fn app(config: &AppConfig) -> anyhow::Result<Router> {
    let transport =
        ReqwestTransport::new(&config.user_agent).context("building upstream HTTP client")?;
    Ok(app_with_transport(config, Arc::new(transport)))
}

/// Same as [`app`], over any transport (tests script upstream replies).
pub fn app_with_transport(config: &AppConfig, transport: Arc<dyn HttpTransport>) -> Router {
    router(AppState::new(config, transport), &config.cors_origins)
}
