// tests/common/mod.rs
//
// Shared helpers for integration tests: an in-memory upstream transport,
// config built from a key map, and a tiny local HTTP upstream.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use reqwest::header::HeaderMap;
use serde_json::Value;
use tower::ServiceExt as _;

use market_news_gateway::upstream::{HttpReply, HttpTransport};
use market_news_gateway::{AggregatorError, AggregatorResult, AppConfig};

pub const BODY_LIMIT: usize = 1024 * 1024;

/// Replies by longest URL prefix; unmatched URLs fail like a dead host.
#[derive(Default)]
pub struct StubTransport {
    routes: Vec<(String, u16, &'static str, String)>,
    calls: Mutex<Vec<String>>,
}

impl StubTransport {
    pub fn json(self, prefix: &str, body: Value) -> Self {
        self.reply(prefix, 200, "application/json", body.to_string())
    }

    pub fn xml(self, prefix: &str, body: &str) -> Self {
        self.reply(prefix, 200, "application/rss+xml", body.to_string())
    }

    pub fn status(self, prefix: &str, code: u16) -> Self {
        self.reply(prefix, code, "text/plain", String::new())
    }

    fn reply(mut self, prefix: &str, status: u16, ct: &'static str, body: String) -> Self {
        self.routes.push((prefix.to_string(), status, ct, body));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpTransport for StubTransport {
    async fn get(
        &self,
        url: &str,
        _headers: &HeaderMap,
        _timeout: Duration,
    ) -> AggregatorResult<HttpReply> {
        self.calls.lock().unwrap().push(url.to_string());
        self.routes
            .iter()
            .filter(|(p, ..)| url.starts_with(p.as_str()))
            .max_by_key(|(p, ..)| p.len())
            .map(|(_, status, ct, body)| HttpReply {
                status: *status,
                content_type: Some(ct.to_string()),
                body: body.clone(),
            })
            .ok_or_else(|| AggregatorError::upstream("Connection failed: no route"))
    }
}

pub fn config_from(pairs: &[(&str, &str)]) -> AppConfig {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    AppConfig::from_lookup(|k| map.get(k).cloned()).expect("test config")
}

/// Stub-backed config: one host per provider, CMC key set.
pub fn stub_config() -> AppConfig {
    config_from(&[
        ("BYBIT_BASE_URL", "https://bybit.stub"),
        ("BINANCE_SPOT_HOSTS", "https://spot.stub"),
        ("BINANCE_FUTURES_HOSTS", "https://fut.stub"),
        ("CMC_BASE_URL", "https://cmc.stub"),
        ("CMC_API_KEY", "test-key"),
    ])
}

pub fn bybit_envelope(result: Value) -> Value {
    serde_json::json!({"retCode": 0, "retMsg": "OK", "result": result})
}

pub async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    let resp = app
        .clone()
        .oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body");
    let v = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, v)
}

/// Serve `router` on an ephemeral local port; returns its base URL.
pub async fn spawn_upstream(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind upstream");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    format!("http://{addr}")
}

/// A local URL nothing listens on.
pub async fn dead_host() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    format!("http://{addr}")
}

/// Router over a stub transport; the stub stays inspectable.
pub fn stub_app(config: &AppConfig, stub: StubTransport) -> (Router, Arc<StubTransport>) {
    let stub = Arc::new(stub);
    let app = market_news_gateway::app_with_transport(config, stub.clone());
    (app, stub)
}
