// src/upstream/transport.rs
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, CONTENT_TYPE};

use crate::error::{AggregatorError, AggregatorResult};

/// Raw reply of a single GET, before any status or content-type handling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

/// One GET against one URL. Transport errors (DNS, connect, timeout) come back
/// as `AggregatorError::Upstream` without a status.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(
        &self,
        url: &str,
        headers: &HeaderMap,
        timeout: Duration,
    ) -> AggregatorResult<HttpReply>;
}

/// Production transport: one pooled client shared by every request.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(user_agent: &str) -> AggregatorResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .connect_timeout(Duration::from_secs(4))
            .build()
            .map_err(|e| AggregatorError::Configuration(format!("building http client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(
        &self,
        url: &str,
        headers: &HeaderMap,
        timeout: Duration,
    ) -> AggregatorResult<HttpReply> {
        let resp = self
            .client
            .get(url)
            .headers(headers.clone())
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| describe(e, timeout))?;

        let status = resp.status().as_u16();
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = resp.text().await.map_err(|e| describe(e, timeout))?;

        Ok(HttpReply {
            status,
            content_type,
            body,
        })
    }
}

fn describe(e: reqwest::Error, timeout: Duration) -> AggregatorError {
    if e.is_timeout() {
        AggregatorError::upstream(format!(
            "Request timed out after {:.1}s",
            timeout.as_secs_f64()
        ))
    } else if e.is_connect() {
        AggregatorError::upstream(format!("Connection failed: {e}"))
    } else {
        AggregatorError::upstream(format!("Request failed: {e}"))
    }
}
