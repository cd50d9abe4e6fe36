// src/upstream/failover.rs
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::Url;
use serde::Serialize;
use serde_json::Value;

use super::transport::{HttpReply, HttpTransport};
use crate::config::ProviderHostList;
use crate::error::{AggregatorError, AggregatorResult};

/// Decoded upstream body.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Payload {
    Json(Value),
    Text(String),
}

impl From<Payload> for Value {
    fn from(p: Payload) -> Self {
        match p {
            Payload::Json(v) => v,
            Payload::Text(s) => Value::String(s),
        }
    }
}

pub type FetchResult = AggregatorResult<Payload>;

/// Query parameters; `None` values are left out of the query string.
pub type QueryParams<'a> = [(&'a str, Option<String>)];

/// Tries equivalent hosts of one provider in order until one answers.
///
/// No delay between hosts and no second pass: a slow host costs the full
/// timeout before the next one is tried.
#[derive(Clone)]
pub struct HostFailoverFetcher {
    transport: Arc<dyn HttpTransport>,
    timeout: Duration,
}

impl HostFailoverFetcher {
    pub fn new(transport: Arc<dyn HttpTransport>, timeout: Duration) -> Self {
        Self { transport, timeout }
    }

    pub async fn fetch(
        &self,
        hosts: &ProviderHostList,
        path: &str,
        params: &QueryParams<'_>,
        headers: &HeaderMap,
    ) -> FetchResult {
        self.fetch_with_timeout(hosts, path, params, headers, self.timeout)
            .await
    }

    pub async fn fetch_with_timeout(
        &self,
        hosts: &ProviderHostList,
        path: &str,
        params: &QueryParams<'_>,
        headers: &HeaderMap,
        timeout: Duration,
    ) -> FetchResult {
        if hosts.is_empty() {
            return Err(AggregatorError::Configuration(format!(
                "No {} hosts available",
                hosts.provider()
            )));
        }

        let headers = merged_headers(headers);
        let mut last_error = None;

        for (attempt, host) in hosts.hosts().iter().enumerate() {
            let outcome = match build_url(host, path, params) {
                Ok(url) => match self.transport.get(url.as_str(), &headers, timeout).await {
                    Ok(reply) => decode(reply),
                    Err(e) => Err(e),
                },
                Err(e) => Err(e),
            };

            match outcome {
                Ok(payload) => {
                    if attempt > 0 {
                        tracing::info!(
                            provider = hosts.provider(),
                            host = %host,
                            attempt,
                            "upstream recovered on fallback host"
                        );
                    }
                    return Ok(payload);
                }
                Err(e) => {
                    tracing::warn!(
                        provider = hosts.provider(),
                        host = %host,
                        attempt,
                        status = ?e.status(),
                        error = %e,
                        "upstream host failed"
                    );
                    counter!("upstream_host_failures_total", "provider" => hosts.provider().to_string())
                        .increment(1);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            AggregatorError::upstream(format!("No {} hosts available", hosts.provider()))
        }))
    }
}

fn merged_headers(overrides: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("application/json,text/plain,*/*"),
    );
    headers.extend(overrides.clone());
    headers
}

pub(crate) fn build_url(host: &str, path: &str, params: &QueryParams<'_>) -> AggregatorResult<Url> {
    let mut url = Url::parse(&format!("{host}{path}"))
        .map_err(|e| AggregatorError::upstream(format!("Invalid upstream url {host}{path}: {e}")))?;
    let present: Vec<(&str, &str)> = params
        .iter()
        .filter_map(|(k, v)| v.as_deref().map(|v| (*k, v)))
        .collect();
    if !present.is_empty() {
        url.query_pairs_mut().extend_pairs(present);
    }
    Ok(url)
}

fn decode(reply: HttpReply) -> FetchResult {
    if !(200..300).contains(&reply.status) {
        return Err(AggregatorError::upstream_status(reply.status));
    }
    let is_json = reply
        .content_type
        .as_deref()
        .is_some_and(|ct| ct.to_ascii_lowercase().contains("application/json"));
    if is_json {
        serde_json::from_str(&reply.body)
            .map(Payload::Json)
            .map_err(|e| AggregatorError::upstream(format!("Invalid JSON body: {e}")))
    } else {
        Ok(Payload::Text(reply.body))
    }
}
