// src/upstream/mod.rs
pub mod failover;
pub mod transport;

pub use failover::{FetchResult, HostFailoverFetcher, Payload, QueryParams};
pub use transport::{HttpReply, HttpTransport, ReqwestTransport};

/// Scripted transport for unit tests: replies by URL prefix, records calls.
#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use reqwest::header::HeaderMap;
    use serde_json::Value;

    use super::transport::{HttpReply, HttpTransport};
    use crate::error::{AggregatorError, AggregatorResult};

    #[derive(Debug, Clone)]
    pub(crate) enum Scripted {
        Json(Value),
        RawJson(String),
        Text(String),
        Xml(String),
        Status(u16),
        Fail(String),
    }

    #[derive(Default)]
    pub(crate) struct ScriptedTransport {
        routes: Vec<(String, Scripted)>,
        calls: Mutex<Vec<(String, HeaderMap)>>,
    }

    impl ScriptedTransport {
        pub(crate) fn route(mut self, prefix: &str, reply: Scripted) -> Self {
            self.routes.push((prefix.to_string(), reply));
            self
        }

        pub(crate) fn calls(&self) -> Vec<String> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .map(|(u, _)| u.clone())
                .collect()
        }

        pub(crate) fn hits(&self, prefix: &str) -> usize {
            self.calls().iter().filter(|u| u.starts_with(prefix)).count()
        }

        pub(crate) fn last_headers(&self) -> Option<HeaderMap> {
            self.calls.lock().unwrap().last().map(|(_, h)| h.clone())
        }
    }

    #[async_trait]
    impl HttpTransport for ScriptedTransport {
        async fn get(
            &self,
            url: &str,
            headers: &HeaderMap,
            _timeout: Duration,
        ) -> AggregatorResult<HttpReply> {
            self.calls
                .lock()
                .unwrap()
                .push((url.to_string(), headers.clone()));

            // Longest matching prefix wins so "/v5/market/kline" can be
            // scripted apart from the rest of a host.
            let reply = self
                .routes
                .iter()
                .filter(|(p, _)| url.starts_with(p.as_str()))
                .max_by_key(|(p, _)| p.len())
                .map(|(_, r)| r.clone());

            let ok = |content_type: &str, body: String| {
                Ok(HttpReply {
                    status: 200,
                    content_type: Some(content_type.to_string()),
                    body,
                })
            };
            match reply {
                Some(Scripted::Json(v)) => ok("application/json; charset=utf-8", v.to_string()),
                Some(Scripted::RawJson(s)) => ok("application/json", s),
                Some(Scripted::Text(s)) => ok("text/plain", s),
                Some(Scripted::Xml(s)) => ok("application/rss+xml", s),
                Some(Scripted::Status(code)) => Ok(HttpReply {
                    status: code,
                    content_type: Some("text/plain".into()),
                    body: String::new(),
                }),
                Some(Scripted::Fail(msg)) => Err(AggregatorError::upstream(msg)),
                None => Err(AggregatorError::upstream("Connection failed: no route")),
            }
        }
    }
}
