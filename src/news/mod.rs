// src/news/mod.rs
pub mod feed;
pub mod normalize;
pub mod sources;

use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, histogram};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Semaphore;

use crate::config::AppConfig;
use crate::error::{AggregatorError, AggregatorResult};
use crate::fanout::join_in_slot_order;
use crate::report::{AggregateStatus, SourceError};
use crate::upstream::HttpTransport;

pub use feed::parse_feed;
pub use normalize::{normalize_entry, NewsItem};
pub use sources::{SourceCatalog, SourceCatalogEntry};

pub const UNSUPPORTED_SOURCE: &str = "Unsupported source";
const UNSUPPORTED_LABEL: &str = "unsupported";
pub const DEFAULT_LIMIT_PER_SOURCE: usize = 20;
pub const DEFAULT_MAX_ITEMS: usize = 100;

const FEED_ACCEPT: &str =
    "application/rss+xml, application/atom+xml, application/xml;q=0.9, text/xml;q=0.9, */*;q=0.8";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NewsMode {
    #[default]
    Aggregate,
    Single,
}

impl NewsMode {
    /// Only "single" switches modes; anything else aggregates.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some(m) if m.trim().eq_ignore_ascii_case("single") => Self::Single,
            _ => Self::Aggregate,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewsQuery {
    /// `None` or empty means the whole catalog.
    pub sources: Option<Vec<String>>,
    pub limit_per_source: usize,
    pub max_items: usize,
}

impl Default for NewsQuery {
    fn default() -> Self {
        Self {
            sources: None,
            limit_per_source: DEFAULT_LIMIT_PER_SOURCE,
            max_items: DEFAULT_MAX_ITEMS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsAggregateResult {
    pub status: AggregateStatus,
    pub requested_sources: Vec<String>,
    pub available_sources: SourceCatalog,
    /// Always `items.len()`.
    pub total: usize,
    pub items: Vec<NewsItem>,
    pub errors: Vec<SourceError>,
}

/// Fans out one feed fetch per requested source, then merges by recency.
#[derive(Clone)]
pub struct NewsAggregator {
    transport: Arc<dyn HttpTransport>,
    catalog: Arc<SourceCatalog>,
    parse_permits: Arc<Semaphore>,
    timeout: Duration,
}

impl NewsAggregator {
    pub fn new(config: &AppConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            catalog: Arc::new(config.news_sources.clone()),
            parse_permits: Arc::new(Semaphore::new(config.news_parse_workers)),
            timeout: config.http_timeout,
        }
    }

    pub async fn aggregate(&self, query: NewsQuery) -> NewsAggregateResult {
        let requested = match query.sources {
            Some(list) if !list.is_empty() => list,
            _ => self.catalog.ids(),
        };

        let branches: Vec<_> = requested
            .iter()
            .map(|id| {
                let this = self.clone();
                let id = id.clone();
                let limit = query.limit_per_source;
                async move { this.fetch_source(&id, limit).await }
            })
            .collect();
        let outcomes = join_in_slot_order(branches).await;

        let mut items = Vec::new();
        let mut errors = Vec::new();
        for (id, outcome) in requested.iter().zip(outcomes) {
            let failure = match outcome {
                Some(Ok(mut source_items)) => {
                    items.append(&mut source_items);
                    continue;
                }
                Some(Err(message)) => message,
                None => "Source task did not complete".to_string(),
            };
            // Caller-supplied ids share one series so labels stay bounded.
            let label = match self.catalog.get(id) {
                Some(_) => id.clone(),
                None => UNSUPPORTED_LABEL.to_string(),
            };
            counter!("news_source_errors_total", "source" => label).increment(1);
            errors.push(SourceError::new(id.as_str(), failure));
        }

        let items = rank_and_truncate(items, query.max_items);
        histogram!("news_items_returned").record(items.len() as f64);
        tracing::info!(
            target: "news",
            requested = requested.len(),
            items = items.len(),
            errors = errors.len(),
            "news aggregate"
        );

        NewsAggregateResult {
            status: AggregateStatus::from_errors(&errors),
            requested_sources: requested,
            available_sources: (*self.catalog).clone(),
            total: items.len(),
            items,
            errors,
        }
    }

    /// Exactly one source, overall cap equal to the per-source cap.
    pub async fn single(
        &self,
        sources: Option<Vec<String>>,
        limit_per_source: usize,
    ) -> AggregatorResult<NewsAggregateResult> {
        let sources = sources.unwrap_or_default();
        if sources.len() != 1 {
            return Err(AggregatorError::ClientInput(
                "mode=single requires exactly one source".into(),
            ));
        }
        let mut result = self
            .aggregate(NewsQuery {
                sources: Some(sources),
                limit_per_source,
                max_items: limit_per_source,
            })
            .await;
        result.status = AggregateStatus::from_errors(&result.errors);
        Ok(result)
    }

    /// One source's outcome, captured rather than raised.
    async fn fetch_source(&self, id: &str, limit: usize) -> Result<Vec<NewsItem>, String> {
        let Some(meta) = self.catalog.get(id) else {
            return Err(UNSUPPORTED_SOURCE.to_string());
        };
        let entries = self.fetch_feed(meta).await.map_err(|e| {
            tracing::warn!(target: "news", source = id, error = %e, "feed failed");
            e.to_string()
        })?;
        Ok(entries
            .iter()
            .take(limit)
            .map(|entry| normalize_entry(meta, entry))
            .collect())
    }

    async fn fetch_feed(&self, meta: &SourceCatalogEntry) -> AggregatorResult<Vec<Value>> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(FEED_ACCEPT));

        let reply = self
            .transport
            .get(&meta.feed, &headers, self.timeout)
            .await
            .map_err(|e| AggregatorError::Parse(e.to_string()))?;
        if !(200..300).contains(&reply.status) {
            return Err(AggregatorError::Parse(format!(
                "Feed request failed with status {}",
                reply.status
            )));
        }

        let permit = self
            .parse_permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| AggregatorError::Parse("feed parser pool closed".into()))?;
        let body = reply.body;
        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            parse_feed(&body)
        })
        .await
        .map_err(|e| AggregatorError::Parse(format!("feed parser task failed: {e}")))?
    }
}

/// Newest first; undated items last; equal keys keep their input order.
pub fn rank_and_truncate(mut items: Vec<NewsItem>, max_items: usize) -> Vec<NewsItem> {
    fn key(item: &NewsItem) -> &str {
        item.published_at.as_deref().unwrap_or("")
    }
    items.sort_by(|a, b| key(b).cmp(key(a)));
    items.truncate(max_items);
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::testing::{Scripted, ScriptedTransport};
    use serde_json::json;

    fn rss(titles_and_dates: &[(&str, Option<&str>)]) -> String {
        let items: String = titles_and_dates
            .iter()
            .map(|(title, date)| {
                let date = date
                    .map(|d| format!("<pubDate>{d}</pubDate>"))
                    .unwrap_or_default();
                format!("<item><title>{title}</title><link>https://x.test/{title}</link>{date}</item>")
            })
            .collect();
        format!("<rss version=\"2.0\"><channel><title>t</title>{items}</channel></rss>")
    }

    fn aggregator(t: Arc<ScriptedTransport>) -> NewsAggregator {
        let mut cfg = AppConfig::from_lookup(|_| None).unwrap();
        cfg.news_sources = SourceCatalog::from_entries(vec![
            SourceCatalogEntry {
                id: "alpha".into(),
                label: "Alpha".into(),
                feed: "https://alpha.test/rss".into(),
                weight: 1.0,
                focus: vec![],
            },
            SourceCatalogEntry {
                id: "beta".into(),
                label: "Beta".into(),
                feed: "https://beta.test/rss".into(),
                weight: 0.5,
                focus: vec!["defi".into()],
            },
        ])
        .unwrap();
        NewsAggregator::new(&cfg, t)
    }

    fn item(date: Option<&str>, title: &str) -> NewsItem {
        NewsItem {
            source: "s".into(),
            label: "S".into(),
            weight: 1.0,
            focus: vec![],
            title: Some(title.into()),
            link: None,
            author: None,
            summary: None,
            published_at: date.map(str::to_string),
            raw: json!({}),
        }
    }

    #[test]
    fn undated_items_sort_last_and_ties_keep_order() {
        let ranked = rank_and_truncate(
            vec![
                item(Some("2024-06-01T00:00:00Z"), "a"),
                item(None, "b"),
                item(Some("2024-01-01T00:00:00Z"), "c"),
                item(None, "d"),
                item(Some("2024-06-01T00:00:00Z"), "e"),
            ],
            10,
        );
        let titles: Vec<_> = ranked.iter().map(|i| i.title.clone().unwrap()).collect();
        assert_eq!(titles, vec!["a", "e", "c", "b", "d"]);
    }

    #[tokio::test]
    async fn unknown_source_is_reported_without_network() {
        let t = Arc::new(ScriptedTransport::default());
        let out = aggregator(t.clone())
            .aggregate(NewsQuery {
                sources: Some(vec!["unknownsrc".into()]),
                ..NewsQuery::default()
            })
            .await;
        assert_eq!(out.status, AggregateStatus::Partial);
        assert!(out.items.is_empty());
        assert_eq!(out.total, 0);
        assert_eq!(out.errors, vec![SourceError::new("unknownsrc", UNSUPPORTED_SOURCE)]);
        assert!(t.calls().is_empty());
        assert_eq!(out.available_sources.len(), 2);
    }

    #[tokio::test]
    async fn one_failing_feed_does_not_block_the_others() {
        let t = Arc::new(
            ScriptedTransport::default()
                .route(
                    "https://alpha.test",
                    Scripted::Xml(rss(&[
                        ("a1", Some("Mon, 01 Jan 2024 00:00:00 +0000")),
                        ("a2", Some("Sat, 01 Jun 2024 12:00:00 +0000")),
                    ])),
                )
                .route("https://beta.test", Scripted::Status(503)),
        );
        let out = aggregator(t).aggregate(NewsQuery::default()).await;
        assert_eq!(out.requested_sources, vec!["alpha", "beta"]);
        assert_eq!(out.status, AggregateStatus::Partial);
        assert_eq!(
            out.errors,
            vec![SourceError::new("beta", "Feed request failed with status 503")]
        );
        let titles: Vec<_> = out.items.iter().filter_map(|i| i.title.clone()).collect();
        assert_eq!(titles, vec!["a2", "a1"]);
        assert_eq!(out.items[0].published_at.as_deref(), Some("2024-06-01T12:00:00Z"));
    }

    #[tokio::test]
    async fn caps_bound_the_total() {
        let many: Vec<(String, Option<&str>)> = (0..6)
            .map(|i| (format!("n{i}"), Some("Fri, 15 Mar 2024 10:00:00 +0000")))
            .collect();
        let refs: Vec<(&str, Option<&str>)> =
            many.iter().map(|(t, d)| (t.as_str(), *d)).collect();
        let t = Arc::new(
            ScriptedTransport::default()
                .route("https://alpha.test", Scripted::Xml(rss(&refs)))
                .route("https://beta.test", Scripted::Xml(rss(&refs))),
        );
        let agg = aggregator(t);

        let out = agg
            .aggregate(NewsQuery {
                sources: None,
                limit_per_source: 4,
                max_items: 100,
            })
            .await;
        assert_eq!(out.total, 8);
        assert_eq!(out.status, AggregateStatus::Ok);

        let out = agg
            .aggregate(NewsQuery {
                sources: None,
                limit_per_source: 4,
                max_items: 5,
            })
            .await;
        assert_eq!(out.total, 5);
        assert_eq!(out.items.len(), out.total);
        // equal dates: alpha's items stay ahead of beta's
        assert!(out.items[..4].iter().all(|i| i.source == "alpha"));
    }

    #[tokio::test]
    async fn broken_feed_is_a_source_error() {
        let t = Arc::new(
            ScriptedTransport::default()
                .route("https://alpha.test", Scripted::Text("<html>nope</html>".into())),
        );
        let out = aggregator(t)
            .aggregate(NewsQuery {
                sources: Some(vec!["alpha".into()]),
                ..NewsQuery::default()
            })
            .await;
        assert_eq!(out.errors.len(), 1);
        assert!(out.errors[0].message.contains("Unsupported feed document root"));
    }

    #[tokio::test]
    async fn single_mode_requires_exactly_one_source() {
        let t = Arc::new(ScriptedTransport::default());
        let agg = aggregator(t.clone());
        for bad in [None, Some(vec![]), Some(vec!["alpha".into(), "beta".into()])] {
            let err = agg.single(bad, 20).await.unwrap_err();
            assert!(matches!(err, AggregatorError::ClientInput(_)));
        }
        assert!(t.calls().is_empty());
    }

    #[tokio::test]
    async fn single_mode_caps_items_at_the_per_source_limit() {
        let t = Arc::new(ScriptedTransport::default().route(
            "https://beta.test",
            Scripted::Xml(rss(&[("b1", None), ("b2", None), ("b3", None)])),
        ));
        let out = aggregator(t)
            .single(Some(vec!["beta".into()]), 2)
            .await
            .unwrap();
        assert_eq!(out.status, AggregateStatus::Ok);
        assert_eq!(out.total, 2);
        assert_eq!(out.items[0].label, "Beta");
        assert_eq!(out.items[0].focus, vec!["defi".to_string()]);
    }

    #[test]
    fn mode_parsing() {
        assert_eq!(NewsMode::parse(Some("SINGLE")), NewsMode::Single);
        assert_eq!(NewsMode::parse(Some("aggregate")), NewsMode::Aggregate);
        assert_eq!(NewsMode::parse(Some("whatever")), NewsMode::Aggregate);
        assert_eq!(NewsMode::parse(None), NewsMode::Aggregate);
    }
}
