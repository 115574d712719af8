use anyhow::Context;
use async_trait::async_trait;
use time::OffsetDateTime;
use tracing::{info, warn};

use super::{fallback, normalizer::Normalizer, rss};
use crate::{config::FeedConfig, disasters::model::DisasterEvent};

/// Source of the raw feed document.
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch(&self) -> anyhow::Result<String>;
}

/// Fetches the feed over HTTP, bounded by the configured timeout.
#[derive(Clone)]
pub struct HttpFeed {
    client: reqwest::Client,
    url: String,
}

impl HttpFeed {
    pub fn new(config: &FeedConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!("disasterwatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("build feed http client")?;
        Ok(Self {
            client,
            url: config.url.clone(),
        })
    }
}

#[async_trait]
impl FeedSource for HttpFeed {
    async fn fetch(&self) -> anyhow::Result<String> {
        let body = self
            .client
            .get(&self.url)
            .send()
            .await
            .with_context(|| format!("GET {}", self.url))?
            .error_for_status()
            .context("feed returned an error status")?
            .text()
            .await
            .context("read feed body")?;
        Ok(body)
    }
}

/// A fixed document (`FEED_FILE`, tests).
#[derive(Clone)]
pub struct StaticFeed(pub String);

#[async_trait]
impl FeedSource for StaticFeed {
    async fn fetch(&self) -> anyhow::Result<String> {
        Ok(self.0.clone())
    }
}

/// Result of reading upstream data: either the real thing or a placeholder
/// substituted because upstream failed.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedOutcome<T> {
    Live(T),
    Degraded { data: T, reason: String },
}

impl<T> FeedOutcome<T> {
    pub fn is_degraded(&self) -> bool {
        matches!(self, FeedOutcome::Degraded { .. })
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            FeedOutcome::Live(_) => None,
            FeedOutcome::Degraded { reason, .. } => Some(reason),
        }
    }

    pub fn into_data(self) -> T {
        match self {
            FeedOutcome::Live(data) | FeedOutcome::Degraded { data, .. } => data,
        }
    }
}

async fn fetch_and_normalize(
    source: &dyn FeedSource,
    normalizer: &Normalizer,
    now: OffsetDateTime,
) -> anyhow::Result<Vec<DisasterEvent>> {
    let body = source.fetch().await?;
    let items = rss::parse_items(&body)?;
    Ok(normalizer.normalize_batch(&items, now))
}

/// Fetches and normalizes the feed. Any upstream failure yields the sample
/// dataset as `Degraded` instead of an error.
pub async fn fetch_events(
    source: &dyn FeedSource,
    normalizer: &Normalizer,
    now: OffsetDateTime,
) -> FeedOutcome<Vec<DisasterEvent>> {
    match fetch_and_normalize(source, normalizer, now).await {
        Ok(events) => {
            info!(count = events.len(), "feed fetched");
            FeedOutcome::Live(events)
        }
        Err(e) => {
            let reason = format!("{e:#}");
            warn!(%reason, "feed unavailable, using sample data");
            FeedOutcome::Degraded {
                data: fallback::sample_events(now),
                reason,
            }
        }
    }
}
