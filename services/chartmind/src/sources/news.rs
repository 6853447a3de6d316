use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use url::Url;

use super::{HealthTracker, REQUEST_TIMEOUT_SECS};
use crate::probability::impact_score;
use crate::types::{EngineError, Headline, NewsFeed, SourceHealth};

pub const DEFAULT_NEWS_URL: &str = "https://finnhub.io/api/v1/news?category=forex";
/// Headlines kept per fetch
const MAX_HEADLINES: usize = 10;

/// Finnhub market news item. Every field is optional on the wire.
#[derive(Debug, Deserialize)]
struct NewsItem {
    headline: Option<String>,
    source: Option<String>,
    datetime: Option<i64>,
}

/// Finnhub market news client
/// Docs: https://finnhub.io/docs/api/market-news
pub struct NewsClient {
    client: Client,
    url: Url,
    health: HealthTracker,
}

impl NewsClient {
    pub fn new(news_url: &str, token: Option<&str>) -> Result<Self> {
        let mut url =
            Url::parse(news_url).with_context(|| format!("Invalid news URL: {}", news_url))?;
        if let Some(token) = token.filter(|t| !t.is_empty()) {
            url.query_pairs_mut().append_pair("token", token);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            url,
            health: HealthTracker::new(),
        })
    }

    pub fn health(&self) -> SourceHealth {
        self.health.snapshot("news")
    }

    async fn fetch(&self) -> Result<Vec<Headline>> {
        let response = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .context("Failed to send news request")?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("News API error: {} - {}", status, text);
        }

        let items: Vec<NewsItem> = response
            .json()
            .await
            .context("Failed to parse news response")?;

        Ok(items
            .into_iter()
            .take(MAX_HEADLINES)
            .map(|item| {
                let headline = item.headline.unwrap_or_default();
                Headline {
                    impact_score: impact_score(&headline),
                    headline,
                    source: item.source.unwrap_or_default(),
                    datetime: item.datetime.unwrap_or(0),
                }
            })
            .collect())
    }
}

#[async_trait::async_trait]
impl NewsFeed for NewsClient {
    async fn headlines(&self) -> crate::types::Result<Vec<Headline>> {
        let start = Instant::now();
        match self.fetch().await {
            Ok(headlines) => {
                self.health.record_success(start.elapsed().as_millis() as u64);
                debug!("Fetched {} headlines", headlines.len());
                Ok(headlines)
            }
            Err(e) => {
                warn!("News fetch failed: {:#}", e);
                self.health.record_failure(&e.to_string());
                Err(EngineError::Source(format!("{:#}", e)))
            }
        }
    }
}
