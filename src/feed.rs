use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use futures::{future::BoxFuture, FutureExt};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::{config::FeedConfig, domain::Post};

/// Where scraped batches come from.
pub trait FeedSource: Send + Sync {
    fn fetch_latest(&self) -> BoxFuture<'_, Result<Vec<Post>>>;
}

/// Pulls the scraper's JSON export over HTTP.
pub struct HttpFeedSource {
    client: Client,
    config: FeedConfig,
}

/// One entry as the page scraper writes it. Any field may be missing when
/// the scraper could not find the matching element.
#[derive(Debug, Deserialize)]
struct ScrapedItem {
    from: Option<String>,
    time: Option<String>,
    message: Option<String>,
    link_to_post: Option<String>,
}

impl HttpFeedSource {
    pub fn new(client: Client, config: FeedConfig) -> Self {
        Self { client, config }
    }

    async fn fetch(&self) -> Result<Vec<Post>> {
        let response = self
            .client
            .get(self.config.url.clone())
            .timeout(self.config.fetch_timeout)
            .send()
            .await
            .with_context(|| format!("failed to fetch feed {}", self.config.url))?;

        let status = response.status();
        if !status.is_success() {
            bail!("feed {} returned status {status}", self.config.url);
        }

        let body = response.text().await?;
        parse_feed(&body, &self.config.url)
    }
}

impl FeedSource for HttpFeedSource {
    fn fetch_latest(&self) -> BoxFuture<'_, Result<Vec<Post>>> {
        self.fetch().boxed()
    }
}

/// Parses a scraper export into posts, newest first. Incomplete or malformed
/// items are dropped one by one; only a body that is not an array fails.
pub fn parse_feed(body: &str, base: &Url) -> Result<Vec<Post>> {
    let items: Vec<Value> =
        serde_json::from_str(body).context("feed body is not a JSON array of posts")?;

    let mut posts: Vec<Post> = items
        .into_iter()
        .filter_map(|raw| match serde_json::from_value::<ScrapedItem>(raw) {
            Ok(item) => into_post(item, base),
            Err(err) => {
                debug!(target: "feed", error = %err, "skipping malformed item");
                None
            }
        })
        .collect();
    posts.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    Ok(posts)
}

fn into_post(item: ScrapedItem, base: &Url) -> Option<Post> {
    let author = clean_str(item.from)?;
    let text = clean_str(item.message)?;
    let link = clean_str(item.link_to_post)?;
    let raw_time = clean_str(item.time)?;

    let timestamp = match DateTime::parse_from_rfc3339(&raw_time) {
        Ok(ts) => ts.with_timezone(&Utc),
        Err(err) => {
            debug!(target: "feed", error = %err, time = %raw_time, "skipping item with bad time");
            return None;
        }
    };

    let permalink = match base.join(&link) {
        Ok(url) => url.to_string(),
        Err(err) => {
            debug!(target: "feed", error = %err, link = %link, "skipping item with bad link");
            return None;
        }
    };

    Some(Post {
        author,
        timestamp,
        text,
        permalink,
    })
}

fn clean_str(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim().to_string();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    })
}
