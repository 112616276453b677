// RSS/Atom feed reading.

use async_trait::async_trait;
use tracing::info;

use crate::entry::{parse_feed, ParsedFeed};
use crate::error::Result;
use crate::http::get_bytes;

/// Source of parsed feeds. Swapped for a mock in tests.
#[async_trait]
pub trait FeedReader: Send + Sync {
    async fn read(&self, feed_url: &str) -> Result<ParsedFeed>;
}

pub struct HttpFeedReader {
    client: reqwest::Client,
}

impl HttpFeedReader {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl FeedReader for HttpFeedReader {
    async fn read(&self, feed_url: &str) -> Result<ParsedFeed> {
        let bytes = get_bytes(&self.client, feed_url).await?;
        let feed = parse_feed(&bytes)?;
        info!(feed_url, entries = feed.entries.len(), "feed: parsed successfully");
        Ok(feed)
    }
}
