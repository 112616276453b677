// Test doubles for the network seams.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::entry::{FeedEntry, ParsedFeed};
use crate::error::{FetchError, Result};
use crate::feed::FeedReader;
use crate::fulltext::FullTextSource;

/// Build a feed entry with a link, title and summary.
pub fn entry(link: &str, title: &str, summary: &str) -> FeedEntry {
    FeedEntry {
        link: link.to_string(),
        title: title.to_string(),
        summary: summary.to_string(),
        published: "2024-01-01T00:00:00+00:00".to_string(),
    }
}

// ---------------------------------------------------------------------------
// MockFeedReader
// ---------------------------------------------------------------------------

/// HashMap-based feed reader. Returns `Err` for unregistered URLs.
#[derive(Default)]
pub struct MockFeedReader {
    feeds: HashMap<String, ParsedFeed>,
}

impl MockFeedReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_feed(mut self, url: &str, entries: Vec<FeedEntry>) -> Self {
        self.feeds.insert(
            url.to_string(),
            ParsedFeed {
                title: None,
                entries,
            },
        );
        self
    }
}

#[async_trait]
impl FeedReader for MockFeedReader {
    async fn read(&self, feed_url: &str) -> Result<ParsedFeed> {
        self.feeds
            .get(feed_url)
            .cloned()
            .ok_or_else(|| FetchError::Status {
                url: feed_url.to_string(),
                status: 404,
            })
    }
}

// ---------------------------------------------------------------------------
// MockFullText
// ---------------------------------------------------------------------------

/// HashMap-based full-text source. Unregistered links fail, which is how
/// tests exercise the fall back to the summary.
#[derive(Default)]
pub struct MockFullText {
    pages: HashMap<String, String>,
    calls: AtomicUsize,
}

impl MockFullText {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_page(mut self, url: &str, text: &str) -> Self {
        self.pages.insert(url.to_string(), text.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FullTextSource for MockFullText {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn full_text(&self, url: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::EmptyContent(url.to_string()))
    }
}
