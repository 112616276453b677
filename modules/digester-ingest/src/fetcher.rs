// Feed fetch run: read each feed, store every new entry with its full text.

use std::fmt;

use digester_common::{FeedSource, FetchSettings};
use digester_store::{ArticleStore, NewArticle, StoreError};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::entry::{link_host, FeedEntry};
use crate::error::Result;
use crate::feed::{FeedReader, HttpFeedReader};
use crate::fulltext::{FallbackChain, FullTextSource};
use crate::http::build_client;

/// What happened to one feed entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryOutcome {
    Inserted { article_id: i64, full_text: bool },
    Duplicate,
    SkippedEmptyLink,
    Failed { link: String, error: String },
}

/// Stats from a fetch run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FetchStats {
    pub feeds_read: u32,
    pub feeds_failed: u32,
    pub entries_seen: u32,
    /// Newly inserted articles.
    pub total_new: u32,
    pub duplicates: u32,
    pub skipped_no_link: u32,
    pub failed: u32,
    /// Inserted with the summary standing in for full text.
    pub summary_only: u32,
}

impl FetchStats {
    pub fn record(&mut self, outcome: &EntryOutcome) {
        self.entries_seen += 1;
        match outcome {
            EntryOutcome::Inserted { full_text, .. } => {
                self.total_new += 1;
                if !full_text {
                    self.summary_only += 1;
                }
            }
            EntryOutcome::Duplicate => self.duplicates += 1,
            EntryOutcome::SkippedEmptyLink => self.skipped_no_link += 1,
            EntryOutcome::Failed { .. } => self.failed += 1,
        }
    }
}

impl fmt::Display for FetchStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\n=== Fetch Run Complete ===")?;
        writeln!(f, "Feeds read:        {}", self.feeds_read)?;
        writeln!(f, "Feeds failed:      {}", self.feeds_failed)?;
        writeln!(f, "Entries seen:      {}", self.entries_seen)?;
        writeln!(f, "New articles:      {}", self.total_new)?;
        writeln!(f, "  summary only:    {}", self.summary_only)?;
        writeln!(f, "Duplicates:        {}", self.duplicates)?;
        writeln!(f, "Missing link:      {}", self.skipped_no_link)?;
        write!(f, "Failed:            {}", self.failed)
    }
}

pub struct Fetcher {
    store: ArticleStore,
    reader: Box<dyn FeedReader>,
    fulltext: Box<dyn FullTextSource>,
}

impl Fetcher {
    pub fn new(
        store: ArticleStore,
        reader: Box<dyn FeedReader>,
        fulltext: Box<dyn FullTextSource>,
    ) -> Self {
        Self {
            store,
            reader,
            fulltext,
        }
    }

    /// Fetcher backed by real HTTP with the standard full-text fallback chain.
    pub fn http(store: ArticleStore, user_agent: &str, settings: &FetchSettings) -> Result<Self> {
        let client = build_client(user_agent, settings.timeout)?;
        Ok(Self::new(
            store,
            Box::new(HttpFeedReader::new(client.clone())),
            Box::new(FallbackChain::standard(client)),
        ))
    }

    /// Fetch every source in order. Failures stay inside their feed or entry.
    pub async fn run(&self, sources: &[FeedSource], settings: &FetchSettings) -> FetchStats {
        let run_id = Uuid::new_v4();
        let mut stats = FetchStats::default();
        info!(%run_id, feeds = sources.len(), fulltext = settings.fulltext, "Starting fetch run");

        for source in sources {
            let feed_name = source.display_name();
            let feed = match self.reader.read(&source.url).await {
                Ok(feed) => feed,
                Err(e) => {
                    warn!(%run_id, feed = feed_name, url = source.url.as_str(), error = %e, "Feed fetch failed");
                    stats.feeds_failed += 1;
                    continue;
                }
            };
            stats.feeds_read += 1;

            let limit = settings.limit.unwrap_or(usize::MAX);
            for entry in feed.entries.into_iter().take(limit) {
                let outcome = self.process_entry(source, &entry, settings).await;
                if let EntryOutcome::Failed { link, error } = &outcome {
                    warn!(%run_id, feed = feed_name, link = link.as_str(), error = error.as_str(), "Entry failed");
                }
                stats.record(&outcome);

                if matches!(outcome, EntryOutcome::Inserted { .. }) && !settings.delay.is_zero() {
                    tokio::time::sleep(settings.delay).await;
                }
            }

            info!(%run_id, feed = feed_name, new = stats.total_new, "Feed done");
        }

        info!(
            %run_id,
            total_new = stats.total_new,
            duplicates = stats.duplicates,
            failed = stats.failed,
            feeds_failed = stats.feeds_failed,
            "Fetch run complete"
        );
        stats
    }

    /// Store one entry, turning every error into an outcome.
    pub async fn process_entry(
        &self,
        source: &FeedSource,
        entry: &FeedEntry,
        settings: &FetchSettings,
    ) -> EntryOutcome {
        match self.try_insert(source, entry, settings).await {
            Ok(outcome) => outcome,
            Err(e) => EntryOutcome::Failed {
                link: entry.link.clone(),
                error: e.to_string(),
            },
        }
    }

    async fn try_insert(
        &self,
        source: &FeedSource,
        entry: &FeedEntry,
        settings: &FetchSettings,
    ) -> Result<EntryOutcome> {
        if entry.link.is_empty() {
            return Ok(EntryOutcome::SkippedEmptyLink);
        }
        if self.store.link_exists(&entry.link).await? {
            debug!(link = entry.link.as_str(), "Already stored");
            return Ok(EntryOutcome::Duplicate);
        }

        let content = if settings.fulltext {
            match self.fulltext.full_text(&entry.link).await {
                Ok(text) => Some(text),
                Err(e) => {
                    debug!(link = entry.link.as_str(), error = %e, "Falling back to summary");
                    None
                }
            }
        } else {
            None
        };
        let full_text = content.is_some();

        let source_name = source
            .name
            .clone()
            .or_else(|| link_host(&entry.link))
            .unwrap_or_else(|| source.display_name().to_string());

        let article = NewArticle::builder()
            .link(entry.link.as_str())
            .title(entry.title.as_str())
            .summary(entry.summary.as_str())
            .content(content)
            .published(entry.published.as_str())
            .source(source_name)
            .build();

        match self.store.insert_article(article).await {
            Ok(stored) => {
                info!(article_id = stored.id, link = stored.link.as_str(), full_text, "Stored article");
                Ok(EntryOutcome::Inserted {
                    article_id: stored.id,
                    full_text,
                })
            }
            // Another process stored it between the pre-check and the insert.
            Err(StoreError::DuplicateLink { link }) => {
                debug!(link = link.as_str(), "Lost insert race");
                Ok(EntryOutcome::Duplicate)
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_tally_outcomes() {
        let mut stats = FetchStats::default();
        stats.record(&EntryOutcome::Inserted { article_id: 1, full_text: true });
        stats.record(&EntryOutcome::Inserted { article_id: 2, full_text: false });
        stats.record(&EntryOutcome::Duplicate);
        stats.record(&EntryOutcome::SkippedEmptyLink);
        stats.record(&EntryOutcome::Failed { link: "x".into(), error: "boom".into() });

        assert_eq!(stats.entries_seen, 5);
        assert_eq!(stats.total_new, 2);
        assert_eq!(stats.summary_only, 1);
        assert_eq!(stats.duplicates, 1);
        assert_eq!(stats.skipped_no_link, 1);
        assert_eq!(stats.failed, 1);

        let text = stats.to_string();
        assert!(text.contains("New articles:      2"));
    }
}
