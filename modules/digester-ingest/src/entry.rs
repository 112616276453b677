// Feed entries as ordered field lookups.
//
// A parsed entry is flattened into a map of raw string fields. Each output
// attribute then takes the first non-empty value from its candidate list, so
// feeds that fill different fields for the same meaning all resolve the same way.

use std::collections::BTreeMap;

use crate::error::{FetchError, Result};

pub const LINK_FIELDS: &[&str] = &["link", "id"];
pub const TITLE_FIELDS: &[&str] = &["title"];
pub const SUMMARY_FIELDS: &[&str] = &["summary", "description", "content"];
pub const PUBLISHED_FIELDS: &[&str] = &["published", "updated", "pubDate"];

/// Raw string fields of one feed entry, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawEntry {
    fields: BTreeMap<String, String>,
}

impl RawEntry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.insert(key, Some(value.into()));
        self
    }

    pub fn insert(&mut self, key: &str, value: Option<String>) {
        if let Some(value) = value {
            self.fields.insert(key.to_string(), value);
        }
    }

    /// Trimmed value, `None` when missing or blank.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// First non-empty value among `candidates`, in order.
    pub fn first_of(&self, candidates: &[&str]) -> Option<&str> {
        candidates.iter().find_map(|key| self.get(key))
    }

    fn first_link(&self) -> Option<&str> {
        LINK_FIELDS.iter().find_map(|&key| {
            let value = self.get(key)?;
            // Entry ids are often URNs; only accept one that is a usable URL.
            (key != "id" || is_http_url(value)).then_some(value)
        })
    }
}

/// One feed entry reduced to what the store needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEntry {
    /// Empty when the entry carries no usable link.
    pub link: String,
    pub title: String,
    pub summary: String,
    pub published: String,
}

impl From<&RawEntry> for FeedEntry {
    fn from(raw: &RawEntry) -> Self {
        let own = |v: Option<&str>| v.unwrap_or_default().to_string();
        Self {
            link: own(raw.first_link()),
            title: own(raw.first_of(TITLE_FIELDS)),
            summary: own(raw.first_of(SUMMARY_FIELDS)),
            published: own(raw.first_of(PUBLISHED_FIELDS)),
        }
    }
}

/// A parsed feed: its own title plus entries in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedFeed {
    pub title: Option<String>,
    pub entries: Vec<FeedEntry>,
}

/// Parse RSS, Atom or JSON Feed bytes.
///
/// RSS documents are read with the `rss` crate so that date elements keep
/// their source text, including dates no parser understands. Anything it
/// rejects goes through `feed_rs`.
pub fn parse_feed(bytes: &[u8]) -> Result<ParsedFeed> {
    if let Ok(channel) = rss::Channel::read_from(bytes) {
        return Ok(ParsedFeed {
            title: Some(channel.title().to_string()).filter(|t| !t.trim().is_empty()),
            entries: channel
                .items()
                .iter()
                .map(|item| FeedEntry::from(&rss_entry(item)))
                .collect(),
        });
    }

    let feed = feed_rs::parser::parse(bytes).map_err(|e| FetchError::Parse(e.to_string()))?;

    let entries = feed
        .entries
        .iter()
        .map(|entry| FeedEntry::from(&raw_entry(entry)))
        .collect();

    Ok(ParsedFeed {
        title: feed.title.map(|t| t.content),
        entries,
    })
}

fn rss_entry(item: &rss::Item) -> RawEntry {
    let owned = |v: Option<&str>| v.map(str::to_string);
    let mut raw = RawEntry::new();
    raw.insert("link", owned(item.link()));
    raw.insert("id", owned(item.guid().map(|g| g.value())));
    raw.insert("title", owned(item.title()));
    raw.insert("description", owned(item.description()));
    raw.insert("content", owned(item.content()));
    // `pubDate` is the item's publication date and outranks `dc:date`.
    raw.insert("published", owned(item.pub_date()));
    raw.insert("pubDate", owned(item.pub_date()));
    raw.insert(
        "updated",
        item.dublin_core_ext()
            .and_then(|dc| dc.dates().first().cloned()),
    );
    raw
}

// Atom dates are RFC 3339 on the wire, so the rendered value matches the source.
fn raw_entry(entry: &feed_rs::model::Entry) -> RawEntry {
    let mut raw = RawEntry::new();
    raw.insert("link", entry.links.first().map(|l| l.href.clone()));
    raw.insert("id", Some(entry.id.clone()));
    raw.insert("title", entry.title.as_ref().map(|t| t.content.clone()));
    raw.insert("summary", entry.summary.as_ref().map(|t| t.content.clone()));
    raw.insert(
        "description",
        entry
            .media
            .iter()
            .find_map(|m| m.description.as_ref().map(|d| d.content.clone())),
    );
    raw.insert("content", entry.content.as_ref().and_then(|c| c.body.clone()));
    raw.insert("published", entry.published.map(|d| d.to_rfc3339()));
    raw.insert("updated", entry.updated.map(|d| d.to_rfc3339()));
    raw
}

pub fn is_http_url(link: &str) -> bool {
    url::Url::parse(link)
        .map(|u| matches!(u.scheme(), "http" | "https"))
        .unwrap_or(false)
}

/// Network location of `link`: the host as written, plus an explicit port.
pub fn link_host(link: &str) -> Option<String> {
    let url = url::Url::parse(link).ok()?;
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}
