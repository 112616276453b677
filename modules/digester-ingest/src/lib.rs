pub mod entry;
pub mod error;
pub mod feed;
pub mod fetcher;
pub mod fulltext;
pub mod http;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use entry::{parse_feed, FeedEntry, ParsedFeed, RawEntry};
pub use error::{FetchError, Result};
pub use feed::{FeedReader, HttpFeedReader};
pub use fetcher::{EntryOutcome, FetchStats, Fetcher};
pub use fulltext::{FallbackChain, FullTextSource, Html2TextExtractor, ReadabilityExtractor};
