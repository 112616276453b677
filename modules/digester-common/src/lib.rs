pub mod config;
pub mod labels;

pub use config::{
    load_sources, normalize_database_url, AppConfig, EnrichSettings, FeedSource, FetchSettings,
    SourcesFile,
};
pub use labels::{is_tracked_raw_label, EntityLabel, UnknownLabel, TRACKED_RAW_LABELS};
