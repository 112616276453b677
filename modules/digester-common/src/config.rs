use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

const DEFAULT_DATABASE_URL: &str = "sqlite://data/articles.db";
const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (compatible; OpticsNewsDigester/1.0; +https://example.com/bot)";

/// Application configuration loaded from environment variables.
/// Feed sources live in a separate TOML file; see [`load_sources`].
#[derive(Debug, Clone)]
pub struct AppConfig {
    // Database
    pub database_url: String,

    // Entity extraction
    pub ner_endpoint: Option<String>,
    pub entity_patterns: Option<PathBuf>,

    // Fetching
    pub user_agent: String,

    // Logging
    pub log_json: bool,
}

impl AppConfig {
    /// Load configuration from the environment (and `.env` when present).
    /// Every value has a default, so this never fails.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());

        Self {
            database_url: normalize_database_url(&database_url),
            ner_endpoint: env::var("NER_ENDPOINT").ok().filter(|s| !s.trim().is_empty()),
            entity_patterns: env::var("ENTITY_PATTERNS").ok().map(PathBuf::from),
            user_agent: env::var("FETCH_USER_AGENT")
                .unwrap_or_else(|_| DEFAULT_USER_AGENT.to_string()),
            log_json: env::var("LOG_FORMAT")
                .map(|v| v.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
        }
    }

    /// Log the config with the database location only (no credentials live here,
    /// but the NER endpoint may carry a token in its query string).
    pub fn log_redacted(&self) {
        tracing::info!(
            database_url = self.database_url.as_str(),
            ner_endpoint = self.ner_endpoint.is_some(),
            entity_patterns = ?self.entity_patterns,
            log_json = self.log_json,
            "Loaded config"
        );
    }
}

/// Map legacy connection strings onto the canonical `sqlite://` form.
///
/// - `sqlite3://path` and `file:path` become `sqlite://path`
/// - `:memory:` becomes `sqlite::memory:`
/// - a bare filesystem path gets the `sqlite://` scheme
/// - anything already canonical passes through untouched
pub fn normalize_database_url(raw: &str) -> String {
    let raw = raw.trim();

    if raw == ":memory:" {
        return "sqlite::memory:".to_string();
    }
    if let Some(rest) = raw.strip_prefix("sqlite3://") {
        return format!("sqlite://{rest}");
    }
    if let Some(rest) = raw.strip_prefix("file:") {
        return format!("sqlite://{}", rest.trim_start_matches("//"));
    }
    if raw.starts_with("sqlite:") {
        return raw.to_string();
    }
    format!("sqlite://{raw}")
}

/// One configured feed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FeedSource {
    #[serde(default)]
    pub name: Option<String>,
    pub url: String,
}

impl FeedSource {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            url: url.into(),
        }
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Unnamed")
    }
}

/// TOML-backed list of feed sources.
#[derive(Debug, Clone, Deserialize)]
pub struct SourcesFile {
    #[serde(alias = "rss_feeds", default)]
    pub feeds: Vec<FeedSource>,
}

/// Load and parse a TOML sources file.
pub fn load_sources(path: &Path) -> Result<Vec<FeedSource>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read sources file: {}", path.display()))?;
    let file: SourcesFile = toml::from_str(&content)
        .with_context(|| format!("Failed to parse sources file: {}", path.display()))?;
    Ok(file.feeds)
}

/// Runtime knobs for a fetch run.
#[derive(Debug, Clone)]
pub struct FetchSettings {
    /// Max entries considered per feed.
    pub limit: Option<usize>,
    /// Polite pause after each inserted article.
    pub delay: Duration,
    pub fulltext: bool,
    /// Per-request timeout for feed and article fetches.
    pub timeout: Duration,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            limit: None,
            delay: Duration::from_secs(1),
            fulltext: true,
            timeout: Duration::from_secs(15),
        }
    }
}

/// Runtime knobs for an enrichment run.
#[derive(Debug, Clone)]
pub struct EnrichSettings {
    pub batch_size: usize,
}

impl Default for EnrichSettings {
    fn default() -> Self {
        Self { batch_size: 200 }
    }
}
