use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Args;
use tracing::info;

use digester_common::{load_sources, AppConfig, FetchSettings};
use digester_ingest::Fetcher;
use digester_store::ArticleStore;

#[derive(Args)]
pub struct FetchArgs {
    /// TOML file listing the feeds
    #[arg(long, default_value = "config/sources.toml")]
    sources: PathBuf,

    /// Max entries considered per feed
    #[arg(long)]
    limit: Option<usize>,

    /// Store feed summaries only, skipping article pages
    #[arg(long)]
    no_fulltext: bool,

    /// Seconds to pause after each stored article
    #[arg(long)]
    delay: Option<f64>,

    /// Per-request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,
}

impl FetchArgs {
    fn settings(&self) -> FetchSettings {
        let defaults = FetchSettings::default();
        FetchSettings {
            limit: self.limit,
            delay: self
                .delay
                .and_then(|s| Duration::try_from_secs_f64(s).ok())
                .unwrap_or(defaults.delay),
            fulltext: !self.no_fulltext,
            timeout: self.timeout.map(Duration::from_secs).unwrap_or(defaults.timeout),
        }
    }
}

pub async fn run(store: &ArticleStore, config: &AppConfig, args: FetchArgs) -> Result<()> {
    let sources = load_sources(&args.sources)?;
    info!(sources = sources.len(), path = %args.sources.display(), "Loaded feed sources");

    let settings = args.settings();
    let fetcher = Fetcher::http(store.clone(), &config.user_agent, &settings)?;
    let stats = fetcher.run(&sources, &settings).await;

    println!("{stats}");
    println!("Inserted {} new articles", stats.total_new);
    Ok(())
}
