use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use digester_common::AppConfig;
use digester_store::ArticleStore;

mod cmd;

#[derive(Parser)]
#[command(name = "digester")]
#[command(about = "Optics and photonics news digester")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch configured feeds and store new articles
    Fetch(cmd::fetch::FetchArgs),

    /// Tag and extract entities from unprocessed articles
    Process {
        /// Max articles to enrich in this run (default 200)
        #[arg(long)]
        batch_size: Option<usize>,
    },

    /// Create or upgrade the database schema, then exit
    Migrate,

    /// List entity mentions for review
    Entities(cmd::annotate::EntitiesArgs),

    /// Correct the custom label of one entity mention
    Relabel {
        entity_id: i64,
        /// New label, or `none` to clear it
        label: String,
    },

    /// Ground-truth span annotations
    #[command(subcommand)]
    Span(cmd::annotate::SpanCommand),

    /// Topic labels attached to articles
    #[command(subcommand)]
    Topic(cmd::annotate::TopicCommand),

    /// Article administration
    #[command(subcommand)]
    Article(cmd::annotate::ArticleCommand),

    /// Write annotated spans as JSONL training data
    ExportSpans {
        /// Output file; stdout when omitted
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("digester=info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::from_env();
    init_tracing(config.log_json);
    config.log_redacted();

    let store = ArticleStore::connect(&config.database_url)
        .await
        .with_context(|| format!("Failed to open database at {}", config.database_url))?;

    match cli.command {
        Commands::Fetch(args) => cmd::fetch::run(&store, &config, args).await,
        Commands::Process { batch_size } => cmd::process::run(&store, &config, batch_size).await,
        Commands::Migrate => {
            store.migrate().await?;
            println!("Schema is up to date ({})", config.database_url);
            Ok(())
        }
        Commands::Entities(args) => cmd::annotate::entities(&store, args).await,
        Commands::Relabel { entity_id, label } => {
            cmd::annotate::relabel(&store, entity_id, &label).await
        }
        Commands::Span(command) => cmd::annotate::span(&store, command).await,
        Commands::Topic(command) => cmd::annotate::topic(&store, command).await,
        Commands::Article(command) => cmd::annotate::article(&store, command).await,
        Commands::ExportSpans { out } => cmd::annotate::export_spans(&store, out.as_deref()).await,
    }
}
