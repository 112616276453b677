// Review commands: entity corrections, spans, topic labels and article admin.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};

use digester_common::EntityLabel;
use digester_store::{
    entity_context, find_occurrences, highlight_segments, ArticleStore, EntityFilter,
};

const CONTEXT_WINDOW: usize = 60;

#[derive(Args)]
pub struct EntitiesArgs {
    /// Keep only these raw labels (repeatable)
    #[arg(long = "raw")]
    raw: Vec<String>,

    /// Keep only these custom labels; unlabelled mentions count as OTHER
    #[arg(long = "custom")]
    custom: Vec<EntityLabel>,

    /// Case-insensitive search over entity name, title and source
    #[arg(long)]
    search: Option<String>,

    #[arg(long, default_value_t = 50)]
    limit: usize,

    /// Print a text snippet around each mention
    #[arg(long)]
    context: bool,
}

#[derive(Subcommand)]
pub enum SpanCommand {
    /// Annotate characters [start, end) of an article's text
    Add {
        article_id: i64,
        start: i64,
        end: i64,
        label: EntityLabel,
        #[arg(long, default_value = "manual")]
        annotator: String,
    },
    /// Show where a phrase occurs; with --label, annotate one occurrence
    Find {
        article_id: i64,
        needle: String,
        #[arg(long)]
        label: Option<EntityLabel>,
        /// Which occurrence to annotate, 0-based
        #[arg(long, default_value_t = 0)]
        index: usize,
        #[arg(long, default_value = "manual")]
        annotator: String,
    },
    /// List spans and render the highlighted text
    List { article_id: i64 },
    Delete { span_id: i64 },
}

#[derive(Subcommand)]
pub enum TopicCommand {
    Add { article_id: i64, label: String },
    Remove { article_id: i64, label: String },
    List { article_id: i64 },
}

#[derive(Subcommand)]
pub enum ArticleCommand {
    /// Most recently fetched articles
    List {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Delete an article with its entities, labels and spans
    Delete { article_id: i64 },
}

pub async fn entities(store: &ArticleStore, args: EntitiesArgs) -> Result<()> {
    let filter = EntityFilter {
        raw_labels: args.raw,
        custom_labels: args.custom,
        search: args.search,
    };
    let rows = store.entity_rows(&filter).await?;
    println!("{} matching mentions", rows.len());

    for row in rows.iter().take(args.limit) {
        println!(
            "{:>6}  {:<40} {:<7} {:<15} #{} {}",
            row.entity_id,
            row.name,
            row.raw_label.as_deref().unwrap_or("-"),
            row.custom_label.as_deref().unwrap_or("-"),
            row.article_id,
            row.title.as_deref().unwrap_or(""),
        );
        if args.context {
            if let Some(snippet) = entity_context(&row.name, &row.context_text(), CONTEXT_WINDOW) {
                println!("        ...{}...", snippet.replace('\n', " "));
            }
        }
    }
    Ok(())
}

pub async fn relabel(store: &ArticleStore, entity_id: i64, label: &str) -> Result<()> {
    let label = match label.trim() {
        l if l.eq_ignore_ascii_case("none") => None,
        l => Some(l.parse::<EntityLabel>()?),
    };
    let changed = store.upsert_custom_label(entity_id, label).await?;
    if changed {
        println!("Entity {entity_id} updated");
    } else {
        println!("Entity {entity_id} unchanged");
    }
    Ok(())
}

pub async fn span(store: &ArticleStore, command: SpanCommand) -> Result<()> {
    match command {
        SpanCommand::Add {
            article_id,
            start,
            end,
            label,
            annotator,
        } => {
            let span = store
                .add_span_annotation(article_id, start, end, label, &annotator)
                .await?;
            println!("Span {} [{}, {}) {} {:?}", span.id, span.start_char, span.end_char, span.label, span.text);
        }
        SpanCommand::Find {
            article_id,
            needle,
            label,
            index,
            annotator,
        } => match label {
            Some(label) => {
                let span = store
                    .add_span_by_occurrence(article_id, &needle, index, label, &annotator)
                    .await?;
                println!("Span {} [{}, {}) {} {:?}", span.id, span.start_char, span.end_char, span.label, span.text);
            }
            None => {
                let article = store
                    .get_article(article_id)
                    .await?
                    .with_context(|| format!("No article {article_id}"))?;
                let hits = find_occurrences(article.text(), &needle);
                if hits.is_empty() {
                    println!("No occurrences of {needle:?}");
                }
                for (i, (start, end)) in hits.iter().enumerate() {
                    println!("{i}: [{start}, {end})");
                }
            }
        },
        SpanCommand::List { article_id } => {
            let article = store
                .get_article(article_id)
                .await?
                .with_context(|| format!("No article {article_id}"))?;
            let spans = store.spans_for_article(article_id).await?;
            for s in &spans {
                println!(
                    "{:>6}  [{}, {})  {:<15} {:?}  by {}",
                    s.id, s.start_char, s.end_char, s.label, s.text, s.annotator
                );
            }
            println!();
            let rendered: String = highlight_segments(article.text(), &spans)
                .into_iter()
                .map(|seg| {
                    if seg.labels.is_empty() {
                        seg.text
                    } else {
                        format!("[{}]({})", seg.text, seg.labels.join("+"))
                    }
                })
                .collect();
            println!("{rendered}");
        }
        SpanCommand::Delete { span_id } => {
            if store.delete_span_annotation(span_id).await? {
                println!("Deleted span {span_id}");
            } else {
                println!("No span {span_id}");
            }
        }
    }
    Ok(())
}

pub async fn topic(store: &ArticleStore, command: TopicCommand) -> Result<()> {
    match command {
        TopicCommand::Add { article_id, label } => {
            if label.trim().is_empty() {
                bail!("Topic label must not be empty");
            }
            if store.add_topic_label(article_id, &label).await? {
                println!("Added {label} to article {article_id}");
            } else {
                println!("Article {article_id} already has {label}");
            }
        }
        TopicCommand::Remove { article_id, label } => {
            if store.remove_topic_label(article_id, &label).await? {
                println!("Removed {label} from article {article_id}");
            } else {
                println!("Article {article_id} has no label {label}");
            }
        }
        TopicCommand::List { article_id } => {
            for l in store.topic_labels(article_id).await? {
                println!("{}", l.label);
            }
        }
    }
    Ok(())
}

pub async fn article(store: &ArticleStore, command: ArticleCommand) -> Result<()> {
    match command {
        ArticleCommand::List { limit } => {
            let total = store.count_articles().await?;
            println!("{total} articles stored");
            for a in store.list_articles(limit).await? {
                println!(
                    "{:>6}  {:<12} {:<30} {}",
                    a.id,
                    a.tag_list().join(","),
                    a.source.as_deref().unwrap_or(""),
                    a.title.as_deref().unwrap_or(&a.link),
                );
            }
        }
        ArticleCommand::Delete { article_id } => {
            if store.delete_article(article_id).await? {
                println!("Deleted article {article_id}");
            } else {
                println!("No article {article_id}");
            }
        }
    }
    Ok(())
}

pub async fn export_spans(store: &ArticleStore, out: Option<&Path>) -> Result<()> {
    let examples = store.training_examples().await?;

    let mut writer: Box<dyn Write> = match out {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("Failed to create {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };
    for example in &examples {
        serde_json::to_writer(&mut writer, example)?;
        writeln!(writer)?;
    }
    writer.flush()?;

    if let Some(path) = out {
        println!("Wrote {} examples to {}", examples.len(), path.display());
    }
    Ok(())
}
