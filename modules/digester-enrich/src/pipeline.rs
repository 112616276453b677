// Enrichment run: tag each unprocessed article and replace its entity mentions.
//
// Every article is its own commit unit. A failure leaves that article exactly
// as it was and the batch moves on.

use std::fmt;

use digester_common::EnrichSettings;
use digester_store::{Article, ArticleStore, NewMention, StoreError};
use tracing::{info, warn};
use uuid::Uuid;

use crate::classifier::ArticleFields;
use crate::context::EnrichmentContext;
use crate::error::Result;
use crate::taxonomy::guess_custom_label;

/// What happened to one article.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArticleOutcome {
    Enriched {
        article_id: i64,
        tags: usize,
        mentions: usize,
    },
    Failed {
        article_id: i64,
        error: String,
    },
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EnrichStats {
    pub selected: u32,
    pub processed: u32,
    pub failed: u32,
    /// Processed but given no tags; these are picked up again next run.
    pub untagged: u32,
    pub mentions: u32,
}

impl EnrichStats {
    pub fn record(&mut self, outcome: &ArticleOutcome) {
        match outcome {
            ArticleOutcome::Enriched { tags, mentions, .. } => {
                self.processed += 1;
                self.mentions += *mentions as u32;
                if *tags == 0 {
                    self.untagged += 1;
                }
            }
            ArticleOutcome::Failed { .. } => self.failed += 1,
        }
    }
}

impl fmt::Display for EnrichStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Enrichment: {} selected, {} processed ({} untagged), {} failed, {} mentions",
            self.selected, self.processed, self.untagged, self.failed, self.mentions,
        )
    }
}

pub struct Pipeline {
    store: ArticleStore,
    ctx: EnrichmentContext,
}

impl Pipeline {
    pub fn new(store: ArticleStore, ctx: EnrichmentContext) -> Self {
        Self { store, ctx }
    }

    /// Enrich up to `batch_size` unprocessed articles. Only the initial
    /// selection query can fail the run.
    pub async fn process_batch(
        &self,
        settings: &EnrichSettings,
    ) -> std::result::Result<EnrichStats, StoreError> {
        let run_id = Uuid::new_v4();
        let articles = self.store.find_unprocessed_articles(settings.batch_size).await?;

        let mut stats = EnrichStats {
            selected: articles.len() as u32,
            ..Default::default()
        };
        info!(%run_id, selected = stats.selected, "Starting enrichment run");

        for article in &articles {
            let outcome = self.process_article(article).await;
            stats.record(&outcome);
        }

        info!(
            %run_id,
            processed = stats.processed,
            failed = stats.failed,
            untagged = stats.untagged,
            "Enrichment run complete"
        );
        Ok(stats)
    }

    pub async fn process_article(&self, article: &Article) -> ArticleOutcome {
        match self.enrich(article).await {
            Ok((tags, mentions)) => {
                info!(article_id = article.id, tags, mentions, "Enriched article");
                if tags == 0 {
                    warn!(article_id = article.id, "No topic tags; article stays unprocessed");
                }
                ArticleOutcome::Enriched {
                    article_id: article.id,
                    tags,
                    mentions,
                }
            }
            Err(e) => {
                warn!(article_id = article.id, error = %e, "Enrichment failed");
                ArticleOutcome::Failed {
                    article_id: article.id,
                    error: e.to_string(),
                }
            }
        }
    }

    /// Classify, extract, refine, then commit tags and mentions together.
    async fn enrich(&self, article: &Article) -> Result<(usize, usize)> {
        let tags = self
            .ctx
            .classifier
            .classify(&ArticleFields::from(article))
            .await?;

        let raw = self.ctx.extractor.extract(&article.recognizer_text()).await?;
        let mentions: Vec<NewMention> = raw
            .iter()
            .map(|m| {
                NewMention::new(&m.text, &m.raw_label)
                    .with_custom_label(guess_custom_label(&m.text, &m.raw_label))
            })
            .collect();

        self.store
            .apply_enrichment(article.id, &tags.join(","), &mentions)
            .await?;
        Ok((tags.len(), mentions.len()))
    }
}
