// SQLite persistence for articles, entity mentions and topic labels.
// Span annotation and correction queries live in `annotations.rs`.

use std::str::FromStr;
use std::time::Duration;

use digester_common::EntityLabel;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::{debug, info};

use crate::error::{Result, StoreError};
use crate::models::{Article, EntityMention, NewArticle, NewMention, TopicLabel};
use crate::schema;

pub(crate) const ARTICLE_COLUMNS: &str =
    "id, title, COALESCE(link, '') AS link, summary, content, published, source, tags, fetched_at";

const ENTITY_COLUMNS: &str = "id, article_id, COALESCE(name, '') AS name, \
     COALESCE(raw_label, type) AS raw_label, custom_label, type AS legacy_type";

/// Handle to the article database. Cheap to clone.
#[derive(Clone)]
pub struct ArticleStore {
    pub(crate) pool: SqlitePool,
}

impl ArticleStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if missing) the database at a canonical `sqlite:` URL and
    /// bring its schema up to date. Failure here is the only fatal store error.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let in_memory = database_url.contains(":memory:") || database_url.contains("mode=memory");

        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5))
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true);

        if !in_memory {
            if let Some(parent) = options.get_filename().parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(sqlx::Error::Io)?;
                }
            }
        }

        // Each in-memory connection is its own database, so pin the pool to one.
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = pool_options.connect_with(options).await?;
        info!(database_url, "Database pool created");

        let store = Self::new(pool);
        store.migrate().await?;
        Ok(store)
    }

    /// Create missing tables and add missing optional columns. Idempotent.
    pub async fn migrate(&self) -> Result<()> {
        schema::migrate(&self.pool).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // --- Articles ---

    pub async fn link_exists(&self, link: &str) -> Result<bool> {
        let row = sqlx::query_scalar::<_, i64>("SELECT 1 FROM articles WHERE link = ?1 LIMIT 1")
            .bind(link)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    /// Insert a freshly fetched article with empty tags. A link that is already
    /// stored surfaces as [`StoreError::DuplicateLink`].
    pub async fn insert_article(&self, new: NewArticle) -> Result<Article> {
        let content = new.content.unwrap_or_else(|| new.summary.clone());

        let sql = format!(
            "INSERT INTO articles (title, link, summary, content, published, source, tags, fetched_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, '', ?7) RETURNING {ARTICLE_COLUMNS}"
        );
        let result = sqlx::query_as::<_, Article>(&sql)
            .bind(&new.title)
            .bind(&new.link)
            .bind(&new.summary)
            .bind(&content)
            .bind(&new.published)
            .bind(&new.source)
            .bind(new.fetched_at)
            .fetch_one(&self.pool)
            .await;

        match result {
            Ok(article) => {
                debug!(article_id = article.id, link = article.link.as_str(), "Inserted article");
                Ok(article)
            }
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(StoreError::DuplicateLink { link: new.link })
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get_article(&self, id: i64) -> Result<Option<Article>> {
        let sql = format!("SELECT {ARTICLE_COLUMNS} FROM articles WHERE id = ?1");
        let row = sqlx::query_as::<_, Article>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    pub(crate) async fn require_article(&self, id: i64) -> Result<Article> {
        self.get_article(id).await?.ok_or(StoreError::NotFound {
            entity: "article",
            id,
        })
    }

    /// Articles whose tags are NULL or empty, in insertion order, at most `limit`.
    pub async fn find_unprocessed_articles(&self, limit: usize) -> Result<Vec<Article>> {
        let sql = format!(
            "SELECT {ARTICLE_COLUMNS} FROM articles \
             WHERE tags IS NULL OR tags = '' \
             ORDER BY id ASC LIMIT ?1"
        );
        let rows = sqlx::query_as::<_, Article>(&sql)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Newest first by fetch time.
    pub async fn list_articles(&self, limit: usize) -> Result<Vec<Article>> {
        let sql = format!(
            "SELECT {ARTICLE_COLUMNS} FROM articles \
             ORDER BY fetched_at DESC, id DESC LIMIT ?1"
        );
        let rows = sqlx::query_as::<_, Article>(&sql)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn count_articles(&self) -> Result<i64> {
        let n = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM articles")
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }

    /// Delete an article and everything it owns. Children are removed explicitly
    /// because tables created by older builds lack `ON DELETE CASCADE`.
    pub async fn delete_article(&self, id: i64) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        for table in ["article_span_annotations", "article_labels", "article_entities"] {
            sqlx::query(&format!("DELETE FROM {table} WHERE article_id = ?1"))
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }
        let deleted = sqlx::query("DELETE FROM articles WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await?;

        if deleted > 0 {
            info!(article_id = id, "Deleted article");
        }
        Ok(deleted > 0)
    }

    // --- Enrichment writes ---

    /// Swap the article's mention set for `mentions` in one transaction.
    pub async fn replace_entities(&self, article_id: i64, mentions: &[NewMention]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        let exists = sqlx::query_scalar::<_, i64>("SELECT 1 FROM articles WHERE id = ?1")
            .bind(article_id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(StoreError::NotFound {
                entity: "article",
                id: article_id,
            });
        }
        let written = write_mentions(&mut tx, article_id, mentions).await?;
        tx.commit().await?;
        Ok(written)
    }

    /// Write the tag string and replace the mention set atomically. This is
    /// the per-article commit unit of an enrichment run; on any error nothing
    /// of it is visible.
    pub async fn apply_enrichment(
        &self,
        article_id: i64,
        tags: &str,
        mentions: &[NewMention],
    ) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        let updated = sqlx::query("UPDATE articles SET tags = ?1 WHERE id = ?2")
            .bind(tags)
            .bind(article_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if updated == 0 {
            return Err(StoreError::NotFound {
                entity: "article",
                id: article_id,
            });
        }
        let written = write_mentions(&mut tx, article_id, mentions).await?;
        tx.commit().await?;
        Ok(written)
    }

    pub async fn entities_for_article(&self, article_id: i64) -> Result<Vec<EntityMention>> {
        let sql = format!(
            "SELECT {ENTITY_COLUMNS} FROM article_entities WHERE article_id = ?1 ORDER BY id ASC"
        );
        let rows = sqlx::query_as::<_, EntityMention>(&sql)
            .bind(article_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn get_entity(&self, entity_id: i64) -> Result<Option<EntityMention>> {
        let sql = format!("SELECT {ENTITY_COLUMNS} FROM article_entities WHERE id = ?1");
        let row = sqlx::query_as::<_, EntityMention>(&sql)
            .bind(entity_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    /// Human correction of a refined label. Returns whether the row changed;
    /// an unchanged label performs no write.
    pub async fn upsert_custom_label(
        &self,
        entity_id: i64,
        label: Option<EntityLabel>,
    ) -> Result<bool> {
        let label = label.map(|l| l.as_str());
        let changed = sqlx::query(
            "UPDATE article_entities SET custom_label = ?1 \
             WHERE id = ?2 AND custom_label IS NOT ?1",
        )
        .bind(label)
        .bind(entity_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if changed > 0 {
            return Ok(true);
        }
        if self.get_entity(entity_id).await?.is_none() {
            return Err(StoreError::NotFound {
                entity: "entity",
                id: entity_id,
            });
        }
        Ok(false)
    }

    // --- Topic labels ---

    /// Attach a topic label. Returns false when the pair already exists.
    pub async fn add_topic_label(&self, article_id: i64, label: &str) -> Result<bool> {
        self.require_article(article_id).await?;
        let inserted = sqlx::query(
            "INSERT OR IGNORE INTO article_labels (article_id, label) VALUES (?1, ?2)",
        )
        .bind(article_id)
        .bind(label.trim())
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(inserted > 0)
    }

    pub async fn remove_topic_label(&self, article_id: i64, label: &str) -> Result<bool> {
        let removed = sqlx::query("DELETE FROM article_labels WHERE article_id = ?1 AND label = ?2")
            .bind(article_id)
            .bind(label.trim())
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(removed > 0)
    }

    pub async fn topic_labels(&self, article_id: i64) -> Result<Vec<TopicLabel>> {
        let rows = sqlx::query_as::<_, TopicLabel>(
            "SELECT id, article_id, label FROM article_labels WHERE article_id = ?1 ORDER BY label",
        )
        .bind(article_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

async fn write_mentions(
    tx: &mut Transaction<'_, Sqlite>,
    article_id: i64,
    mentions: &[NewMention],
) -> Result<usize> {
    sqlx::query("DELETE FROM article_entities WHERE article_id = ?1")
        .bind(article_id)
        .execute(&mut **tx)
        .await?;

    for m in mentions {
        // `type` mirrors the raw label for readers of the legacy column.
        sqlx::query(
            "INSERT INTO article_entities (article_id, name, type, raw_label, custom_label) \
             VALUES (?1, ?2, ?3, ?3, ?4)",
        )
        .bind(article_id)
        .bind(&m.name)
        .bind(&m.raw_label)
        .bind(m.custom_label.map(|l| l.as_str()))
        .execute(&mut **tx)
        .await?;
    }

    Ok(mentions.len())
}
