// Schema bootstrap and in-place upgrade of databases written by older builds.
//
// Tables are created when missing. Columns added after the first release are
// then ALTERed onto pre-existing tables; a column that is already there is a
// no-op, never an error. Indexes come last because some cover added columns.

use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::Result;

const TABLES: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS articles (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title VARCHAR,
        link VARCHAR UNIQUE,
        summary TEXT,
        content TEXT,
        published VARCHAR,
        source VARCHAR,
        tags VARCHAR,
        fetched_at DATETIME
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS article_entities (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        article_id INTEGER REFERENCES articles(id) ON DELETE CASCADE,
        name VARCHAR,
        type VARCHAR,
        raw_label VARCHAR,
        custom_label VARCHAR
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS article_labels (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        article_id INTEGER REFERENCES articles(id) ON DELETE CASCADE,
        label VARCHAR,
        CONSTRAINT _article_label_uc UNIQUE (article_id, label)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS article_span_annotations (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        article_id INTEGER REFERENCES articles(id) ON DELETE CASCADE,
        start_char INTEGER NOT NULL,
        end_char INTEGER NOT NULL,
        label VARCHAR NOT NULL,
        text VARCHAR NOT NULL,
        annotator VARCHAR NOT NULL DEFAULT 'manual',
        created_at DATETIME NOT NULL,
        CHECK (start_char >= 0 AND start_char < end_char)
    )
    "#,
];

/// (table, column, declaration) for every column newer than the original schema.
const OPTIONAL_COLUMNS: &[(&str, &str, &str)] = &[
    ("articles", "content", "TEXT"),
    ("articles", "fetched_at", "DATETIME"),
    ("article_entities", "raw_label", "VARCHAR"),
    ("article_entities", "custom_label", "VARCHAR"),
];

const INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS ix_articles_tags ON articles (tags)",
    "CREATE INDEX IF NOT EXISTS ix_articles_fetched_at ON articles (fetched_at)",
    "CREATE INDEX IF NOT EXISTS ix_article_entities_article_id ON article_entities (article_id)",
    "CREATE INDEX IF NOT EXISTS ix_article_labels_article_id ON article_labels (article_id)",
    "CREATE INDEX IF NOT EXISTS ix_article_labels_label ON article_labels (label)",
    "CREATE INDEX IF NOT EXISTS ix_article_span_annotations_article_id ON article_span_annotations (article_id)",
    "CREATE INDEX IF NOT EXISTS ix_article_span_annotations_label ON article_span_annotations (label)",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ColumnUpgrade {
    Added,
    AlreadyPresent,
}

pub(crate) async fn migrate(pool: &SqlitePool) -> Result<()> {
    for ddl in TABLES {
        sqlx::query(ddl).execute(pool).await?;
    }

    let mut added = 0;
    for (table, column, decl) in OPTIONAL_COLUMNS {
        if add_column(pool, table, column, decl).await? == ColumnUpgrade::Added {
            info!(table, column, "Added missing column");
            added += 1;
        }
    }

    for ddl in INDEXES {
        sqlx::query(ddl).execute(pool).await?;
    }

    info!(columns_added = added, "Schema up to date");
    Ok(())
}

/// `ALTER TABLE ... ADD COLUMN`, treating "duplicate column" as success.
pub(crate) async fn add_column(
    pool: &SqlitePool,
    table: &str,
    column: &str,
    decl: &str,
) -> Result<ColumnUpgrade> {
    let ddl = format!("ALTER TABLE {table} ADD COLUMN {column} {decl}");
    match sqlx::query(&ddl).execute(pool).await {
        Ok(_) => Ok(ColumnUpgrade::Added),
        Err(e) if is_duplicate_column(&e) => {
            debug!(table, column, "Column already present");
            Ok(ColumnUpgrade::AlreadyPresent)
        }
        Err(e) => Err(e.into()),
    }
}

fn is_duplicate_column(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.message().contains("duplicate column name"),
        _ => false,
    }
}
