// Test helpers: a throwaway on-disk store and quick article fixtures.

use tempfile::TempDir;

use crate::models::{Article, NewArticle};
use crate::store::ArticleStore;

/// Open a migrated store in a fresh temp directory. Keep the `TempDir` alive
/// for as long as the store is used.
pub async fn temp_store() -> (ArticleStore, TempDir) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let url = format!("sqlite://{}", dir.path().join("articles.db").display());
    let store = ArticleStore::connect(&url).await.expect("open temp store");
    (store, dir)
}

/// Insert a minimal article with the given link and body text.
pub async fn seed_article(store: &ArticleStore, link: &str, content: &str) -> Article {
    store
        .insert_article(
            NewArticle::builder()
                .link(link)
                .title(format!("Article at {link}"))
                .summary("summary")
                .content(Some(content.to_string()))
                .source("Test Feed")
                .build(),
        )
        .await
        .expect("seed article")
}
