//! Article store behaviour against a real SQLite file.

use digester_common::EntityLabel;
use digester_store::testing::{seed_article, temp_store};
use digester_store::{ArticleStore, EntityFilter, NewArticle, NewMention, StoreError};
use sqlx::sqlite::SqlitePoolOptions;

fn mentions() -> Vec<NewMention> {
    vec![
        NewMention::new("Zeiss", "ORG").with_custom_label(EntityLabel::Company),
        NewMention::new("Jane Smith", "PERSON").with_custom_label(EntityLabel::Person),
    ]
}

// ---------------------------------------------------------------------------
// Articles and dedup
// ---------------------------------------------------------------------------

#[tokio::test]
async fn duplicate_link_is_rejected_and_only_one_row_exists() {
    let (store, _dir) = temp_store().await;

    let first = seed_article(&store, "https://optics.org/news/1", "body").await;
    assert_eq!(first.tags.as_deref(), Some(""));

    let err = store
        .insert_article(NewArticle::builder().link("https://optics.org/news/1").build())
        .await
        .unwrap_err();
    assert!(err.is_duplicate_link());
    assert!(matches!(err, StoreError::DuplicateLink { link } if link == "https://optics.org/news/1"));

    assert_eq!(store.count_articles().await.unwrap(), 1);
    assert!(store.link_exists("https://optics.org/news/1").await.unwrap());
    assert!(!store.link_exists("https://optics.org/news/2").await.unwrap());
}

#[tokio::test]
async fn missing_content_falls_back_to_summary() {
    let (store, _dir) = temp_store().await;
    let article = store
        .insert_article(
            NewArticle::builder()
                .link("https://example.com/a")
                .summary("Only a summary")
                .build(),
        )
        .await
        .unwrap();
    assert_eq!(article.content.as_deref(), Some("Only a summary"));
    assert_eq!(article.text(), "Only a summary");
    assert!(article.fetched_at.is_some());
}

#[tokio::test]
async fn unprocessed_articles_are_bounded_and_in_insertion_order() {
    let (store, _dir) = temp_store().await;
    let a = seed_article(&store, "https://e.com/a", "a").await;
    let b = seed_article(&store, "https://e.com/b", "b").await;
    let c = seed_article(&store, "https://e.com/c", "c").await;

    store.apply_enrichment(b.id, "LASERS", &[]).await.unwrap();

    let batch = store.find_unprocessed_articles(10).await.unwrap();
    let ids: Vec<i64> = batch.iter().map(|x| x.id).collect();
    assert_eq!(ids, vec![a.id, c.id]);

    let bounded = store.find_unprocessed_articles(1).await.unwrap();
    assert_eq!(bounded.len(), 1);
    assert_eq!(bounded[0].id, a.id);

    assert!(store.find_unprocessed_articles(0).await.unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

#[tokio::test]
async fn replace_entities_swaps_the_whole_set() {
    let (store, _dir) = temp_store().await;
    let article = seed_article(&store, "https://e.com/a", "Zeiss and Jane Smith").await;

    store.replace_entities(article.id, &mentions()).await.unwrap();
    store.replace_entities(article.id, &mentions()).await.unwrap();

    let stored = store.entities_for_article(article.id).await.unwrap();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].name, "Zeiss");
    assert_eq!(stored[0].raw_label.as_deref(), Some("ORG"));
    assert_eq!(stored[0].legacy_type.as_deref(), Some("ORG"));
    assert_eq!(stored[0].custom(), Some(EntityLabel::Company));

    store
        .replace_entities(article.id, &[NewMention::new("NIST", "ORG")])
        .await
        .unwrap();
    let stored = store.entities_for_article(article.id).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].name, "NIST");
    assert_eq!(stored[0].custom_label, None);
}

#[tokio::test]
async fn enrichment_write_for_missing_article_changes_nothing() {
    let (store, _dir) = temp_store().await;
    let err = store.apply_enrichment(404, "LASERS", &mentions()).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound { entity: "article", id: 404 }));

    let err = store.replace_entities(404, &mentions()).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }));
}

#[tokio::test]
async fn custom_label_upsert_skips_unchanged_values() {
    let (store, _dir) = temp_store().await;
    let article = seed_article(&store, "https://e.com/a", "Zeiss").await;
    store.replace_entities(article.id, &mentions()).await.unwrap();
    let zeiss = store.entities_for_article(article.id).await.unwrap()[0].clone();

    assert!(!store.upsert_custom_label(zeiss.id, Some(EntityLabel::Company)).await.unwrap());
    assert!(store.upsert_custom_label(zeiss.id, Some(EntityLabel::ResearchGroup)).await.unwrap());
    assert!(store.upsert_custom_label(zeiss.id, None).await.unwrap());
    assert!(!store.upsert_custom_label(zeiss.id, None).await.unwrap());

    let err = store.upsert_custom_label(9999, Some(EntityLabel::Other)).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound { entity: "entity", .. }));
}

#[tokio::test]
async fn label_corrections_count_only_changed_rows() {
    let (store, _dir) = temp_store().await;
    let article = seed_article(&store, "https://e.com/a", "Zeiss and Jane Smith").await;
    store.replace_entities(article.id, &mentions()).await.unwrap();
    let ents = store.entities_for_article(article.id).await.unwrap();

    let updated = store
        .apply_label_corrections(&[
            (ents[0].id, Some(EntityLabel::Company)),
            (ents[1].id, Some(EntityLabel::Ignore)),
            (424242, Some(EntityLabel::Other)),
        ])
        .await
        .unwrap();
    assert_eq!(updated, 1);

    let rows = store
        .entity_rows(&EntityFilter {
            custom_labels: vec![EntityLabel::Ignore],
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].name, "Jane Smith");
    assert_eq!(rows[0].link, "https://e.com/a");
}

// ---------------------------------------------------------------------------
// Topic labels
// ---------------------------------------------------------------------------

#[tokio::test]
async fn topic_labels_are_unique_per_article() {
    let (store, _dir) = temp_store().await;
    let a = seed_article(&store, "https://e.com/a", "a").await;
    let b = seed_article(&store, "https://e.com/b", "b").await;

    assert!(store.add_topic_label(a.id, "LIDAR").await.unwrap());
    assert!(!store.add_topic_label(a.id, "LIDAR").await.unwrap());
    assert!(store.add_topic_label(b.id, "LIDAR").await.unwrap());
    assert!(store.add_topic_label(a.id, "MATERIALS").await.unwrap());

    let labels: Vec<String> = store
        .topic_labels(a.id)
        .await
        .unwrap()
        .into_iter()
        .map(|l| l.label)
        .collect();
    assert_eq!(labels, vec!["LIDAR", "MATERIALS"]);

    assert!(store.remove_topic_label(a.id, "LIDAR").await.unwrap());
    assert!(!store.remove_topic_label(a.id, "LIDAR").await.unwrap());
    assert!(store.add_topic_label(777, "LIDAR").await.is_err());
}

// ---------------------------------------------------------------------------
// Spans
// ---------------------------------------------------------------------------

#[tokio::test]
async fn span_invariant_violations_write_nothing() {
    let (store, _dir) = temp_store().await;
    let article = seed_article(&store, "https://e.com/a", "Macquarie University").await;

    for (start, end) in [(5, 5), (6, 2), (-1, 4), (0, 21), (30, 40)] {
        let err = store
            .add_span_annotation(article.id, start, end, EntityLabel::University, "manual")
            .await
            .unwrap_err();
        assert!(
            matches!(err, StoreError::InvalidRange { len: 20, .. }),
            "({start}, {end}) should be rejected, got {err:?}"
        );
    }

    let err = store
        .add_span_annotation(article.id, 0, 9, EntityLabel::Ignore, "manual")
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidSpanLabel(EntityLabel::Ignore)));

    assert!(store.spans_for_article(article.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn spans_store_the_covered_text() {
    let (store, _dir) = temp_store().await;
    let article = seed_article(&store, "https://e.com/a", "Macquarie University").await;

    let span = store
        .add_span_annotation(article.id, 0, 20, EntityLabel::University, "  ")
        .await
        .unwrap();
    assert_eq!(span.text, "Macquarie University");
    assert_eq!(span.label, "UNIVERSITY");
    assert_eq!(span.annotator, "manual");

    let by_search = store
        .add_span_by_occurrence(article.id, "university", 0, EntityLabel::Other, "alice")
        .await
        .unwrap();
    assert_eq!((by_search.start_char, by_search.end_char), (10, 20));
    assert_eq!(by_search.text, "University");
    assert_eq!(by_search.annotator, "alice");

    let missing = store
        .add_span_by_occurrence(article.id, "university", 1, EntityLabel::Other, "alice")
        .await
        .unwrap_err();
    assert!(matches!(missing, StoreError::OccurrenceNotFound { index: 1, .. }));

    let spans = store.spans_for_article(article.id).await.unwrap();
    assert_eq!(spans.len(), 2);

    assert!(store.delete_span_annotation(span.id).await.unwrap());
    assert!(!store.delete_span_annotation(span.id).await.unwrap());
    assert_eq!(store.spans_for_article(article.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn spans_on_summary_only_articles_index_the_summary() {
    let (store, _dir) = temp_store().await;
    let article = store
        .insert_article(
            NewArticle::builder()
                .link("https://e.com/s")
                .title("Title is not indexed")
                .summary("Oak Ridge expands")
                .build(),
        )
        .await
        .unwrap();

    let span = store
        .add_span_annotation(article.id, 0, 9, EntityLabel::GovLab, "manual")
        .await
        .unwrap();
    assert_eq!(span.text, "Oak Ridge");
}

#[tokio::test]
async fn training_export_skips_stale_spans() {
    let (store, _dir) = temp_store().await;
    let a = seed_article(&store, "https://e.com/a", "NIST and Zeiss").await;
    let b = seed_article(&store, "https://e.com/b", "Los Alamos").await;
    let _untouched = seed_article(&store, "https://e.com/c", "no spans").await;

    store.add_span_annotation(a.id, 0, 4, EntityLabel::GovLab, "m").await.unwrap();
    store.add_span_annotation(a.id, 9, 14, EntityLabel::Company, "m").await.unwrap();
    store.add_span_annotation(b.id, 0, 10, EntityLabel::GovLab, "m").await.unwrap();

    // Simulate a re-fetch that rewrote article b's text.
    sqlx::query("UPDATE articles SET content = 'Completely different' WHERE id = ?1")
        .bind(b.id)
        .execute(store.pool())
        .await
        .unwrap();

    let examples = store.training_examples().await.unwrap();
    assert_eq!(examples.len(), 1);
    assert_eq!(examples[0].article_id, a.id);
    assert_eq!(examples[0].text, "NIST and Zeiss");
    let labels: Vec<&str> = examples[0].spans.iter().map(|s| s.label.as_str()).collect();
    assert_eq!(labels, vec!["GOV_LAB", "COMPANY"]);
}

// ---------------------------------------------------------------------------
// Cascade delete
// ---------------------------------------------------------------------------

#[tokio::test]
async fn deleting_an_article_removes_only_its_children() {
    let (store, _dir) = temp_store().await;
    let doomed = seed_article(&store, "https://e.com/doomed", "Zeiss and Jane Smith").await;
    let kept = seed_article(&store, "https://e.com/kept", "Zeiss and Jane Smith").await;

    for id in [doomed.id, kept.id] {
        store.replace_entities(id, &mentions()).await.unwrap();
        store.add_topic_label(id, "LASERS").await.unwrap();
        store.add_span_annotation(id, 0, 5, EntityLabel::Company, "m").await.unwrap();
    }

    assert!(store.delete_article(doomed.id).await.unwrap());
    assert!(!store.delete_article(doomed.id).await.unwrap());

    assert!(store.get_article(doomed.id).await.unwrap().is_none());
    assert!(store.entities_for_article(doomed.id).await.unwrap().is_empty());
    assert!(store.topic_labels(doomed.id).await.unwrap().is_empty());
    assert!(store.spans_for_article(doomed.id).await.unwrap().is_empty());

    assert_eq!(store.entities_for_article(kept.id).await.unwrap().len(), 2);
    assert_eq!(store.topic_labels(kept.id).await.unwrap().len(), 1);
    assert_eq!(store.spans_for_article(kept.id).await.unwrap().len(), 1);
}

// ---------------------------------------------------------------------------
// Schema upgrade
// ---------------------------------------------------------------------------

async fn column_names(store: &ArticleStore, table: &str) -> Vec<String> {
    sqlx::query_scalar::<_, String>(&format!("SELECT name FROM pragma_table_info('{table}')"))
        .fetch_all(store.pool())
        .await
        .unwrap()
}

#[tokio::test]
async fn legacy_database_is_upgraded_in_place_and_idempotently() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("legacy.db").display());

    // A database written before content, fetched_at and raw/custom labels existed.
    {
        let pool = SqlitePoolOptions::new().connect(&url).await.unwrap();
        for ddl in [
            "CREATE TABLE articles (id INTEGER PRIMARY KEY, title VARCHAR, link VARCHAR UNIQUE, \
             summary TEXT, published VARCHAR, source VARCHAR, tags VARCHAR)",
            "CREATE TABLE article_entities (id INTEGER PRIMARY KEY, \
             article_id INTEGER REFERENCES articles(id), name VARCHAR, type VARCHAR)",
            "INSERT INTO articles (id, title, link, summary, tags) \
             VALUES (1, 'Old', 'https://old.example/1', 'Argonne news', 'LASERS')",
            "INSERT INTO article_entities (article_id, name, type) VALUES (1, 'Argonne', 'ORG')",
        ] {
            sqlx::query(ddl).execute(&pool).await.unwrap();
        }
        pool.close().await;
    }

    let store = ArticleStore::connect(&url).await.unwrap();
    store.migrate().await.unwrap();

    let article_cols = column_names(&store, "articles").await;
    assert!(article_cols.contains(&"content".to_string()));
    assert!(article_cols.contains(&"fetched_at".to_string()));
    let entity_cols = column_names(&store, "article_entities").await;
    assert!(entity_cols.contains(&"raw_label".to_string()));
    assert!(entity_cols.contains(&"custom_label".to_string()));

    let old = store.get_article(1).await.unwrap().unwrap();
    assert_eq!(old.text(), "Argonne news");
    assert_eq!(old.fetched_at, None);

    let ents = store.entities_for_article(1).await.unwrap();
    assert_eq!(ents[0].raw_label.as_deref(), Some("ORG"));

    // Legacy child tables have no ON DELETE CASCADE; delete still cleans up.
    assert!(store.delete_article(1).await.unwrap());
    assert!(store.entities_for_article(1).await.unwrap().is_empty());

    // A second process opening the same file runs the upgrade again.
    let again = ArticleStore::connect(&url).await.unwrap();
    assert_eq!(again.count_articles().await.unwrap(), 0);
}

#[tokio::test]
async fn in_memory_store_keeps_its_data_across_calls() {
    let store = ArticleStore::connect("sqlite::memory:").await.unwrap();
    seed_article(&store, "https://e.com/mem", "memory").await;
    assert_eq!(store.count_articles().await.unwrap(), 1);
}
