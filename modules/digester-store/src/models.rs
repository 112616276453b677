// Row types for the four tables plus the insert-side shapes.

use chrono::{DateTime, Utc};
use digester_common::EntityLabel;
use serde::Serialize;
use typed_builder::TypedBuilder;

/// A row from the `articles` table.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Article {
    pub id: i64,
    pub title: Option<String>,
    pub link: String,
    pub summary: Option<String>,
    pub content: Option<String>,
    pub published: Option<String>,
    pub source: Option<String>,
    /// Comma-joined topic tags. Empty or NULL means "not yet enriched".
    pub tags: Option<String>,
    pub fetched_at: Option<DateTime<Utc>>,
}

impl Article {
    /// Text that span offsets index into: content when present, else summary.
    pub fn text(&self) -> &str {
        non_empty(self.content.as_deref())
            .or_else(|| non_empty(self.summary.as_deref()))
            .unwrap_or("")
    }

    /// Title followed by the article text, as fed to the recognizer.
    pub fn recognizer_text(&self) -> String {
        format!("{}\n{}", self.title.as_deref().unwrap_or(""), self.text())
    }

    pub fn is_processed(&self) -> bool {
        non_empty(self.tags.as_deref()).is_some()
    }

    pub fn tag_list(&self) -> Vec<&str> {
        self.tags
            .as_deref()
            .unwrap_or("")
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect()
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|s| !s.is_empty())
}

/// Insert-side article. Tags are always written empty.
#[derive(Debug, Clone, TypedBuilder)]
pub struct NewArticle {
    #[builder(setter(into))]
    pub link: String,
    #[builder(default, setter(into))]
    pub title: String,
    #[builder(default, setter(into))]
    pub summary: String,
    /// Full text; `None` stores the summary in its place.
    #[builder(default)]
    pub content: Option<String>,
    #[builder(default, setter(into))]
    pub published: String,
    #[builder(default, setter(into))]
    pub source: String,
    #[builder(default = Utc::now())]
    pub fetched_at: DateTime<Utc>,
}

/// A row from the `article_entities` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct EntityMention {
    pub id: i64,
    pub article_id: i64,
    pub name: String,
    /// Falls back to the legacy `type` column for rows written before raw labels existed.
    pub raw_label: Option<String>,
    pub custom_label: Option<String>,
    pub legacy_type: Option<String>,
}

impl EntityMention {
    /// Parsed custom label. Unknown strings written by older tooling read as `None`.
    pub fn custom(&self) -> Option<EntityLabel> {
        self.custom_label.as_deref().and_then(|l| l.parse().ok())
    }
}

/// One mention to be written by `replace_entities`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMention {
    pub name: String,
    pub raw_label: String,
    pub custom_label: Option<EntityLabel>,
}

impl NewMention {
    pub fn new(name: impl Into<String>, raw_label: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            raw_label: raw_label.into(),
            custom_label: None,
        }
    }

    pub fn with_custom_label(mut self, label: EntityLabel) -> Self {
        self.custom_label = Some(label);
        self
    }
}

/// A row from the `article_labels` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct TopicLabel {
    pub id: i64,
    pub article_id: i64,
    pub label: String,
}

/// A row from the `article_span_annotations` table.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct SpanAnnotation {
    pub id: i64,
    pub article_id: i64,
    /// Inclusive character offset.
    pub start_char: i64,
    /// Exclusive character offset.
    pub end_char: i64,
    pub label: String,
    /// Copy of the covered text at creation time. Never revalidated.
    pub text: String,
    pub annotator: String,
    pub created_at: DateTime<Utc>,
}

/// A mention joined with its article, as shown on the correction surface.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct EntityRow {
    pub entity_id: i64,
    pub name: String,
    pub raw_label: Option<String>,
    pub custom_label: Option<String>,
    pub article_id: i64,
    pub title: Option<String>,
    pub source: Option<String>,
    pub link: String,
    pub published: Option<String>,
    pub content: Option<String>,
    pub summary: Option<String>,
}

impl EntityRow {
    /// Title plus article text, the haystack for context snippets.
    pub fn context_text(&self) -> String {
        let body = non_empty(self.content.as_deref())
            .or_else(|| non_empty(self.summary.as_deref()))
            .unwrap_or("");
        format!("{}\n{}", self.title.as_deref().unwrap_or("").trim(), body.trim())
    }
}
