// Annotation surface: label corrections and ground-truth character spans.
//
// Offsets are character (Unicode scalar) offsets into `Article::text()`, the
// same unit a human counts in the review UI. Spans are written as-is and never
// revalidated if the article text later changes.

use std::collections::BTreeMap;

use chrono::Utc;
use digester_common::EntityLabel;
use regex::RegexBuilder;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{Result, StoreError};
use crate::models::{EntityRow, SpanAnnotation};
use crate::store::ArticleStore;

const SPAN_COLUMNS: &str =
    "id, article_id, start_char, end_char, label, text, annotator, created_at";

const DEFAULT_ANNOTATOR: &str = "manual";

/// Number of characters in `text`.
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Substring by character offsets, `None` if out of bounds or reversed.
pub fn char_slice(text: &str, start: usize, end: usize) -> Option<&str> {
    if start > end {
        return None;
    }
    let mut bounds = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()));
    let from = bounds.nth(start)?;
    let to = if end == start {
        from
    } else {
        bounds.nth(end - start - 1)?
    };
    Some(&text[from..to])
}

/// Check `0 <= start < end <= len(text)` and return the offsets as indices.
pub(crate) fn validate_span(text: &str, start: i64, end: i64) -> Result<(usize, usize)> {
    let len = char_len(text);
    if start < 0 || start >= end || end as u64 > len as u64 {
        return Err(StoreError::InvalidRange { start, end, len });
    }
    Ok((start as usize, end as usize))
}

/// Case-insensitive, non-overlapping matches of `needle` as character offsets.
pub fn find_occurrences(text: &str, needle: &str) -> Vec<(usize, usize)> {
    if text.is_empty() || needle.is_empty() {
        return Vec::new();
    }
    let Ok(re) = RegexBuilder::new(&regex::escape(needle))
        .case_insensitive(true)
        .build()
    else {
        return Vec::new();
    };

    let mut spans = Vec::new();
    let (mut last_byte, mut last_char) = (0, 0);
    for m in re.find_iter(text) {
        let start = last_char + text[last_byte..m.start()].chars().count();
        let end = start + m.as_str().chars().count();
        spans.push((start, end));
        last_byte = m.end();
        last_char = end;
    }
    spans
}

/// Snippet of `window` characters either side of the first case-insensitive
/// occurrence of `name`, with every occurrence inside it wrapped in `**`.
pub fn entity_context(name: &str, text: &str, window: usize) -> Option<String> {
    let hits = find_occurrences(text, name);
    let &(first_start, first_end) = hits.first()?;

    let from = first_start.saturating_sub(window);
    let to = (first_end + window).min(char_len(text));

    let mut out = String::new();
    let mut cursor = from;
    for &(s, e) in hits.iter().filter(|(s, e)| *s >= from && *e <= to) {
        out.push_str(char_slice(text, cursor, s)?);
        out.push_str("**");
        out.push_str(char_slice(text, s, e)?);
        out.push_str("**");
        cursor = e;
    }
    out.push_str(char_slice(text, cursor, to)?);
    Some(out)
}

/// A run of text covered by the same set of spans.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Segment {
    pub start: usize,
    pub end: usize,
    pub text: String,
    /// Labels of every span covering this run; empty for plain text.
    pub labels: Vec<String>,
}

/// Split `text` at every span boundary so overlapping spans render correctly.
/// Spans that no longer fit the text are clipped or dropped.
pub fn highlight_segments(text: &str, spans: &[SpanAnnotation]) -> Vec<Segment> {
    let len = char_len(text);
    if len == 0 {
        return Vec::new();
    }

    let ranges: Vec<(usize, usize, &str)> = spans
        .iter()
        .filter(|s| s.start_char >= 0 && s.start_char < s.end_char)
        .map(|s| {
            let start = s.start_char as usize;
            let end = (s.end_char as usize).min(len);
            (start, end, s.label.as_str())
        })
        .filter(|(start, end, _)| start < end)
        .collect();

    let mut bounds = vec![0, len];
    for (start, end, _) in &ranges {
        bounds.push(*start);
        bounds.push(*end);
    }
    bounds.sort_unstable();
    bounds.dedup();

    bounds
        .windows(2)
        .filter_map(|w| {
            let (start, end) = (w[0], w[1]);
            let labels = ranges
                .iter()
                .filter(|(s, e, _)| *s <= start && end <= *e)
                .map(|(_, _, label)| label.to_string())
                .collect();
            Some(Segment {
                start,
                end,
                text: char_slice(text, start, end)?.to_string(),
                labels,
            })
        })
        .collect()
}

/// Filters for the correction surface. Empty lists match everything.
#[derive(Debug, Clone, Default)]
pub struct EntityFilter {
    pub raw_labels: Vec<String>,
    /// A mention with no custom label is treated as `OTHER` here.
    pub custom_labels: Vec<EntityLabel>,
    /// Case-insensitive substring over entity name, title and source.
    pub search: Option<String>,
}

impl EntityFilter {
    pub fn matches(&self, row: &EntityRow) -> bool {
        if !self.raw_labels.is_empty() {
            let raw = row.raw_label.as_deref().unwrap_or("");
            if !self.raw_labels.iter().any(|r| r == raw) {
                return false;
            }
        }

        if !self.custom_labels.is_empty() {
            let custom = row
                .custom_label
                .as_deref()
                .filter(|c| !c.is_empty())
                .and_then(|c| c.parse().ok())
                .unwrap_or(EntityLabel::Other);
            if !self.custom_labels.contains(&custom) {
                return false;
            }
        }

        if let Some(needle) = self.search.as_deref().map(str::to_lowercase) {
            let hit = [Some(row.name.as_str()), row.title.as_deref(), row.source.as_deref()]
                .into_iter()
                .flatten()
                .any(|field| field.to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }

        true
    }
}

/// One annotated article in training-export form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrainingExample {
    pub article_id: i64,
    pub text: String,
    pub spans: Vec<TrainingSpan>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrainingSpan {
    pub start: usize,
    pub end: usize,
    pub label: String,
}

impl ArticleStore {
    /// Record a ground-truth span. Offsets are validated against the current
    /// article text; on failure no row is written.
    pub async fn add_span_annotation(
        &self,
        article_id: i64,
        start: i64,
        end: i64,
        label: EntityLabel,
        annotator: &str,
    ) -> Result<SpanAnnotation> {
        if !label.is_span_label() {
            return Err(StoreError::InvalidSpanLabel(label));
        }
        let article = self.require_article(article_id).await?;
        let text = article.text();
        let (from, to) = validate_span(text, start, end)?;
        let covered = char_slice(text, from, to).unwrap_or_default();

        let annotator = match annotator.trim() {
            "" => DEFAULT_ANNOTATOR,
            a => a,
        };

        let sql = format!(
            "INSERT INTO article_span_annotations \
             (article_id, start_char, end_char, label, text, annotator, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) RETURNING {SPAN_COLUMNS}"
        );
        let span = sqlx::query_as::<_, SpanAnnotation>(&sql)
            .bind(article_id)
            .bind(start)
            .bind(end)
            .bind(label.as_str())
            .bind(covered)
            .bind(annotator)
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await?;

        info!(
            article_id,
            span_id = span.id,
            start,
            end,
            label = label.as_str(),
            "Added span annotation"
        );
        Ok(span)
    }

    /// Annotate the `index`-th (0-based) case-insensitive occurrence of `needle`.
    pub async fn add_span_by_occurrence(
        &self,
        article_id: i64,
        needle: &str,
        index: usize,
        label: EntityLabel,
        annotator: &str,
    ) -> Result<SpanAnnotation> {
        let article = self.require_article(article_id).await?;
        let hits = find_occurrences(article.text(), needle);
        let Some(&(start, end)) = hits.get(index) else {
            return Err(StoreError::OccurrenceNotFound {
                article_id,
                needle: needle.to_string(),
                index,
            });
        };
        self.add_span_annotation(article_id, start as i64, end as i64, label, annotator)
            .await
    }

    pub async fn spans_for_article(&self, article_id: i64) -> Result<Vec<SpanAnnotation>> {
        let sql = format!(
            "SELECT {SPAN_COLUMNS} FROM article_span_annotations \
             WHERE article_id = ?1 ORDER BY start_char ASC, id ASC"
        );
        let rows = sqlx::query_as::<_, SpanAnnotation>(&sql)
            .bind(article_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn delete_span_annotation(&self, id: i64) -> Result<bool> {
        let deleted = sqlx::query("DELETE FROM article_span_annotations WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        if deleted > 0 {
            info!(span_id = id, "Deleted span annotation");
        }
        Ok(deleted > 0)
    }

    /// Mentions joined with their articles, filtered in memory.
    pub async fn entity_rows(&self, filter: &EntityFilter) -> Result<Vec<EntityRow>> {
        let rows = sqlx::query_as::<_, EntityRow>(
            r#"
            SELECT e.id AS entity_id,
                   COALESCE(e.name, '') AS name,
                   COALESCE(e.raw_label, e.type) AS raw_label,
                   e.custom_label,
                   a.id AS article_id,
                   a.title,
                   a.source,
                   COALESCE(a.link, '') AS link,
                   a.published,
                   a.content,
                   a.summary
            FROM article_entities e
            JOIN articles a ON a.id = e.article_id
            ORDER BY e.id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().filter(|r| filter.matches(r)).collect())
    }

    /// Apply a batch of custom-label edits. Returns how many rows changed.
    /// Unknown entity ids are skipped with a warning.
    pub async fn apply_label_corrections(
        &self,
        corrections: &[(i64, Option<EntityLabel>)],
    ) -> Result<usize> {
        let mut updated = 0;
        for &(entity_id, label) in corrections {
            match self.upsert_custom_label(entity_id, label).await {
                Ok(true) => updated += 1,
                Ok(false) => {}
                Err(StoreError::NotFound { .. }) => {
                    warn!(entity_id, "Skipping correction for unknown entity");
                }
                Err(e) => return Err(e),
            }
        }
        info!(updated, submitted = corrections.len(), "Applied label corrections");
        Ok(updated)
    }

    /// Every annotated article with its spans, for model training. Spans whose
    /// stored text no longer matches the live article text are left out.
    pub async fn training_examples(&self) -> Result<Vec<TrainingExample>> {
        let sql = format!(
            "SELECT {SPAN_COLUMNS} FROM article_span_annotations \
             ORDER BY article_id ASC, start_char ASC, id ASC"
        );
        let spans = sqlx::query_as::<_, SpanAnnotation>(&sql)
            .fetch_all(&self.pool)
            .await?;

        let mut by_article: BTreeMap<i64, Vec<SpanAnnotation>> = BTreeMap::new();
        for span in spans {
            by_article.entry(span.article_id).or_default().push(span);
        }

        let mut examples = Vec::with_capacity(by_article.len());
        for (article_id, spans) in by_article {
            let Some(article) = self.get_article(article_id).await? else {
                continue;
            };
            let text = article.text();
            let spans: Vec<TrainingSpan> = spans
                .into_iter()
                .filter_map(|s| {
                    let (start, end) = validate_span(text, s.start_char, s.end_char).ok()?;
                    if char_slice(text, start, end) != Some(s.text.as_str()) {
                        warn!(span_id = s.id, article_id, "Skipping stale span");
                        return None;
                    }
                    Some(TrainingSpan {
                        start,
                        end,
                        label: s.label,
                    })
                })
                .collect();

            if !spans.is_empty() {
                examples.push(TrainingExample {
                    article_id,
                    text: text.to_string(),
                    spans,
                });
            }
        }
        Ok(examples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn span(start: i64, end: i64, label: &str) -> SpanAnnotation {
        SpanAnnotation {
            id: 0,
            article_id: 1,
            start_char: start,
            end_char: end,
            label: label.to_string(),
            text: String::new(),
            annotator: "manual".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn char_slice_uses_character_offsets() {
        let text = "École Polytechnique";
        assert_eq!(char_slice(text, 0, 5), Some("École"));
        assert_eq!(char_slice(text, 6, 19), Some("Polytechnique"));
        assert_eq!(char_slice(text, 19, 19), Some(""));
        assert_eq!(char_slice(text, 0, 20), None);
        assert_eq!(char_slice(text, 3, 2), None);
    }

    #[test]
    fn validate_span_rejects_bad_offsets() {
        let text = "Zeiss lens";
        assert!(validate_span(text, 0, 5).is_ok());
        assert!(validate_span(text, 0, 10).is_ok());
        assert!(matches!(
            validate_span(text, -1, 3),
            Err(StoreError::InvalidRange { start: -1, end: 3, len: 10 })
        ));
        assert!(validate_span(text, 4, 4).is_err());
        assert!(validate_span(text, 5, 2).is_err());
        assert!(validate_span(text, 2, 11).is_err());
    }

    #[test]
    fn occurrences_are_case_insensitive_and_non_overlapping() {
        let text = "NIST and nist and Nist";
        assert_eq!(find_occurrences(text, "nist"), vec![(0, 4), (9, 13), (18, 22)]);
        assert_eq!(find_occurrences("aaaa", "aa"), vec![(0, 2), (2, 4)]);
        assert!(find_occurrences(text, "").is_empty());
        assert!(find_occurrences("", "nist").is_empty());
    }

    #[test]
    fn occurrences_count_characters_not_bytes() {
        let text = "Über die École Polytechnique und die école";
        assert_eq!(find_occurrences(text, "école"), vec![(9, 14), (37, 42)]);
        assert_eq!(char_slice(text, 9, 14), Some("École"));
    }

    #[test]
    fn occurrences_escape_regex_metacharacters() {
        assert_eq!(find_occurrences("see Optics.org now", "optics.org"), vec![(4, 14)]);
        assert!(find_occurrences("see Opticsxorg now", "optics.org").is_empty());
    }

    #[test]
    fn entity_context_marks_hits_inside_window() {
        let text = "The team at NIST worked with nist researchers.";
        let ctx = entity_context("NIST", text, 5).unwrap();
        assert_eq!(ctx, "m at **NIST** work");

        let wide = entity_context("nist", text, 100).unwrap();
        assert_eq!(wide, "The team at **NIST** worked with **nist** researchers.");

        assert!(entity_context("Zeiss", text, 10).is_none());
    }

    #[test]
    fn highlight_segments_without_spans_is_one_plain_run() {
        let segments = highlight_segments("plain text", &[]);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, "plain text");
        assert!(segments[0].labels.is_empty());
    }

    #[test]
    fn highlight_segments_handles_overlap() {
        let text = "Lawrence Livermore National Laboratory";
        let spans = [span(0, 18, "PERSON"), span(9, 38, "GOV_LAB")];
        let segments = highlight_segments(text, &spans);

        let view: Vec<(&str, Vec<&str>)> = segments
            .iter()
            .map(|s| (s.text.as_str(), s.labels.iter().map(String::as_str).collect()))
            .collect();
        assert_eq!(
            view,
            vec![
                ("Lawrence ", vec!["PERSON"]),
                ("Livermore", vec!["PERSON", "GOV_LAB"]),
                (" National Laboratory", vec!["GOV_LAB"]),
            ]
        );
    }

    #[test]
    fn highlight_segments_clips_stale_spans() {
        let segments = highlight_segments("short", &[span(2, 50, "OTHER"), span(9, 12, "FAC")]);
        let texts: Vec<&str> = segments.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["sh", "ort"]);
        assert_eq!(segments[1].labels, vec!["OTHER".to_string()]);
    }

    fn row(name: &str, raw: &str, custom: Option<&str>) -> EntityRow {
        EntityRow {
            entity_id: 1,
            name: name.to_string(),
            raw_label: Some(raw.to_string()),
            custom_label: custom.map(Into::into),
            article_id: 1,
            title: Some("Fiber lasers at scale".into()),
            source: Some("Optics.org".into()),
            link: "https://optics.org/a".into(),
            published: None,
            content: None,
            summary: None,
        }
    }

    #[test]
    fn filter_treats_missing_custom_label_as_other() {
        let filter = EntityFilter {
            custom_labels: vec![EntityLabel::Other],
            ..Default::default()
        };
        assert!(filter.matches(&row("Zeiss", "ORG", None)));
        assert!(filter.matches(&row("Zeiss", "ORG", Some(""))));
        assert!(!filter.matches(&row("Zeiss", "ORG", Some("COMPANY"))));
    }

    #[test]
    fn filter_by_raw_label_and_search() {
        let filter = EntityFilter {
            raw_labels: vec!["ORG".into()],
            search: Some("OPTICS".into()),
            ..Default::default()
        };
        assert!(filter.matches(&row("Zeiss", "ORG", None)));
        assert!(!filter.matches(&row("Jane Smith", "PERSON", None)));

        let by_title = EntityFilter {
            search: Some("fiber".into()),
            ..Default::default()
        };
        assert!(by_title.matches(&row("Zeiss", "ORG", None)));
    }
}
