// Named-entity extraction behind a trait: a phrase gazetteer that runs
// in-process, and a client for an external NER service.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use digester_common::is_tracked_raw_label;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ExtractionError;

/// One recognized mention with the recognizer's own label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMention {
    pub text: String,
    #[serde(alias = "label")]
    pub raw_label: String,
}

impl RawMention {
    pub fn new(text: &str, raw_label: &str) -> Self {
        Self {
            text: text.to_string(),
            raw_label: raw_label.to_string(),
        }
    }
}

#[async_trait]
pub trait EntityExtractor: Send + Sync {
    /// Mentions in document order, restricted to tracked raw labels.
    async fn extract(&self, text: &str) -> Result<Vec<RawMention>, ExtractionError>;
}

/// Drop untracked labels and blank names, trimming what is kept.
pub fn keep_tracked(mentions: Vec<RawMention>) -> Vec<RawMention> {
    mentions
        .into_iter()
        .filter(|m| is_tracked_raw_label(&m.raw_label))
        .filter_map(|m| {
            let text = m.text.trim();
            (!text.is_empty()).then(|| RawMention::new(text, &m.raw_label))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Gazetteer
// ---------------------------------------------------------------------------

/// A literal phrase and the label it yields.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EntityPattern {
    pub label: String,
    pub pattern: String,
}

impl EntityPattern {
    pub fn new(label: &str, pattern: &str) -> Self {
        Self {
            label: label.to_string(),
            pattern: pattern.to_string(),
        }
    }
}

/// Photonics organisations that are always recognized.
pub fn builtin_patterns() -> Vec<EntityPattern> {
    [
        "Lawrence Livermore National Laboratory",
        "Los Alamos National Laboratory",
        "NIST",
        "Macquarie University",
        "Trinity College Dublin",
        "Zeiss",
        "RP Photonics",
        "Optics.org",
        "Photonics Media",
    ]
    .into_iter()
    .map(|p| EntityPattern::new("ORG", p))
    .collect()
}

/// Read a JSON array of patterns. Entries that are not a `{label, pattern}`
/// pair with a string pattern are skipped.
pub fn load_patterns(path: &Path) -> anyhow::Result<Vec<EntityPattern>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read entity patterns: {}", path.display()))?;
    let values: Vec<serde_json::Value> = serde_json::from_str(&raw)
        .with_context(|| format!("Entity patterns must be a JSON array: {}", path.display()))?;

    let mut patterns = Vec::with_capacity(values.len());
    for value in values {
        match serde_json::from_value::<EntityPattern>(value) {
            Ok(p) if !p.pattern.trim().is_empty() => patterns.push(p),
            Ok(_) => {}
            Err(e) => warn!(path = %path.display(), error = %e, "Skipping unsupported entity pattern"),
        }
    }
    Ok(patterns)
}

/// Case-sensitive, whole-word phrase matcher. At each position the longest
/// pattern wins and matches never overlap.
#[derive(Debug, Clone)]
pub struct GazetteerExtractor {
    patterns: Vec<EntityPattern>,
}

impl GazetteerExtractor {
    pub fn new(mut patterns: Vec<EntityPattern>) -> Self {
        // A blank pattern matches everywhere and never advances the scan.
        patterns.retain(|p| !p.pattern.trim().is_empty());
        patterns.sort_by(|a, b| {
            b.pattern
                .len()
                .cmp(&a.pattern.len())
                .then_with(|| a.pattern.cmp(&b.pattern))
        });
        patterns.dedup_by(|a, b| a.pattern == b.pattern);
        Self { patterns }
    }

    /// Built-in patterns plus the optional file; a missing or broken file is
    /// logged and ignored.
    pub fn with_patterns_file(path: Option<&Path>) -> Self {
        let mut patterns = builtin_patterns();
        if let Some(path) = path {
            match load_patterns(path) {
                Ok(extra) => {
                    debug!(path = %path.display(), count = extra.len(), "Loaded entity patterns");
                    patterns.extend(extra);
                }
                Err(e) => warn!(error = %e, "Ignoring entity patterns file"),
            }
        }
        Self::new(patterns)
    }

    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }

    pub fn find(&self, text: &str) -> Vec<RawMention> {
        let mut found = Vec::new();
        let mut pos = 0;
        while pos < text.len() {
            let hit = self
                .patterns
                .iter()
                .find(|p| matches_at(text, pos, &p.pattern));
            match hit {
                Some(p) => {
                    found.push(RawMention::new(&p.pattern, &p.label));
                    pos += p.pattern.len();
                }
                None => {
                    pos += text[pos..].chars().next().map_or(1, char::len_utf8);
                }
            }
        }
        keep_tracked(found)
    }
}

impl Default for GazetteerExtractor {
    fn default() -> Self {
        Self::new(builtin_patterns())
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// `pattern` occurs at byte `pos` without touching a word character on an
/// edge where the pattern itself has one.
fn matches_at(text: &str, pos: usize, pattern: &str) -> bool {
    if !text[pos..].starts_with(pattern) {
        return false;
    }
    let starts_word = pattern.chars().next().is_some_and(is_word_char);
    let ends_word = pattern.chars().next_back().is_some_and(is_word_char);

    let before = text[..pos].chars().next_back();
    let after = text[pos + pattern.len()..].chars().next();

    !(starts_word && before.is_some_and(is_word_char))
        && !(ends_word && after.is_some_and(is_word_char))
}

#[async_trait]
impl EntityExtractor for GazetteerExtractor {
    async fn extract(&self, text: &str) -> Result<Vec<RawMention>, ExtractionError> {
        Ok(self.find(text))
    }
}

// ---------------------------------------------------------------------------
// External NER service
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct NerRequest<'a> {
    text: &'a str,
}

/// POSTs `{"text": ...}` and expects `[{"text": ..., "label": ...}]` back.
pub struct HttpEntityExtractor {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpEntityExtractor {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, ExtractionError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
        })
    }
}

#[async_trait]
impl EntityExtractor for HttpEntityExtractor {
    async fn extract(&self, text: &str) -> Result<Vec<RawMention>, ExtractionError> {
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&NerRequest { text })
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(ExtractionError::Extractor(format!(
                "NER service returned {status}: {}",
                body.chars().take(200).collect::<String>()
            )));
        }
        parse_ner_response(&body)
    }
}

pub fn parse_ner_response(body: &str) -> Result<Vec<RawMention>, ExtractionError> {
    let mentions: Vec<RawMention> =
        serde_json::from_str(body).map_err(|e| ExtractionError::Malformed(e.to_string()))?;
    Ok(keep_tracked(mentions))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(mentions: &[RawMention]) -> Vec<&str> {
        mentions.iter().map(|m| m.text.as_str()).collect()
    }

    #[test]
    fn builtin_organisations_are_found_in_order() {
        let g = GazetteerExtractor::default();
        let found = g.find("Zeiss partnered with NIST and Trinity College Dublin, said Optics.org.");
        assert_eq!(names(&found), vec!["Zeiss", "NIST", "Trinity College Dublin", "Optics.org"]);
        assert!(found.iter().all(|m| m.raw_label == "ORG"));
    }

    #[test]
    fn matching_is_case_sensitive_and_whole_word() {
        let g = GazetteerExtractor::default();
        assert!(g.find("zeiss lenses").is_empty());
        assert!(g.find("ZeissOptics and NISTX").is_empty());
        assert_eq!(names(&g.find("(NIST)")), vec!["NIST"]);
    }

    #[test]
    fn longest_pattern_wins() {
        let g = GazetteerExtractor::new(vec![
            EntityPattern::new("ORG", "Photonics"),
            EntityPattern::new("ORG", "RP Photonics"),
        ]);
        assert_eq!(names(&g.find("RP Photonics wiki")), vec!["RP Photonics"]);
    }

    #[test]
    fn blank_patterns_are_ignored() {
        let g = GazetteerExtractor::new(vec![
            EntityPattern::new("ORG", ""),
            EntityPattern::new("ORG", "   "),
            EntityPattern::new("ORG", "NIST"),
        ]);
        assert_eq!(names(&g.find("NIST lab")), vec!["NIST"]);
    }

    #[test]
    fn untracked_labels_are_dropped() {
        let g = GazetteerExtractor::new(vec![
            EntityPattern::new("PRODUCT", "Lumina X"),
            EntityPattern::new("PERSON", "Jane Smith"),
        ]);
        let found = g.find("Jane Smith unveiled Lumina X.");
        assert_eq!(found, vec![RawMention::new("Jane Smith", "PERSON")]);
    }

    #[test]
    fn non_ascii_text_is_walked_by_character() {
        let g = GazetteerExtractor::new(vec![EntityPattern::new("ORG", "École Polytechnique")]);
        let found = g.find("À l'École Polytechnique, NIST…");
        assert_eq!(names(&found), vec!["École Polytechnique"]);
    }

    #[test]
    fn patterns_file_extends_builtins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("patterns.json");
        std::fs::write(
            &path,
            r#"[
                {"label": "ORG", "pattern": "Coherent"},
                {"label": "ORG", "pattern": [{"LOWER": "token"}]},
                {"label": "GPE", "pattern": "Jena"}
            ]"#,
        )
        .unwrap();

        let loaded = load_patterns(&path).unwrap();
        assert_eq!(loaded.len(), 2);

        let g = GazetteerExtractor::with_patterns_file(Some(&path));
        assert_eq!(g.pattern_count(), builtin_patterns().len() + 2);
        assert_eq!(names(&g.find("Coherent opened a site in Jena")), vec!["Coherent", "Jena"]);
    }

    #[test]
    fn broken_patterns_file_falls_back_to_builtins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("patterns.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(load_patterns(&path).is_err());

        let g = GazetteerExtractor::with_patterns_file(Some(&path));
        assert_eq!(g.pattern_count(), builtin_patterns().len());
    }

    #[test]
    fn ner_response_parsing() {
        let body = r#"[
            {"text": " Zeiss ", "label": "ORG"},
            {"text": "Tuesday", "label": "DATE"},
            {"text": "Jena", "label": "GPE"}
        ]"#;
        let mentions = parse_ner_response(body).unwrap();
        assert_eq!(
            mentions,
            vec![RawMention::new("Zeiss", "ORG"), RawMention::new("Jena", "GPE")]
        );

        assert!(matches!(
            parse_ner_response(r#"{"entities": []}"#),
            Err(ExtractionError::Malformed(_))
        ));
    }
}
