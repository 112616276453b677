// Deterministic stand-ins for the classifier and extractor.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::classifier::{ArticleFields, TopicClassifier};
use crate::error::ExtractionError;
use crate::extractor::{EntityExtractor, RawMention};

// ---------------------------------------------------------------------------
// StubClassifier
// ---------------------------------------------------------------------------

/// Returns the same tags for every article, or fails for titles containing
/// the configured marker.
#[derive(Default)]
pub struct StubClassifier {
    tags: Vec<String>,
    fail_on: Option<String>,
}

impl StubClassifier {
    pub fn new(tags: &[&str]) -> Self {
        Self {
            tags: tags.iter().map(|t| t.to_string()).collect(),
            fail_on: None,
        }
    }

    pub fn fail_on(mut self, title_marker: &str) -> Self {
        self.fail_on = Some(title_marker.to_string());
        self
    }
}

#[async_trait]
impl TopicClassifier for StubClassifier {
    async fn classify(&self, fields: &ArticleFields) -> Result<Vec<String>, ExtractionError> {
        if let Some(marker) = &self.fail_on {
            if fields.title.contains(marker.as_str()) {
                return Err(ExtractionError::Classifier(format!("stub failure on {marker}")));
            }
        }
        Ok(self.tags.clone())
    }
}

// ---------------------------------------------------------------------------
// StubExtractor
// ---------------------------------------------------------------------------

/// Returns fixed mentions, or fails for texts containing the marker.
/// Counts calls so tests can assert which articles reached extraction.
#[derive(Default)]
pub struct StubExtractor {
    mentions: Vec<RawMention>,
    fail_on: Option<String>,
    calls: AtomicUsize,
}

impl StubExtractor {
    pub fn new(mentions: &[(&str, &str)]) -> Self {
        Self {
            mentions: mentions
                .iter()
                .map(|(text, label)| RawMention::new(text, label))
                .collect(),
            ..Default::default()
        }
    }

    pub fn fail_on(mut self, text_marker: &str) -> Self {
        self.fail_on = Some(text_marker.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EntityExtractor for StubExtractor {
    async fn extract(&self, text: &str) -> Result<Vec<RawMention>, ExtractionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(marker) = &self.fail_on {
            if text.contains(marker.as_str()) {
                return Err(ExtractionError::Extractor(format!("stub failure on {marker}")));
            }
        }
        Ok(self.mentions.clone())
    }
}
