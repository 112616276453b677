use std::sync::Arc;
use std::time::Duration;

use digester_common::AppConfig;
use tracing::info;

use crate::classifier::{KeywordClassifier, TopicClassifier};
use crate::error::ExtractionError;
use crate::extractor::{EntityExtractor, GazetteerExtractor, HttpEntityExtractor};

const NER_TIMEOUT: Duration = Duration::from_secs(30);

/// The collaborators an enrichment run uses. Built once and passed in.
#[derive(Clone)]
pub struct EnrichmentContext {
    pub classifier: Arc<dyn TopicClassifier>,
    pub extractor: Arc<dyn EntityExtractor>,
}

impl EnrichmentContext {
    pub fn new(classifier: Arc<dyn TopicClassifier>, extractor: Arc<dyn EntityExtractor>) -> Self {
        Self {
            classifier,
            extractor,
        }
    }

    /// Keyword topics, plus the NER service when one is configured and the
    /// gazetteer otherwise.
    pub fn from_config(config: &AppConfig) -> Result<Self, ExtractionError> {
        let extractor: Arc<dyn EntityExtractor> = match config.ner_endpoint.as_deref() {
            Some(endpoint) => {
                info!("Using external NER service");
                Arc::new(HttpEntityExtractor::new(endpoint, NER_TIMEOUT)?)
            }
            None => {
                let gazetteer = GazetteerExtractor::with_patterns_file(config.entity_patterns.as_deref());
                info!(patterns = gazetteer.pattern_count(), "Using gazetteer entity extractor");
                Arc::new(gazetteer)
            }
        };
        Ok(Self::new(Arc::new(KeywordClassifier::default()), extractor))
    }
}
