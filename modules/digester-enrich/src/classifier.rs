// Topic classification of an article into tags.

use async_trait::async_trait;

use crate::error::ExtractionError;

/// The article fields a classifier may look at.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticleFields {
    pub title: String,
    pub summary: String,
    pub content: String,
    pub source: String,
}

impl From<&digester_store::Article> for ArticleFields {
    fn from(article: &digester_store::Article) -> Self {
        let own = |v: &Option<String>| v.clone().unwrap_or_default();
        Self {
            title: own(&article.title),
            summary: own(&article.summary),
            content: own(&article.content),
            source: own(&article.source),
        }
    }
}

#[async_trait]
pub trait TopicClassifier: Send + Sync {
    /// Ordered topic tags. An empty list is a valid answer.
    async fn classify(&self, fields: &ArticleFields) -> Result<Vec<String>, ExtractionError>;
}

/// A tag and the keywords that trigger it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicRule {
    pub tag: String,
    pub keywords: Vec<String>,
}

impl TopicRule {
    pub fn new(tag: &str, keywords: &[&str]) -> Self {
        Self {
            tag: tag.to_string(),
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
        }
    }
}

/// Case-insensitive keyword matching over title, summary, content and source.
/// Tags come out in rule order, each at most once.
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    rules: Vec<TopicRule>,
}

impl KeywordClassifier {
    pub fn new(rules: Vec<TopicRule>) -> Self {
        Self { rules }
    }

    pub fn tags_for(&self, fields: &ArticleFields) -> Vec<String> {
        let haystack = [
            fields.title.as_str(),
            fields.summary.as_str(),
            fields.content.as_str(),
            fields.source.as_str(),
        ]
        .join("\n")
        .to_lowercase();

        let mut tags: Vec<String> = Vec::new();
        for rule in &self.rules {
            if tags.contains(&rule.tag) {
                continue;
            }
            if rule.keywords.iter().any(|k| haystack.contains(k.as_str())) {
                tags.push(rule.tag.clone());
            }
        }
        tags
    }
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self::new(vec![
            TopicRule::new("LASERS", &["laser", "ultrafast", "femtosecond", "picosecond"]),
            TopicRule::new("LIDAR", &["lidar", "time-of-flight", "range finding"]),
            TopicRule::new("QUANTUM", &["quantum", "photon pair", "entangle", "single-photon"]),
            TopicRule::new("FIBER_OPTICS", &["fiber optic", "optical fiber", "fibre", "waveguide"]),
            TopicRule::new("IMAGING", &["imaging", "camera", "microscop", "image sensor"]),
            TopicRule::new("SILICON_PHOTONICS", &["silicon photonics", "photonic integrated", "photonic chip"]),
            TopicRule::new("MATERIALS", &["metasurface", "metamaterial", "perovskite", "thin film"]),
            TopicRule::new("BIOPHOTONICS", &["biophotonics", "optogenetic", "medical imaging", "optical coherence tomography"]),
            TopicRule::new("AR_VR", &["augmented reality", "virtual reality", "head-mounted", "ar glasses"]),
            TopicRule::new("SPECTROSCOPY", &["spectroscop", "spectrometer", "raman"]),
            TopicRule::new("BUSINESS", &["acquires", "acquisition", "funding", "raises", "revenue"]),
        ])
    }
}

#[async_trait]
impl TopicClassifier for KeywordClassifier {
    async fn classify(&self, fields: &ArticleFields) -> Result<Vec<String>, ExtractionError> {
        Ok(self.tags_for(fields))
    }
}
