use digester_store::StoreError;

/// Failure of a classifier or entity extractor on one article.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("Classifier failed: {0}")]
    Classifier(String),

    #[error("Entity extractor failed: {0}")]
    Extractor(String),

    #[error("NER request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Malformed NER response: {0}")]
    Malformed(String),
}

/// Why one article could not be enriched. The article is left untouched.
#[derive(Debug, thiserror::Error)]
pub enum EnrichError {
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, EnrichError>;
