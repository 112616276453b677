use digester_store::StoreError;

/// Result type alias for ingest operations.
pub type Result<T> = std::result::Result<T, FetchError>;

/// Upstream failures while reading feeds or article pages. None of these
/// propagate past a single feed or entry during a run.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Upstream returned {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Failed to parse feed: {0}")]
    Parse(String),

    #[error("Text extraction failed for {url}: {reason}")]
    Extract { url: String, reason: String },

    #[error("No readable text at {0}")]
    EmptyContent(String),

    #[error("Not an http(s) URL: {0}")]
    UnsupportedUrl(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}
