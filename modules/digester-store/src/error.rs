use digester_common::EntityLabel;

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Benign under re-runs and concurrent fetchers; callers skip the entry.
    #[error("Article already stored for link: {link}")]
    DuplicateLink { link: String },

    #[error("Invalid span [{start}, {end}) for text of length {len}")]
    InvalidRange { start: i64, end: i64, len: usize },

    #[error("No occurrence #{index} of {needle:?} in article {article_id}")]
    OccurrenceNotFound {
        article_id: i64,
        needle: String,
        index: usize,
    },

    #[error("Label {0} cannot be used for span annotations")]
    InvalidSpanLabel(EntityLabel),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    pub fn is_duplicate_link(&self) -> bool {
        matches!(self, StoreError::DuplicateLink { .. })
    }
}
