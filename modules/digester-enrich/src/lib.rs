pub mod classifier;
pub mod context;
pub mod error;
pub mod extractor;
pub mod pipeline;
pub mod taxonomy;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use classifier::{ArticleFields, KeywordClassifier, TopicClassifier, TopicRule};
pub use context::EnrichmentContext;
pub use error::{EnrichError, ExtractionError};
pub use extractor::{
    builtin_patterns, load_patterns, EntityExtractor, EntityPattern, GazetteerExtractor,
    HttpEntityExtractor, RawMention,
};
pub use pipeline::{ArticleOutcome, EnrichStats, Pipeline};
pub use taxonomy::guess_custom_label;
