pub mod annotations;
pub mod error;
pub mod models;
mod schema;
mod store;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use annotations::{
    char_len, char_slice, entity_context, find_occurrences, highlight_segments, EntityFilter,
    Segment, TrainingExample, TrainingSpan,
};
pub use error::{Result, StoreError};
pub use models::{Article, EntityMention, EntityRow, NewArticle, NewMention, SpanAnnotation, TopicLabel};
pub use store::ArticleStore;
