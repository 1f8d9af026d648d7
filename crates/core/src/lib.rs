pub mod collection;
pub mod error;
pub mod feed;
pub mod keywords;
pub mod models;
pub mod path;
pub mod pipeline;
pub mod predicate;
pub mod record;
pub mod stores;
pub mod traits;

pub use collection::{normalize_endpoint, CollectionName};
pub use error::{IngestError, StoreError};
pub use feed::{HttpFeedClient, DEFAULT_FEED_URL};
pub use keywords::{build_keyword_pattern, KeywordSet};
pub use models::{
    FeedResponse, IngestOptions, IngestionResult, InsertOutcome, PipelineSettings, QueryParams,
    RecordFilter, DEFAULT_CONTENT_FIELD, DEFAULT_ID_FIELD,
};
pub use path::{has_path, FieldPath};
pub use pipeline::IngestionPipeline;
pub use predicate::Predicate;
pub use record::{is_empty_value, Record};
pub use stores::{MemoryStore, OpenSearchStore};
pub use traits::{DocumentStore, FeedSource};
