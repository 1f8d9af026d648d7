use crate::{
    CollectionName, FeedResponse, FieldPath, IngestError, InsertOutcome, QueryParams,
    RecordFilter, StoreError,
};
use async_trait::async_trait;
use serde_json::Value;

#[async_trait]
pub trait FeedSource {
    /// GET-style read of one endpoint. Error bodies come back as
    /// `FeedResponse::ErrorPayload`, not as `Err`.
    async fn fetch(&self, endpoint: &str, query: &QueryParams) -> Result<FeedResponse, IngestError>;
}

#[async_trait]
pub trait DocumentStore {
    /// Prepares the collection and a uniqueness constraint on `id_field`.
    async fn ensure_collection(
        &self,
        collection: &CollectionName,
        id_field: &FieldPath,
    ) -> Result<(), StoreError>;

    async fn exists(
        &self,
        collection: &CollectionName,
        filter: &RecordFilter,
    ) -> Result<bool, StoreError>;

    /// Writes the batch. Duplicate-key rejections are reported in the
    /// outcome while the rest of the batch is still committed.
    async fn insert_batch(
        &self,
        collection: &CollectionName,
        id_field: &FieldPath,
        records: &[Value],
    ) -> Result<InsertOutcome, StoreError>;

    async fn find(
        &self,
        collection: &CollectionName,
        filter: &RecordFilter,
        limit: Option<usize>,
    ) -> Result<Vec<Value>, StoreError>;
}
