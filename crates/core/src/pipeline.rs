use crate::record::{is_empty_value, result_items};
use crate::traits::{DocumentStore, FeedSource};
use crate::{
    CollectionName, FeedResponse, IngestError, IngestOptions, IngestionResult, PipelineSettings,
    Predicate, QueryParams, RecordFilter,
};
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Fetch, filter, dedup and persist one endpoint's results. Holds no state
/// between calls; the store's uniqueness constraint is the final word on
/// duplicates.
pub struct IngestionPipeline<F, S>
where
    F: FeedSource,
    S: DocumentStore,
{
    feed: F,
    store: S,
    settings: PipelineSettings,
}

impl<F, S> IngestionPipeline<F, S>
where
    F: FeedSource + Send + Sync,
    S: DocumentStore + Send + Sync,
{
    pub fn new(feed: F, store: S) -> Self {
        Self {
            feed,
            store,
            settings: PipelineSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: PipelineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn ingest(
        &self,
        endpoint: &str,
        options: &IngestOptions,
    ) -> Result<IngestionResult, IngestError> {
        let predicate = options.predicate()?;
        let query = QueryParams::normalized(&options.query)?;

        let raw = match self.feed.fetch(endpoint, &query).await? {
            FeedResponse::ErrorPayload(payload) => {
                warn!(endpoint, "feed returned an error payload");
                return Ok(IngestionResult::unsaved(payload));
            }
            FeedResponse::Records(raw) => raw,
        };

        if is_empty_value(&raw) {
            info!(endpoint, "feed returned no records");
            return Ok(IngestionResult::unsaved(Value::Array(Vec::new())));
        }

        let collection = CollectionName::from_endpoint(endpoint);
        let admitted = self.admit(&raw, &predicate);
        let fresh = self.unseen(&collection, admitted).await?;

        let mut result = IngestionResult::unsaved(Value::Null);
        let mut inserted = 0;
        if !fresh.is_empty() {
            self.store
                .ensure_collection(&collection, &self.settings.id_field)
                .await?;
            let outcome = self
                .store
                .insert_batch(&collection, &self.settings.id_field, &fresh)
                .await?;

            if !outcome.duplicates.is_empty() {
                warn!(
                    %collection,
                    duplicates = outcome.duplicates.len(),
                    "store rejected already-present records"
                );
            }

            inserted = outcome.inserted;
            let rejected: HashSet<&str> = outcome.duplicates.iter().map(String::as_str).collect();
            result.duplicates = outcome.duplicates.len();
            result.saved = fresh
                .into_iter()
                .filter(|record| {
                    self.settings
                        .identity_key(record)
                        .is_some_and(|key| !rejected.contains(key.as_str()))
                })
                .collect();
        }

        info!(
            endpoint,
            %collection,
            read = result_items(&raw).len(),
            inserted,
            saved = result.saved.len(),
            "ingestion finished"
        );

        result.read = raw;
        Ok(result)
    }

    /// Stored records of `endpoint` matching `filter`; `Some(1)` is find-one.
    pub async fn read(
        &self,
        endpoint: &str,
        filter: &RecordFilter,
        limit: Option<usize>,
    ) -> Result<Vec<Value>, IngestError> {
        let collection = CollectionName::from_endpoint(endpoint);
        Ok(self.store.find(&collection, filter, limit).await?)
    }

    fn admit<'a>(&self, raw: &'a Value, predicate: &Predicate) -> Vec<&'a Value> {
        result_items(raw)
            .into_iter()
            .filter(|record| {
                let admitted = self.settings.is_persistable(record) && predicate.matches(record);
                if !admitted {
                    debug!(id = ?self.settings.identity_key(record), "record not admitted");
                }
                admitted
            })
            .collect()
    }

    /// Admitted records not yet in the store, in fetch order. A repeated
    /// identifier within one fetch keeps its first occurrence.
    async fn unseen(
        &self,
        collection: &CollectionName,
        admitted: Vec<&Value>,
    ) -> Result<Vec<Value>, IngestError> {
        let mut fresh = Vec::new();
        let mut batch_keys = HashSet::new();

        for record in admitted {
            let (Some(id), Some(key)) = (
                self.settings.id_field.lookup(record),
                self.settings.identity_key(record),
            ) else {
                continue;
            };
            if !batch_keys.insert(key) {
                continue;
            }

            let filter = RecordFilter::field_equals(self.settings.id_field.clone(), id.clone());
            if self.store.exists(collection, &filter).await? {
                debug!(%collection, id = %id, "record already stored");
                continue;
            }
            fresh.push(record.clone());
        }
        Ok(fresh)
    }
}
