use crate::traits::DocumentStore;
use crate::{CollectionName, FieldPath, InsertOutcome, RecordFilter, StoreError};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;

use super::identity_of;

/// In-process document store. Each collection enforces uniqueness on the
/// identifier field it was written with.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<CollectionName, MemoryCollection>>,
}

#[derive(Debug, Default)]
struct MemoryCollection {
    records: Vec<Value>,
    keys: HashSet<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self, collection: &CollectionName) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map_or(0, |stored| stored.records.len())
    }

    pub async fn records(&self, collection: &CollectionName) -> Vec<Value> {
        self.collections
            .read()
            .await
            .get(collection)
            .map(|stored| stored.records.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn ensure_collection(
        &self,
        collection: &CollectionName,
        _id_field: &FieldPath,
    ) -> Result<(), StoreError> {
        self.collections
            .write()
            .await
            .entry(collection.clone())
            .or_default();
        Ok(())
    }

    async fn exists(
        &self,
        collection: &CollectionName,
        filter: &RecordFilter,
    ) -> Result<bool, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .is_some_and(|stored| stored.records.iter().any(|record| filter.matches(record))))
    }

    async fn insert_batch(
        &self,
        collection: &CollectionName,
        id_field: &FieldPath,
        records: &[Value],
    ) -> Result<InsertOutcome, StoreError> {
        let keys = records
            .iter()
            .map(|record| identity_of(record, id_field))
            .collect::<Result<Vec<_>, _>>()?;

        let mut collections = self.collections.write().await;
        let stored = collections.entry(collection.clone()).or_default();
        let mut outcome = InsertOutcome::default();

        for (record, key) in records.iter().zip(keys) {
            if stored.keys.contains(&key) {
                outcome.duplicates.push(key);
                continue;
            }
            stored.keys.insert(key);
            stored.records.push(record.clone());
            outcome.inserted += 1;
        }

        Ok(outcome)
    }

    async fn find(
        &self,
        collection: &CollectionName,
        filter: &RecordFilter,
        limit: Option<usize>,
    ) -> Result<Vec<Value>, StoreError> {
        let collections = self.collections.read().await;
        let Some(stored) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        Ok(stored
            .records
            .iter()
            .filter(|record| filter.matches(record))
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }
}
