use crate::traits::DocumentStore;
use crate::{CollectionName, FieldPath, InsertOutcome, RecordFilter, StoreError};
use async_trait::async_trait;
use reqwest::Client;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::sync::Arc;

use super::identity_of;

const BACKEND: &str = "opensearch";
const MAX_RESULT_WINDOW: usize = 10_000;
const MAX_INDEX_NAME_BYTES: usize = 255;
const INDEX_NAME_FORBIDDEN: [char; 12] = ['\\', '/', '*', '?', '"', '<', '>', '|', ' ', ',', '#', ':'];

/// Document store over the OpenSearch REST API. One index per collection,
/// with the record identifier used as the document `_id` so the index itself
/// rejects duplicates.
pub struct OpenSearchStore {
    client: Arc<Client>,
    endpoint: String,
    index_prefix: String,
}

impl OpenSearchStore {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: Arc::new(Client::new()),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            index_prefix: String::new(),
        }
    }

    pub fn with_index_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.index_prefix = prefix.into();
        self
    }

    /// Prefix plus collection name, never case-folded. Fails when OpenSearch
    /// would refuse the name.
    pub fn index_name(&self, collection: &CollectionName) -> Result<String, StoreError> {
        let name = format!("{}{}", self.index_prefix, collection);
        validate_index_name(&name)?;
        Ok(name)
    }

    fn index_url(&self, collection: &CollectionName) -> Result<String, StoreError> {
        Ok(format!("{}/{}", self.endpoint, self.index_name(collection)?))
    }
}

#[async_trait]
impl DocumentStore for OpenSearchStore {
    async fn ensure_collection(
        &self,
        collection: &CollectionName,
        id_field: &FieldPath,
    ) -> Result<(), StoreError> {
        let index_url = self.index_url(collection)?;
        let response = self.client.head(&index_url).send().await?;

        if response.status() == StatusCode::OK {
            return Ok(());
        }

        if response.status() != StatusCode::NOT_FOUND {
            return Err(backend_error(response.status().to_string()));
        }

        let response = self
            .client
            .put(&index_url)
            .json(&json!({
                "settings": {
                    "number_of_shards": 1,
                    "number_of_replicas": 0
                },
                "mappings": {
                    "properties": {
                        id_field.to_string(): {"type": "keyword"}
                    }
                }
            }))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        // Another writer may have created the index between HEAD and PUT.
        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::BAD_REQUEST && body.contains("resource_already_exists_exception") {
            return Ok(());
        }

        Err(StoreError::Request(format!(
            "index setup for {index_url} failed with {status}: {body}"
        )))
    }

    async fn exists(
        &self,
        collection: &CollectionName,
        filter: &RecordFilter,
    ) -> Result<bool, StoreError> {
        let response = self
            .client
            .post(format!("{}/_count", self.index_url(collection)?))
            .json(&json!({ "query": build_query(filter) }))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }

        if !response.status().is_success() {
            return Err(backend_error(response.status().to_string()));
        }

        let parsed: Value = response.json().await?;
        let count = parsed
            .pointer("/count")
            .and_then(Value::as_u64)
            .ok_or_else(|| backend_error(format!("count missing in {parsed}")))?;

        Ok(count > 0)
    }

    async fn insert_batch(
        &self,
        collection: &CollectionName,
        id_field: &FieldPath,
        records: &[Value],
    ) -> Result<InsertOutcome, StoreError> {
        let index_name = self.index_name(collection)?;
        if records.is_empty() {
            return Ok(InsertOutcome::default());
        }

        let mut keys = Vec::with_capacity(records.len());
        let mut lines = Vec::with_capacity(records.len() * 2);

        for record in records {
            let key = identity_of(record, id_field)?;
            lines.push(serde_json::to_string(&json!({
                "create": {
                    "_index": index_name,
                    "_id": key,
                }
            }))?);
            lines.push(serde_json::to_string(record)?);
            keys.push(key);
        }

        let payload = lines.join("\n") + "\n";

        let response = self
            .client
            .post(format!("{}/_bulk?refresh=wait_for", self.endpoint))
            .header("Content-Type", "application/x-ndjson")
            .body(payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(backend_error(response.status().to_string()));
        }

        let parsed: Value = response.json().await?;
        read_bulk_outcome(&parsed, &keys)
    }

    async fn find(
        &self,
        collection: &CollectionName,
        filter: &RecordFilter,
        limit: Option<usize>,
    ) -> Result<Vec<Value>, StoreError> {
        let response = self
            .client
            .post(format!("{}/_search", self.index_url(collection)?))
            .json(&json!({
                "size": limit.unwrap_or(MAX_RESULT_WINDOW).min(MAX_RESULT_WINDOW),
                "query": build_query(filter),
                "sort": ["_doc"]
            }))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }

        if !response.status().is_success() {
            return Err(backend_error(response.status().to_string()));
        }

        let parsed: Value = response.json().await?;
        let hits = parsed
            .pointer("/hits/hits")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        Ok(hits
            .into_iter()
            .filter_map(|mut hit| hit.get_mut("_source").map(Value::take))
            .collect())
    }
}

fn backend_error(details: String) -> StoreError {
    StoreError::BackendResponse {
        backend: BACKEND.to_string(),
        details,
    }
}

fn validate_index_name(name: &str) -> Result<(), StoreError> {
    let problem = if name.is_empty() || name == "." || name == ".." {
        "is not a usable name"
    } else if name.starts_with(['_', '-', '+']) {
        "starts with `_`, `-` or `+`"
    } else if name.chars().any(char::is_uppercase) {
        "contains uppercase characters"
    } else if name.contains(INDEX_NAME_FORBIDDEN) {
        "contains a character OpenSearch rejects"
    } else if name.len() > MAX_INDEX_NAME_BYTES {
        "is longer than 255 bytes"
    } else {
        return Ok(());
    };

    Err(StoreError::Request(format!("index name {name:?} {problem}")))
}

fn build_query(filter: &RecordFilter) -> Value {
    if filter.is_empty() {
        return json!({ "match_all": {} });
    }

    let terms = filter
        .conditions()
        .iter()
        .map(|(path, value)| json!({ "term": { path.to_string(): value } }))
        .collect::<Vec<_>>();

    json!({ "bool": { "filter": terms } })
}

/// Per-item statuses of a `_bulk` response. 409 conflicts are duplicates;
/// any other failed item fails the call.
fn read_bulk_outcome(parsed: &Value, keys: &[String]) -> Result<InsertOutcome, StoreError> {
    let items = parsed
        .pointer("/items")
        .and_then(Value::as_array)
        .ok_or_else(|| backend_error("bulk response has no items".to_string()))?;

    if items.len() != keys.len() {
        return Err(backend_error(format!(
            "bulk response has {} items for {} records",
            items.len(),
            keys.len()
        )));
    }

    let mut outcome = InsertOutcome::default();
    let mut failures = Vec::new();

    for (item, key) in items.iter().zip(keys) {
        let status = item
            .pointer("/create/status")
            .and_then(Value::as_u64)
            .unwrap_or(0);

        match status {
            200..=299 => outcome.inserted += 1,
            409 => outcome.duplicates.push(key.clone()),
            _ => {
                let reason = item
                    .pointer("/create/error/reason")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown error");
                failures.push(format!("{key}: {status} {reason}"));
            }
        }
    }

    if !failures.is_empty() {
        return Err(backend_error(format!(
            "bulk insert rejected {} record(s): {}",
            failures.len(),
            failures.join("; ")
        )));
    }

    Ok(outcome)
}
