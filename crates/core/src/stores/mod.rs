pub mod memory;
pub mod opensearch;

pub use memory::MemoryStore;
pub use opensearch::OpenSearchStore;

use crate::record::scalar_text;
use crate::{FieldPath, StoreError};
use serde_json::Value;

/// Store key of a record: the textual form of its identifier.
pub(crate) fn identity_of(record: &Value, id_field: &FieldPath) -> Result<String, StoreError> {
    id_field
        .lookup(record)
        .and_then(scalar_text)
        .ok_or_else(|| StoreError::Request(format!("record has no usable `{id_field}` value")))
}
