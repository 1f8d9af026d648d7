use crate::error::IngestError;
use crate::keywords::KeywordSet;
use crate::path::FieldPath;
use crate::predicate::Predicate;
use crate::record::{is_empty_value, scalar_text};
use crate::stores::identity_of;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub const DEFAULT_ID_FIELD: &str = "id_str";
pub const DEFAULT_CONTENT_FIELD: &str = "text";

/// Per-call ingestion options. All three default to empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestOptions {
    pub require: Vec<String>,
    pub grep: BTreeMap<String, KeywordSet>,
    pub query: Map<String, Value>,
}

impl IngestOptions {
    /// Validates the shape of a JSON options document before decoding it.
    /// Unknown keys are ignored; `null` stands for the default.
    pub fn from_value(value: &Value) -> Result<Self, IngestError> {
        let fields = value.as_object().ok_or_else(|| {
            IngestError::Configuration("ingest options must be a mapping".to_string())
        })?;

        expect_shape(fields, "require", Value::is_array, "a sequence of paths")?;
        expect_shape(fields, "grep", Value::is_object, "a mapping of path to keywords")?;
        expect_shape(fields, "query", Value::is_object, "a mapping of parameters")?;

        let known = ["require", "grep", "query"]
            .into_iter()
            .filter_map(|key| {
                fields
                    .get(key)
                    .filter(|value| !value.is_null())
                    .map(|value| (key.to_string(), value.clone()))
            })
            .collect::<Map<_, _>>();

        serde_json::from_value(Value::Object(known))
            .map_err(|error| IngestError::Configuration(error.to_string()))
    }

    pub fn predicate(&self) -> Result<Predicate, IngestError> {
        Predicate::new(&self.require, &self.grep)
    }
}

fn expect_shape(
    fields: &Map<String, Value>,
    key: &str,
    is_valid: fn(&Value) -> bool,
    expected: &str,
) -> Result<(), IngestError> {
    match fields.get(key) {
        Some(value) if !value.is_null() && !is_valid(value) => Err(IngestError::Configuration(
            format!("option `{key}` must be {expected}, got {value}"),
        )),
        _ => Ok(()),
    }
}

/// Query-string parameters with empty values already dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams(Vec<(String, String)>);

impl QueryParams {
    pub fn normalized(query: &Map<String, Value>) -> Result<Self, IngestError> {
        let mut pairs = Vec::new();
        for (key, value) in query {
            if is_empty_value(value) {
                continue;
            }
            let text = scalar_text(value).ok_or_else(|| {
                IngestError::Configuration(format!("query parameter `{key}` must be a scalar"))
            })?;
            pairs.push((key.clone(), text));
        }
        Ok(Self(pairs))
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// What the feed collaborator hands back. An error payload is valid API
/// output and travels to the caller untouched.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedResponse {
    Records(Value),
    ErrorPayload(Value),
}

impl FeedResponse {
    pub fn classify(raw: Value) -> Self {
        if is_error_payload(&raw) {
            Self::ErrorPayload(raw)
        } else {
            Self::Records(raw)
        }
    }
}

pub fn is_error_payload(raw: &Value) -> bool {
    raw.as_object()
        .is_some_and(|fields| fields.contains_key("errors"))
}

/// Exact-match conditions on record fields, case-sensitive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordFilter {
    conditions: Vec<(FieldPath, Value)>,
}

impl RecordFilter {
    pub fn field_equals(path: FieldPath, value: Value) -> Self {
        Self::default().and(path, value)
    }

    pub fn and(mut self, path: FieldPath, value: Value) -> Self {
        self.conditions.push((path, value));
        self
    }

    /// Builds a filter from a mapping of path to scalar value.
    pub fn from_value(value: &Value) -> Result<Self, IngestError> {
        let fields = value.as_object().ok_or_else(|| {
            IngestError::Configuration("filter must be a mapping".to_string())
        })?;

        let mut filter = Self::default();
        for (raw, expected) in fields {
            if expected.is_array() || expected.is_object() {
                return Err(IngestError::Configuration(format!(
                    "filter value for `{raw}` must be a scalar"
                )));
            }
            filter = filter.and(FieldPath::parse(raw)?, expected.clone());
        }
        Ok(filter)
    }

    pub fn conditions(&self) -> &[(FieldPath, Value)] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn matches(&self, record: &Value) -> bool {
        self.conditions
            .iter()
            .all(|(path, expected)| path.get(record) == Some(expected))
    }
}

/// Which fields identify a record and carry its content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    pub id_field: FieldPath,
    pub content_field: FieldPath,
}

impl PipelineSettings {
    pub fn new(id_field: &str, content_field: &str) -> Result<Self, IngestError> {
        Ok(Self {
            id_field: FieldPath::parse(id_field)?,
            content_field: FieldPath::parse(content_field)?,
        })
    }

    /// Identifier in the textual form used as the store key.
    pub fn identity_key(&self, record: &Value) -> Option<String> {
        identity_of(record, &self.id_field).ok()
    }

    pub fn is_persistable(&self, record: &Value) -> bool {
        self.identity_key(record).is_some() && self.content_field.resolves(record, None)
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            id_field: FieldPath::from_static(DEFAULT_ID_FIELD),
            content_field: FieldPath::from_static(DEFAULT_CONTENT_FIELD),
        }
    }
}

/// Outcome of a batch insert. Identifiers the store refused as duplicates
/// are listed, everything else in the batch was written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InsertOutcome {
    pub inserted: usize,
    pub duplicates: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestionResult {
    pub saved: Vec<Value>,
    pub read: Value,
    pub duplicates: usize,
    pub completed_at: DateTime<Utc>,
}

impl IngestionResult {
    pub(crate) fn unsaved(read: Value) -> Self {
        Self {
            saved: Vec::new(),
            read,
            duplicates: 0,
            completed_at: Utc::now(),
        }
    }

    pub fn is_upstream_error(&self) -> bool {
        is_error_payload(&self.read)
    }
}
