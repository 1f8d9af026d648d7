use serde::{Deserialize, Serialize};
use std::fmt;

const ENDPOINT_DELIMITER: char = '/';
const COLLECTION_SEPARATOR: &str = "-";

/// Store collection holding the records of one feed endpoint.
///
/// `statuses/user_timeline`, `///statuses//user_timeline/` and friends all
/// normalize to `statuses-user_timeline`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollectionName(String);

impl CollectionName {
    pub fn from_endpoint(endpoint: &str) -> Self {
        Self(normalize_endpoint(endpoint))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CollectionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CollectionName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Trims boundary delimiters and collapses internal delimiter runs.
pub fn normalize_endpoint(endpoint: &str) -> String {
    endpoint
        .split(ENDPOINT_DELIMITER)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(COLLECTION_SEPARATOR)
}

/// Endpoint with boundary delimiters trimmed and runs collapsed, still `/`-joined.
pub fn clean_endpoint(endpoint: &str) -> String {
    endpoint
        .split(ENDPOINT_DELIMITER)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}
