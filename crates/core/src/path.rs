use crate::error::IngestError;
use crate::record::{is_empty_value, scalar_text};
use regex::Regex;
use serde_json::Value;
use std::fmt;

pub const PATH_DELIMITER: char = '.';

/// Dot-separated address into a nested record. Empty segments are dropped on
/// parse, so `"a..b."` and `"a.b"` are the same path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath {
    segments: Vec<String>,
}

impl FieldPath {
    pub fn parse(raw: &str) -> Result<Self, IngestError> {
        let segments = split_segments(raw);
        if segments.is_empty() {
            return Err(IngestError::Configuration(format!(
                "path {raw:?} has no segments"
            )));
        }

        Ok(Self {
            segments: segments.into_iter().map(str::to_string).collect(),
        })
    }

    /// For built-in field names known to have at least one segment.
    pub(crate) fn from_static(raw: &'static str) -> Self {
        Self {
            segments: split_segments(raw).into_iter().map(str::to_string).collect(),
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Raw access, empty values included.
    pub fn get<'a>(&self, record: &'a Value) -> Option<&'a Value> {
        let mut current = record;
        for segment in &self.segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    /// Walks the record and returns the terminal value when every step is a
    /// mapping holding a non-empty value.
    pub fn lookup<'a>(&self, record: &'a Value) -> Option<&'a Value> {
        walk(record, self.segments.iter().map(String::as_str))
    }

    pub fn resolves(&self, record: &Value, pattern: Option<&Regex>) -> bool {
        match self.lookup(record) {
            Some(value) => terminal_matches(value, pattern),
            None => false,
        }
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

/// Total predicate over arbitrary input: true when `path` leads to a
/// non-empty value (matching `pattern` when given). A path with no segments
/// walks nothing and is vacuously true.
pub fn has_path(record: &Value, path: &str, pattern: Option<&Regex>) -> bool {
    let segments = split_segments(path);
    if segments.is_empty() {
        return true;
    }

    match walk(record, segments.into_iter()) {
        Some(value) => terminal_matches(value, pattern),
        None => false,
    }
}

fn split_segments(raw: &str) -> Vec<&str> {
    raw.split(PATH_DELIMITER)
        .filter(|segment| !segment.is_empty())
        .collect()
}

fn walk<'a, 'p>(record: &'a Value, segments: impl Iterator<Item = &'p str>) -> Option<&'a Value> {
    let mut current = record;
    for segment in segments {
        let next = match current {
            Value::Object(fields) => fields.get(segment)?,
            _ => return None,
        };

        if is_empty_value(next) {
            return None;
        }
        current = next;
    }
    Some(current)
}

fn terminal_matches(value: &Value, pattern: Option<&Regex>) -> bool {
    match pattern {
        None => true,
        Some(pattern) => scalar_text(value).is_some_and(|text| pattern.is_match(&text)),
    }
}
