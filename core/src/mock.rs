//! Mock table: canned responses keyed by method name.
//!
//! A mocked call still binds and classifies its arguments, then skips the
//! transport and casts the canned payload with the endpoint's own rules.
//! Configuring mocks replaces the whole table; it is never merged.

use std::collections::HashMap;
use std::path::Path;

use bytes::Bytes;
use serde_json::Value;

use crate::error::MockError;

/// A canned response body.
#[derive(Debug, Clone, PartialEq)]
pub enum MockOutput {
    Bytes(Bytes),
    Json(Value),
}

impl MockOutput {
    /// Normalize to the raw bytes the caster sees: strings become their
    /// UTF-8 bytes, other JSON values are serialized, bytes pass through.
    pub fn to_bytes(&self) -> Bytes {
        match self {
            MockOutput::Bytes(bytes) => bytes.clone(),
            MockOutput::Json(Value::String(text)) => Bytes::from(text.clone()),
            MockOutput::Json(value) => Bytes::from(value.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MockEntry {
    pub name: String,
    pub output: MockOutput,
}

impl MockEntry {
    pub fn json(name: &str, output: impl Into<Value>) -> Self {
        Self {
            name: name.to_string(),
            output: MockOutput::Json(output.into()),
        }
    }

    pub fn bytes(name: &str, output: impl Into<Bytes>) -> Self {
        Self {
            name: name.to_string(),
            output: MockOutput::Bytes(output.into()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MockTable {
    entries: HashMap<String, Bytes>,
}

impl MockTable {
    /// Later entries with the same name win.
    pub fn new(entries: impl IntoIterator<Item = MockEntry>) -> Self {
        let entries = entries
            .into_iter()
            .map(|entry| (entry.name, entry.output.to_bytes()))
            .collect();
        Self { entries }
    }

    /// Load `[{"name": ..., "output": ...}, ...]`.
    ///
    /// Entries missing either key are skipped with a warning.
    pub fn from_value(config: &Value) -> Result<Self, MockError> {
        let Value::Array(items) = config else {
            return Err(MockError::NotAList);
        };
        let mut entries = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            let name = item.get("name").and_then(Value::as_str);
            let output = item.get("output");
            match (name, output) {
                (Some(name), Some(output)) => entries.push(MockEntry::json(name, output.clone())),
                _ => tracing::warn!(index, entry = %item, "skipping mock entry without `name` and `output`"),
            }
        }
        Ok(Self::new(entries))
    }

    pub fn from_json_str(config: &str) -> Result<Self, MockError> {
        let value: Value = serde_json::from_str(config)?;
        Self::from_value(&value)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, MockError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| MockError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn lookup(&self, name: &str) -> Option<Bytes> {
        let found = self.entries.get(name).cloned();
        if found.is_none() {
            tracing::debug!(method = name, "mock data not found, using live transport");
        }
        found
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<Vec<MockEntry>> for MockTable {
    fn from(entries: Vec<MockEntry>) -> Self {
        Self::new(entries)
    }
}
