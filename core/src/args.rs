//! Call-time arguments.
//!
//! `Args` is the name → value mapping a caller hands to a declared
//! endpoint. Plain values feed path placeholders, query bindings or
//! leftovers; `Arg::Model` marks a structured payload (a body candidate);
//! the reserved `request_headers` entry is a side channel that never takes
//! part in classification.

use serde_json::Value;

use crate::cast::Model;
use crate::error::ValidationError;

/// Reserved argument name carrying per-call headers.
pub const REQUEST_HEADERS: &str = "request_headers";

#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Value(Value),
    /// A serialized `Model`, always a JSON object.
    Model(Value),
    Headers(Vec<(String, String)>),
}

impl Arg {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Arg::Value(value) | Arg::Model(value) => Some(value),
            Arg::Headers(_) => None,
        }
    }

    pub fn is_model(&self) -> bool {
        matches!(self, Arg::Model(_))
    }
}

/// Bound call arguments, in insertion order. Setting a name twice keeps
/// the latest value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    entries: Vec<(String, Arg)>,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a plain value. `None` binds JSON null.
    pub fn arg(self, name: &str, value: impl Into<Value>) -> Self {
        self.with(name, Arg::Value(value.into()))
    }

    /// Bind a structured payload.
    pub fn model<M: Model>(self, name: &str, model: &M) -> Result<Self, ValidationError> {
        let value = serde_json::to_value(model).map_err(|source| ValidationError::ModelSerialize {
            param: name.to_string(),
            source,
        })?;
        if !value.is_object() {
            return Err(ValidationError::ModelNotObject {
                param: name.to_string(),
            });
        }
        Ok(self.with(name, Arg::Model(value)))
    }

    /// Attach per-call headers through the reserved `request_headers` name.
    pub fn headers<I, K, V>(self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let headers = headers
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.with(REQUEST_HEADERS, Arg::Headers(headers))
    }

    pub fn get(&self, name: &str) -> Option<&Arg> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, arg)| arg)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn into_entries(self) -> Vec<(String, Arg)> {
        self.entries
    }

    fn with(mut self, name: &str, arg: Arg) -> Self {
        match self.entries.iter_mut().find(|(key, _)| key == name) {
            Some(slot) => slot.1 = arg,
            None => self.entries.push((name.to_string(), arg)),
        }
        self
    }
}
