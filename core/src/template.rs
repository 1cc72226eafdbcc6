//! Path and query template parsing and rendering.
//!
//! A template such as `/users/{id}?active={active}&v=2` is split once, at
//! registration, on its first `?`. The path half keeps its `{name}`
//! placeholders for rendering at call time. The query half becomes an
//! ordered list of pairs: a value written exactly as `{identifier}` binds a
//! call argument, anything else is a literal sent on every call.

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use serde_json::Value;

use crate::error::TemplateError;

/// Bytes escaped in a rendered path value so it stays one path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// One `key=value` pair of a template's query string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryPart {
    Static { key: String, value: String },
    Dynamic { key: String, param: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    raw: String,
    path: String,
    placeholders: Vec<String>,
    query: Vec<QueryPart>,
}

impl PathTemplate {
    pub fn parse(template: &str) -> Self {
        let (path, query) = match template.split_once('?') {
            Some((path, query)) => (path, query),
            None => (template, ""),
        };

        let mut placeholders = Vec::new();
        for segment in Segments::new(path) {
            if let Segment::Placeholder(name) = segment {
                if !placeholders.iter().any(|p| p == name) {
                    placeholders.push(name.to_string());
                }
            }
        }

        let query = query
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| {
                let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
                match placeholder_name(value) {
                    Some(param) => QueryPart::Dynamic {
                        key: key.to_string(),
                        param: param.to_string(),
                    },
                    None => QueryPart::Static {
                        key: key.to_string(),
                        value: value.to_string(),
                    },
                }
            })
            .collect();

        Self {
            raw: template.to_string(),
            path: path.to_string(),
            placeholders,
            query,
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The path half, placeholders intact.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Placeholder names of the path half, in order of first appearance.
    pub fn placeholders(&self) -> &[String] {
        &self.placeholders
    }

    pub fn query_parts(&self) -> &[QueryPart] {
        &self.query
    }

    pub fn static_query_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.query.iter().filter_map(|part| match part {
            QueryPart::Static { key, value } => Some((key.as_str(), value.as_str())),
            QueryPart::Dynamic { .. } => None,
        })
    }

    /// `(query key, parameter name)` pairs.
    pub fn dynamic_query_bindings(&self) -> impl Iterator<Item = (&str, &str)> {
        self.query.iter().filter_map(|part| match part {
            QueryPart::Dynamic { key, param } => Some((key.as_str(), param.as_str())),
            QueryPart::Static { .. } => None,
        })
    }

    /// Substitute every path placeholder with its bound value, percent-encoded
    /// as a single path segment.
    ///
    /// A placeholder whose value is absent or null fails with
    /// `TemplateError::MissingPathParameter`; braces are never left in the
    /// rendered path.
    pub fn render<'v, F>(&self, lookup: F) -> Result<String, TemplateError>
    where
        F: Fn(&str) -> Option<&'v Value>,
    {
        let mut rendered = String::with_capacity(self.path.len());
        for segment in Segments::new(&self.path) {
            match segment {
                Segment::Literal(text) => rendered.push_str(text),
                Segment::Placeholder(name) => match lookup(name) {
                    Some(value) if !value.is_null() => {
                        let text = value_to_string(value);
                        rendered.extend(utf8_percent_encode(&text, PATH_SEGMENT));
                    }
                    _ => {
                        return Err(TemplateError::MissingPathParameter {
                            name: name.to_string(),
                            template: self.raw.clone(),
                        })
                    }
                },
            }
        }
        Ok(rendered)
    }
}

/// Text form of a bound value: strings verbatim, everything else as JSON.
pub(crate) fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// `Some(name)` when `text` is exactly `{identifier}`.
fn placeholder_name(text: &str) -> Option<&str> {
    let name = text.strip_prefix('{')?.strip_suffix('}')?;
    is_identifier(name).then_some(name)
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

enum Segment<'a> {
    Literal(&'a str),
    Placeholder(&'a str),
}

/// Splits a path into literal runs and `{identifier}` placeholders.
/// Braces that do not enclose an identifier stay literal.
struct Segments<'a> {
    rest: &'a str,
}

impl<'a> Segments<'a> {
    fn new(path: &'a str) -> Self {
        Self { rest: path }
    }
}

impl<'a> Iterator for Segments<'a> {
    type Item = Segment<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.rest.is_empty() {
            return None;
        }
        let mut search_from = 0;
        while let Some(open) = self.rest[search_from..].find('{').map(|i| i + search_from) {
            let Some(close) = self.rest[open..].find('}').map(|i| i + open) else {
                break;
            };
            let name = &self.rest[open + 1..close];
            if is_identifier(name) {
                if open > 0 {
                    let literal = &self.rest[..open];
                    self.rest = &self.rest[open..];
                    return Some(Segment::Literal(literal));
                }
                self.rest = &self.rest[close + 1..];
                return Some(Segment::Placeholder(name));
            }
            search_from = open + 1;
        }
        let literal = self.rest;
        self.rest = "";
        Some(Segment::Literal(literal))
    }
}
