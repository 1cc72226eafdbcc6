//! Response casting.
//!
//! # Overview
//! Turns the raw bytes of a response (live or mocked) into the return type
//! an endpoint declared. The declared type is reduced once, at
//! registration, to a closed `ResponseKind`; `decode` then applies the
//! rules in a fixed order:
//!
//! 1. `Bytes`: the raw body, untouched.
//! 2. `Text`: the body as UTF-8 text, never parsed as JSON.
//! 3. Everything else is parsed as JSON, then narrowed by the extraction
//!    path when one is declared. A path that does not resolve yields
//!    `Payload::Missing`, which the return type maps to `None`/`null`.
//! 4. `Model` / `ListOfModel` validate the JSON through serde;
//!    `Any` returns it as is.
//!
//! Casting is pure: the same bytes and descriptor always give the same
//! value, which is what lets mocked and live calls share it.

use std::any::type_name;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::CastError;

/// Return-type classification, decided once per endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    Bytes,
    Text,
    Model { name: &'static str },
    ListOfModel { element: &'static str },
    Any,
}

impl ResponseKind {
    pub fn model<M: Model>() -> Self {
        ResponseKind::Model {
            name: type_name::<M>(),
        }
    }

    pub fn list_of<M: Model>() -> Self {
        ResponseKind::ListOfModel {
            element: type_name::<M>(),
        }
    }
}

/// Decoded response, before conversion to the declared type.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Raw(Bytes),
    Text(String),
    Json(Value),
    /// The extraction path did not resolve.
    Missing,
}

impl Payload {
    fn describe(&self) -> &'static str {
        match self {
            Payload::Raw(_) => "raw bytes",
            Payload::Text(_) => "text",
            Payload::Json(_) => "JSON",
            Payload::Missing => "missing",
        }
    }

    fn shape_error(self, expected: &'static str) -> CastError {
        CastError::Shape {
            expected,
            found: self.describe(),
        }
    }
}

/// A structured payload type: serialized as a request body when passed as
/// an argument, validated when declared as a return type.
///
/// Implement it with the [`model!`](crate::model) macro, which also wires
/// the type into [`FromResponse`].
pub trait Model: Serialize + DeserializeOwned {}

/// A type an endpoint may declare as its return type.
pub trait FromResponse: Sized {
    fn kind() -> ResponseKind;

    fn from_payload(payload: Payload) -> Result<Self, CastError>;
}

/// Return types that can express an extraction miss.
pub trait Extractable: FromResponse {}

/// Declare structured model types.
///
/// ```ignore
/// #[derive(Serialize, Deserialize)]
/// struct User { id: String }
///
/// restbind_core::model!(User);
/// ```
#[macro_export]
macro_rules! model {
    ($($ty:ty),+ $(,)?) => {$(
        impl $crate::Model for $ty {}

        impl $crate::FromResponse for $ty {
            fn kind() -> $crate::ResponseKind {
                $crate::ResponseKind::model::<$ty>()
            }

            fn from_payload(payload: $crate::Payload) -> ::std::result::Result<Self, $crate::CastError> {
                $crate::cast::validate_model(payload)
            }
        }
    )+};
}

/// Validate a JSON payload against a model type.
pub fn validate_model<M: Model>(payload: Payload) -> Result<M, CastError> {
    match payload {
        Payload::Json(value) => serde_json::from_value(value).map_err(|source| CastError::Validation {
            model: type_name::<M>(),
            source,
        }),
        other => Err(other.shape_error("JSON")),
    }
}

impl FromResponse for Bytes {
    fn kind() -> ResponseKind {
        ResponseKind::Bytes
    }

    fn from_payload(payload: Payload) -> Result<Self, CastError> {
        match payload {
            Payload::Raw(bytes) => Ok(bytes),
            other => Err(other.shape_error("raw bytes")),
        }
    }
}

impl FromResponse for String {
    fn kind() -> ResponseKind {
        ResponseKind::Text
    }

    fn from_payload(payload: Payload) -> Result<Self, CastError> {
        match payload {
            Payload::Text(text) => Ok(text),
            other => Err(other.shape_error("text")),
        }
    }
}

impl FromResponse for Value {
    fn kind() -> ResponseKind {
        ResponseKind::Any
    }

    fn from_payload(payload: Payload) -> Result<Self, CastError> {
        match payload {
            Payload::Json(value) => Ok(value),
            Payload::Missing => Ok(Value::Null),
            other => Err(other.shape_error("JSON")),
        }
    }
}

impl Extractable for Value {}

impl<M: Model> FromResponse for Vec<M> {
    fn kind() -> ResponseKind {
        ResponseKind::list_of::<M>()
    }

    fn from_payload(payload: Payload) -> Result<Self, CastError> {
        match payload {
            Payload::Json(value) => serde_json::from_value(value).map_err(|source| CastError::Validation {
                model: type_name::<Vec<M>>(),
                source,
            }),
            other => Err(other.shape_error("JSON sequence")),
        }
    }
}

impl<R: FromResponse> FromResponse for Option<R> {
    fn kind() -> ResponseKind {
        R::kind()
    }

    fn from_payload(payload: Payload) -> Result<Self, CastError> {
        match payload {
            Payload::Missing | Payload::Json(Value::Null) => Ok(None),
            other => R::from_payload(other).map(Some),
        }
    }
}

impl<R: FromResponse> Extractable for Option<R> {}

/// A compiled extraction path such as `$.data.users[0]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractPath {
    raw: String,
    steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    Key(String),
    Index(usize),
}

impl ExtractPath {
    /// Dots separate mapping keys, `[n]` indexes a sequence, and a leading
    /// `$` / `$.` is ignored. Bracket contents that are not integers are
    /// read as keys; a quoted bracket key (`['a.b']`) may contain dots and
    /// brackets.
    pub fn parse(path: &str) -> Self {
        let trimmed = path.trim();
        let body = trimmed
            .strip_prefix("$.")
            .or_else(|| trimmed.strip_prefix('$'))
            .unwrap_or(trimmed);

        let mut steps = Vec::new();
        let mut rest = body;
        while let Some(c) = rest.chars().next() {
            match c {
                '.' => rest = &rest[1..],
                '[' => {
                    let inner = &rest[1..];
                    let Some(close) = closing_bracket(inner) else {
                        steps.push(Step::Key(rest.to_string()));
                        break;
                    };
                    let token = &inner[..close];
                    match token.parse::<usize>() {
                        Ok(index) => steps.push(Step::Index(index)),
                        Err(_) => steps.push(Step::Key(token.trim_matches(|c| c == '"' || c == '\'').to_string())),
                    }
                    rest = &inner[close + 1..];
                }
                _ => {
                    let end = rest.find(['.', '[']).unwrap_or(rest.len());
                    steps.push(Step::Key(rest[..end].to_string()));
                    rest = &rest[end..];
                }
            }
        }

        Self {
            raw: path.to_string(),
            steps,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Walk the path; `None` when any step is absent or out of range.
    pub fn resolve<'a>(&self, value: &'a Value) -> Option<&'a Value> {
        self.steps.iter().try_fold(value, |current, step| match step {
            Step::Key(key) => current.as_object()?.get(key),
            Step::Index(index) => current.as_array()?.get(*index),
        })
    }
}

/// Offset of the `]` closing a bracket whose contents start `inner`,
/// skipping over a quoted key.
fn closing_bracket(inner: &str) -> Option<usize> {
    match inner.chars().next() {
        Some(quote @ ('\'' | '"')) => {
            let end = inner[1..].find(quote)? + 2;
            inner[end..].find(']').map(|i| i + end)
        }
        _ => inner.find(']'),
    }
}

/// Apply the casting rules up to the point where the declared type takes
/// over.
///
/// An empty `204 No Content` body decodes as JSON null.
pub fn decode(
    raw: &Bytes,
    status: u16,
    kind: ResponseKind,
    extract: Option<&ExtractPath>,
) -> Result<Payload, CastError> {
    match kind {
        ResponseKind::Bytes => return Ok(Payload::Raw(raw.clone())),
        ResponseKind::Text => return Ok(Payload::Text(String::from_utf8_lossy(raw).into_owned())),
        ResponseKind::ListOfModel { element } if element.contains('<') => {
            return Err(CastError::NestedElementType { element });
        }
        _ => {}
    }

    let value: Value = if status == 204 && raw.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(raw)?
    };

    match extract {
        Some(path) => Ok(path
            .resolve(&value)
            .map_or(Payload::Missing, |found| Payload::Json(found.clone()))),
        None => Ok(Payload::Json(value)),
    }
}

/// Cast raw response bytes into `R`.
pub fn cast<R: FromResponse>(
    raw: &Bytes,
    status: u16,
    kind: ResponseKind,
    extract: Option<&ExtractPath>,
) -> Result<R, CastError> {
    R::from_payload(decode(raw, status, kind, extract)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct User {
        name: String,
        age: u32,
        #[serde(default)]
        email: Option<String>,
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Page<T> {
        items: Vec<T>,
    }

    crate::model!(User, Page<User>);

    fn bytes(value: Value) -> Bytes {
        Bytes::from(serde_json::to_vec(&value).unwrap())
    }

    fn cast_as<R: FromResponse>(raw: &Bytes, extract: Option<&str>) -> Result<R, CastError> {
        let path = extract.map(ExtractPath::parse);
        cast::<R>(raw, 200, R::kind(), path.as_ref())
    }

    #[test]
    fn bytes_are_returned_untouched() {
        let raw = Bytes::from_static(b"\xff\x00raw");
        let out: Bytes = cast_as(&raw, None).unwrap();
        assert_eq!(out, raw);
    }

    #[test]
    fn text_is_never_parsed_as_json() {
        let raw = Bytes::from_static(br#"["trash", "data"]"#);
        let out: String = cast_as(&raw, None).unwrap();
        assert_eq!(out, r#"["trash", "data"]"#);
    }

    #[test]
    fn invalid_utf8_text_is_decoded_lossily() {
        let raw = Bytes::from_static(b"ok\xff");
        let out: String = cast_as(&raw, None).unwrap();
        assert!(out.starts_with("ok"));
    }

    #[test]
    fn model_round_trips() {
        let user = User { name: "test1".into(), age: 30, email: Some("t@example.com".into()) };
        let out: User = cast_as(&bytes(serde_json::to_value(&user).unwrap()), None).unwrap();
        assert_eq!(out, user);
    }

    #[test]
    fn model_mismatch_is_a_validation_error() {
        let err = cast_as::<User>(&bytes(json!({"name": "x"})), None).unwrap_err();
        assert!(matches!(err, CastError::Validation { model, .. } if model.ends_with("User")));
    }

    #[test]
    fn non_json_body_is_a_decode_error() {
        let err = cast_as::<Value>(&Bytes::from_static(b"some-bytes-not-list"), None).unwrap_err();
        assert!(matches!(err, CastError::Decode(_)));
    }

    #[test]
    fn any_returns_the_decoded_value() {
        let out: Value = cast_as(&bytes(json!(["a", 0, 1])), None).unwrap();
        assert_eq!(out, json!(["a", 0, 1]));
    }

    #[test]
    fn list_of_models_from_extraction() {
        let raw = bytes(json!({"data": {"users": [{"name": "a", "age": 1}, {"name": "b", "age": 2}]}}));
        let users: Option<Vec<User>> = cast_as(&raw, Some("$.data.users")).unwrap();
        let users = users.unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users[1].name, "b");
        assert_eq!(users[1].email, None);
    }

    #[test]
    fn list_of_models_rejects_a_mapping() {
        let raw = bytes(json!({"users": {"trash": "object"}, "total": 2}));
        let err = cast_as::<Vec<User>>(&raw, None).unwrap_err();
        assert!(matches!(err, CastError::Validation { .. }));
    }

    #[test]
    fn nested_generic_element_is_rejected() {
        let raw = bytes(json!([{"items": []}]));
        let err = cast_as::<Vec<Page<User>>>(&raw, None).unwrap_err();
        assert!(matches!(err, CastError::NestedElementType { element } if element.contains("Page<")));
    }

    #[test]
    fn generic_model_itself_is_allowed() {
        let raw = bytes(json!({"items": [{"name": "a", "age": 1}]}));
        let page: Page<User> = cast_as(&raw, None).unwrap();
        assert_eq!(page.items.len(), 1);
    }

    #[test]
    fn extraction_miss_is_soft() {
        let raw = bytes(json!({"status": "error", "message": "No data available"}));
        let users: Option<Vec<User>> = cast_as(&raw, Some("$.data.users")).unwrap();
        assert!(users.is_none());

        let any: Value = cast_as(&raw, Some("$.data.users[3]")).unwrap();
        assert_eq!(any, Value::Null);
    }

    #[test]
    fn extraction_index_out_of_range_is_soft() {
        let raw = bytes(json!({"data": {"users": []}}));
        let first: Option<User> = cast_as(&raw, Some("$.data.users[0]")).unwrap();
        assert!(first.is_none());
    }

    #[test]
    fn extraction_with_index_and_without_dollar() {
        let raw = bytes(json!({"data": {"users": [{"name": "Frank", "age": 5}]}}));
        let first: Option<User> = cast_as(&raw, Some("$.data.users[0]")).unwrap();
        assert_eq!(first.unwrap().name, "Frank");

        let deep = bytes(json!({"data": {"result": {"user": {"name": "Eve", "age": 3}}}}));
        let user: Option<User> = cast_as(&deep, Some("data.result.user")).unwrap();
        assert_eq!(user.unwrap().name, "Eve");
    }

    #[test]
    fn extraction_path_parsing() {
        let path = ExtractPath::parse("$.a[1][0].b['c']");
        assert_eq!(
            path.steps,
            vec![
                Step::Key("a".into()),
                Step::Index(1),
                Step::Index(0),
                Step::Key("b".into()),
                Step::Key("c".into()),
            ]
        );
        assert!(ExtractPath::parse("$").steps.is_empty());
    }

    #[test]
    fn quoted_bracket_key_keeps_its_dots() {
        let path = ExtractPath::parse("$['a.b'].c[\"x[0]\"]");
        assert_eq!(
            path.steps,
            vec![Step::Key("a.b".into()), Step::Key("c".into()), Step::Key("x[0]".into())]
        );
        let value = json!({"a.b": {"c": {"x[0]": 5}}, "a": {"b": 1}});
        assert_eq!(path.resolve(&value), Some(&json!(5)));
    }

    #[test]
    fn no_content_decodes_as_null() {
        let out: Value = cast::<Value>(&Bytes::new(), 204, ResponseKind::Any, None).unwrap();
        assert_eq!(out, Value::Null);
    }

    #[test]
    fn casting_is_repeatable() {
        let raw = bytes(json!({"name": "same", "age": 9}));
        let first: User = cast_as(&raw, None).unwrap();
        let second: User = cast_as(&raw, None).unwrap();
        assert_eq!(first, second);
    }
}
