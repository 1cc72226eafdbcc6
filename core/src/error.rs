//! Error types for the declarative client.
//!
//! # Design
//! Each stage of the call pipeline owns an error enum, so callers can tell
//! their own mistakes (`TemplateError`, `ValidationError`) from payload
//! problems (`CastError`) and from the network (`TransportError`). All of
//! them are raised before or after the exchange, never retried. `Error`
//! wraps every stage for the dispatch entry points.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::config::Backend;
use crate::endpoint::UnknownArgs;
use crate::http::HttpMethod;

/// Path rendering failures.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("path parameter `{name}` has no bound value in template `{template}`")]
    MissingPathParameter { name: String, template: String },
}

/// Caller mistakes detected while binding and classifying arguments.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("cannot bind two structured payloads to one request: `{first}` and `{second}`")]
    MultipleBodies { first: String, second: String },

    #[error("body not allowed for {method} requests (argument `{param}`)")]
    BodyNotAllowed { method: HttpMethod, param: String },

    #[error("unbound arguments {names:?} rejected by the `{policy}` policy; verify path and argument names")]
    UnboundArguments { names: Vec<String>, policy: UnknownArgs },

    #[error("cannot fold arguments {names:?} into a body already filled by `{body}`")]
    BodyConflict { names: Vec<String>, body: String },

    #[error("unexpected argument `{name}`")]
    UnexpectedArgument { name: String },

    #[error("missing required argument `{name}`")]
    MissingArgument { name: String },

    #[error("argument `{param}` must serialize to a JSON object")]
    ModelNotObject { param: String },

    #[error("failed to serialize argument `{param}`: {source}")]
    ModelSerialize {
        param: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("`request_headers` must be a mapping of strings")]
    InvalidHeaders,
}

/// Failures converting a response payload into the declared return type.
#[derive(Debug, Error)]
pub enum CastError {
    #[error("response is not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("response does not match `{model}`: {source}")]
    Validation {
        model: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("collection element type `{element}` has nested generic parameters")]
    NestedElementType { element: &'static str },

    #[error("expected a {expected} payload, found {found}")]
    Shape {
        expected: &'static str,
        found: &'static str,
    },
}

/// Failures reported by a transport adapter, propagated unchanged.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("transport error: {0}")]
    Connection(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("failed to build request: {0}")]
    Request(String),
}

impl TransportError {
    /// Status code of a non-2xx response, if that is what failed.
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Failures loading a mock table.
#[derive(Debug, Error)]
pub enum MockError {
    #[error("mock config must be a list")]
    NotAList,

    #[error("invalid mock config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to read mock file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failures loading or applying a client configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid client config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("base_url must not be empty")]
    EmptyBaseUrl,

    #[error("a {session} session cannot drive the {backend} backend")]
    SessionMismatch { backend: Backend, session: Backend },

    #[error(transparent)]
    Mock(#[from] MockError),
}

/// Any failure of a declared call.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Cast(#[from] CastError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Mock(#[from] MockError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to encode JSON body: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to form-encode request data: {0}")]
    FormEncode(#[from] serde_urlencoded::ser::Error),

    #[error("{0}")]
    Dispatch(&'static str),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
