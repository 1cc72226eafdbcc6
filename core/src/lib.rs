//! Declarative HTTP client core.
//!
//! # Overview
//! Endpoints are declared once as data: a verb, a path template such as
//! `/users/{id}?active={active}`, the parameters it takes and the type it
//! returns. A `Client` turns a declared endpoint plus call arguments into
//! a request, runs it through a pluggable transport (or a mock), and casts
//! the response body back into the declared type.
//!
//! # Design
//! - Binding, classification and casting are pure; only transports do I/O.
//!   `Client::build` / `Client::parse` expose that boundary for callers
//!   that want to run the exchange themselves.
//! - Every argument lands in exactly one place: path, query, body or the
//!   `request_headers` side channel. Ambiguity is an error, not a guess.
//! - Whether calls block or are awaited is fixed when the client is
//!   built, by the transport it is given.
//! - Mocks replace the exchange only; arguments are still validated and
//!   the canned payload goes through the same cast as a live body.

pub mod args;
pub mod cast;
pub mod classify;
pub mod client;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod http;
pub mod mock;
pub mod template;
pub mod transport;

pub use args::{Arg, Args, REQUEST_HEADERS};
pub use cast::{ExtractPath, Extractable, FromResponse, Model, Payload, ResponseKind};
pub use classify::RequestContext;
pub use client::{Client, Dispatch, Exchange};
pub use config::{Backend, ClientConfig, Session};
pub use endpoint::{Endpoint, EndpointBuilder, Group, MethodDescriptor, UnknownArgs};
pub use error::{
    CastError, ConfigError, Error, MockError, Result, TemplateError, TransportError, ValidationError,
};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use mock::{MockEntry, MockOutput, MockTable};
pub use template::PathTemplate;
pub use transport::{
    AsyncTransport, BlockingTransport, HyperClient, HyperTransport, ReqwestTransport, UreqTransport,
};
