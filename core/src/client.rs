//! Declarative call dispatch.
//!
//! # Design
//! `Client` holds the base URL, default headers, timeout, mock table and
//! a `Dispatch` fixed at construction. A call is split the same way for
//! every backend:
//!
//! - `build` binds and classifies the arguments, then either finds a mock
//!   (`Exchange::Mocked`) or produces a plain-data `HttpRequest`
//!   (`Exchange::Live`). No I/O happens here.
//! - the transport executes the request, or the caller does it itself;
//! - `parse` checks the status and casts the body.
//!
//! `call` and `call_async` chain the three steps. Mocked payloads skip the
//! transport and are cast as a 200 response.

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use serde_json::{Map, Value};
use tracing::Instrument;

use crate::args::Args;
use crate::cast::FromResponse;
use crate::classify::{classify, RequestContext};
use crate::config::{Backend, ClientConfig, Session, DEFAULT_TIMEOUT};
use crate::endpoint::Endpoint;
use crate::error::{ConfigError, Error, MockError, Result, TransportError};
use crate::http::{HttpRequest, HttpResponse};
use crate::mock::{MockEntry, MockTable};
use crate::template::value_to_string;
use crate::transport::{
    AsyncTransport, BlockingTransport, HyperTransport, ReqwestTransport, UreqTransport,
};

/// How a client performs its exchanges.
#[derive(Clone)]
pub enum Dispatch {
    Blocking(Arc<dyn BlockingTransport>),
    Suspending(Arc<dyn AsyncTransport>),
}

impl fmt::Debug for Dispatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dispatch::Blocking(_) => f.write_str("Blocking"),
            Dispatch::Suspending(_) => f.write_str("Suspending"),
        }
    }
}

/// The outcome of `Client::build`.
#[derive(Debug, Clone)]
pub enum Exchange {
    /// A mock matched; these bytes stand in for a 200 response body.
    Mocked(Bytes),
    Live(HttpRequest),
}

type BeforeRequest = Arc<dyn Fn(&mut HttpRequest) + Send + Sync>;

#[derive(Clone)]
pub struct Client {
    base_url: String,
    headers: Vec<(String, String)>,
    timeout: Duration,
    dispatch: Dispatch,
    mocks: MockTable,
    before_request: Option<BeforeRequest>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.base_url)
            .field("headers", &self.headers)
            .field("timeout", &self.timeout)
            .field("dispatch", &self.dispatch)
            .field("mocks", &self.mocks.len())
            .finish_non_exhaustive()
    }
}

impl Client {
    pub fn new(base_url: &str, dispatch: Dispatch) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            headers: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
            dispatch,
            mocks: MockTable::default(),
            before_request: None,
        }
    }

    pub fn blocking(base_url: &str, transport: impl BlockingTransport + 'static) -> Self {
        Self::new(base_url, Dispatch::Blocking(Arc::new(transport)))
    }

    pub fn suspending(base_url: &str, transport: impl AsyncTransport + 'static) -> Self {
        Self::new(base_url, Dispatch::Suspending(Arc::new(transport)))
    }

    /// Build a client and its transport from configuration, reusing the
    /// injected session when there is one.
    pub fn from_config(mut config: ClientConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let dispatch = match (config.client_type, config.session.take()) {
            (Backend::Ureq, Some(Session::Ureq(agent))) => {
                Dispatch::Blocking(Arc::new(UreqTransport::with_agent(agent)))
            }
            (Backend::Ureq, None) => Dispatch::Blocking(Arc::new(UreqTransport::new())),
            (Backend::Reqwest, Some(Session::Reqwest(client))) => {
                Dispatch::Suspending(Arc::new(ReqwestTransport::with_client(client)))
            }
            (Backend::Reqwest, None) => Dispatch::Suspending(Arc::new(ReqwestTransport::new())),
            (Backend::Hyper, Some(Session::Hyper(client))) => {
                Dispatch::Suspending(Arc::new(HyperTransport::with_client(client)))
            }
            (Backend::Hyper, None) => Dispatch::Suspending(Arc::new(HyperTransport::new())),
            (backend, Some(session)) => {
                return Err(ConfigError::SessionMismatch {
                    backend,
                    session: session.backend(),
                })
            }
        };

        let mut client = Self::new(&config.base_url, dispatch).with_timeout(config.timeout);
        client.headers = config.headers.into_iter().collect();
        if let Some(mock_config) = &config.mock_config {
            client.mocks = MockTable::from_value(mock_config)?;
        }
        tracing::debug!(
            base_url = %client.base_url,
            backend = %config.client_type,
            mocks = client.mocks.len(),
            "client configured"
        );
        Ok(client)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }

    pub fn is_suspending(&self) -> bool {
        matches!(self.dispatch, Dispatch::Suspending(_))
    }

    /// Add a default header sent on every call.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        set_header(&mut self.headers, name, value);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run `hook` on every live request right before it is handed over.
    pub fn with_before_request<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut HttpRequest) + Send + Sync + 'static,
    {
        self.before_request = Some(Arc::new(hook));
        self
    }

    /// Replace the mock table.
    pub fn configure_mocks(&mut self, entries: impl IntoIterator<Item = MockEntry>) {
        self.mocks = MockTable::new(entries);
        tracing::debug!(mocks = self.mocks.len(), "mock table replaced");
    }

    pub fn configure_mocks_from_value(&mut self, config: &Value) -> Result<(), MockError> {
        self.mocks = MockTable::from_value(config)?;
        Ok(())
    }

    pub fn configure_mocks_from_file(&mut self, path: impl AsRef<Path>) -> Result<(), MockError> {
        self.mocks = MockTable::from_file(path)?;
        Ok(())
    }

    pub fn clear_mocks(&mut self) {
        self.mocks = MockTable::default();
    }

    pub fn mocks(&self) -> &MockTable {
        &self.mocks
    }

    /// Join the base URL and a rendered path with exactly one `/`.
    pub fn make_url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Bind, classify and either resolve a mock or build the live request.
    pub fn build<R: FromResponse>(&self, endpoint: &Endpoint<R>, args: Args) -> Result<Exchange> {
        let descriptor = endpoint.descriptor();
        let bound = descriptor.bind(args)?;
        let context = classify(descriptor, bound, descriptor.http_method())?;

        if let Some(raw) = self.mocks.lookup(descriptor.name()) {
            tracing::debug!(method = descriptor.name(), "using mock data");
            return Ok(Exchange::Mocked(raw));
        }
        self.request_from(context).map(Exchange::Live)
    }

    /// Check the status of a live response and cast its body.
    pub fn parse<R: FromResponse>(&self, endpoint: &Endpoint<R>, response: HttpResponse) -> Result<R> {
        check_status(&response)?;
        Ok(endpoint.cast(&response.body, response.status)?)
    }

    /// Perform a call on a blocking client.
    pub fn call<R: FromResponse>(&self, endpoint: &Endpoint<R>, args: Args) -> Result<R> {
        let Dispatch::Blocking(transport) = &self.dispatch else {
            return Err(Error::Dispatch("suspending client: use `call_async`"));
        };
        let descriptor = endpoint.descriptor();
        let span = tracing::debug_span!(
            "rest_call",
            method = descriptor.name(),
            verb = %descriptor.http_method()
        );
        let _entered = span.enter();
        let started = Instant::now();

        let result = match self.build(endpoint, args)? {
            Exchange::Mocked(raw) => Ok(endpoint.cast(&raw, 200)?),
            Exchange::Live(request) => {
                let response = transport.execute(request)?;
                self.parse(endpoint, response)
            }
        };
        tracing::debug!(elapsed = ?started.elapsed(), ok = result.is_ok(), "call finished");
        result
    }

    /// Perform a call, awaiting suspending transports. A blocking
    /// transport runs its exchange on tokio's blocking pool, so this must be
    /// awaited inside a tokio runtime.
    pub async fn call_async<R: FromResponse>(&self, endpoint: &Endpoint<R>, args: Args) -> Result<R> {
        let descriptor = endpoint.descriptor();
        let span = tracing::debug_span!(
            "rest_call",
            method = descriptor.name(),
            verb = %descriptor.http_method()
        );

        async move {
            let started = Instant::now();
            let result = match self.build(endpoint, args)? {
                Exchange::Mocked(raw) => Ok(endpoint.cast(&raw, 200)?),
                Exchange::Live(request) => {
                    let response = match &self.dispatch {
                        Dispatch::Suspending(transport) => transport.execute(request).await?,
                        Dispatch::Blocking(transport) => {
                            let transport = Arc::clone(transport);
                            tokio::task::spawn_blocking(move || transport.execute(request))
                                .await
                                .map_err(|err| TransportError::Connection(Box::new(err)))??
                        }
                    };
                    self.parse(endpoint, response)
                }
            };
            tracing::debug!(elapsed = ?started.elapsed(), ok = result.is_ok(), "call finished");
            result
        }
        .instrument(span)
        .await
    }

    fn request_from(&self, context: RequestContext) -> Result<HttpRequest> {
        let RequestContext {
            method,
            rendered_path,
            query_params,
            json_body,
            form_body,
            headers: call_headers,
            function_name: _,
        } = context;

        let mut url = self.make_url(&rendered_path);
        let query = encode_pairs(&query_params)?;
        if !query.is_empty() {
            url.push('?');
            url.push_str(&query);
        }

        let mut headers = self.headers.clone();
        let body = match (json_body, form_body) {
            (Some(fields), _) => {
                set_header(&mut headers, "content-type", "application/json");
                Some(Bytes::from(serde_json::to_vec(&fields)?))
            }
            (None, Some(fields)) => {
                set_header(&mut headers, "content-type", "application/x-www-form-urlencoded");
                Some(Bytes::from(encode_form(fields)?))
            }
            (None, None) => None,
        };
        for (name, value) in call_headers.unwrap_or_default() {
            set_header(&mut headers, &name, &value);
        }

        let mut request = HttpRequest {
            method,
            url,
            headers,
            body,
            timeout: self.timeout,
        };
        if let Some(hook) = &self.before_request {
            hook(&mut request);
        }
        Ok(request)
    }
}

/// Map a non-2xx response to `TransportError::Status`.
fn check_status(response: &HttpResponse) -> Result<(), TransportError> {
    if response.is_success() {
        return Ok(());
    }
    Err(TransportError::Status {
        status: response.status,
        body: String::from_utf8_lossy(&response.body).into_owned(),
    })
}

/// Insert or replace a header, matching names case-insensitively.
fn set_header(headers: &mut Vec<(String, String)>, name: &str, value: &str) {
    match headers.iter_mut().find(|(key, _)| key.eq_ignore_ascii_case(name)) {
        Some(slot) => *slot = (name.to_string(), value.to_string()),
        None => headers.push((name.to_string(), value.to_string())),
    }
}

/// URL-encode pairs: nulls are skipped, arrays repeat their key.
fn encode_pairs(pairs: &[(String, Value)]) -> Result<String> {
    let mut flat: Vec<(&str, String)> = Vec::with_capacity(pairs.len());
    for (key, value) in pairs {
        match value {
            Value::Null => {}
            Value::Array(items) => flat.extend(
                items
                    .iter()
                    .filter(|item| !item.is_null())
                    .map(|item| (key.as_str(), value_to_string(item))),
            ),
            other => flat.push((key.as_str(), value_to_string(other))),
        }
    }
    Ok(serde_urlencoded::to_string(&flat)?)
}

fn encode_form(fields: Map<String, Value>) -> Result<String> {
    let pairs: Vec<(String, Value)> = fields.into_iter().collect();
    encode_pairs(&pairs)
}
