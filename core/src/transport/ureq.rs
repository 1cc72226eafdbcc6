//! Blocking transport backed by `ureq`.

use std::fmt;
use std::time::Duration;

use super::{header_pairs, http_request, BlockingTransport};
use crate::error::TransportError;
use crate::http::{HttpRequest, HttpResponse};

/// Blocking adapter over a `ureq::Agent`.
///
/// The default agent reports non-2xx statuses as responses, leaving status
/// interpretation to the core. An injected agent configured otherwise
/// surfaces them as `TransportError::Status` with an empty body.
#[derive(Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new() -> Self {
        Self::with_agent(default_agent())
    }

    /// Reuse an existing agent, its connection pool and settings included.
    pub fn with_agent(agent: ureq::Agent) -> Self {
        Self { agent }
    }

    pub fn agent(&self) -> &ureq::Agent {
        &self.agent
    }

    fn run<S: ureq::AsSendBody>(
        &self,
        request: http::Request<S>,
        timeout: Duration,
    ) -> Result<http::Response<ureq::Body>, TransportError> {
        let request = self
            .agent
            .configure_request(request)
            .timeout_global(Some(timeout))
            .build();
        self.agent.run(request).map_err(|err| map_error(err, timeout))
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for UreqTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UreqTransport").finish_non_exhaustive()
    }
}

impl BlockingTransport for UreqTransport {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let timeout = request.timeout;
        let mut response = match &request.body {
            Some(body) => self.run(http_request(&request, body.to_vec())?, timeout)?,
            None => self.run(http_request(&request, ())?, timeout)?,
        };

        let status = response.status().as_u16();
        let headers = header_pairs(response.headers());
        let body = response
            .body_mut()
            .read_to_vec()
            .map_err(|err| map_error(err, timeout))?;

        Ok(HttpResponse {
            status,
            headers,
            body: body.into(),
        })
    }
}

pub(crate) fn default_agent() -> ureq::Agent {
    ureq::Agent::config_builder()
        .http_status_as_error(false)
        .build()
        .new_agent()
}

fn map_error(err: ureq::Error, timeout: Duration) -> TransportError {
    match err {
        ureq::Error::Timeout(_) => TransportError::Timeout(timeout),
        ureq::Error::StatusCode(status) => TransportError::Status {
            status,
            body: String::new(),
        },
        other => TransportError::Connection(Box::new(other)),
    }
}
