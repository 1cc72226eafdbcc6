//! Suspending transport backed by `reqwest`.

use async_trait::async_trait;

use super::{header_pairs, AsyncTransport};
use crate::error::TransportError;
use crate::http::{HttpRequest, HttpResponse};

/// Async adapter over a `reqwest::Client`.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reuse an existing client and its connection pool.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }
}

#[async_trait]
impl AsyncTransport for ReqwestTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = self
            .client
            .request(request.method.into(), request.url.as_str())
            .timeout(request.timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|err| map_error(err, &request.timeout))?;
        let status = response.status().as_u16();
        let headers = header_pairs(response.headers());
        let body = response
            .bytes()
            .await
            .map_err(|err| map_error(err, &request.timeout))?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

fn map_error(err: reqwest::Error, timeout: &std::time::Duration) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(*timeout)
    } else if err.is_builder() {
        TransportError::Request(err.to_string())
    } else {
        TransportError::Connection(Box::new(err))
    }
}
