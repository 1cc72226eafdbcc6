//! Suspending transport backed by the `hyper` legacy client.

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;

use super::{header_pairs, http_request, AsyncTransport};
use crate::error::TransportError;
use crate::http::{HttpRequest, HttpResponse};

/// Plain-HTTP pooled hyper client.
pub type HyperClient = Client<HttpConnector, Full<Bytes>>;

/// Async adapter over a hyper client. The request timeout bounds the whole
/// exchange, body collection included.
#[derive(Clone)]
pub struct HyperTransport {
    client: HyperClient,
}

impl HyperTransport {
    pub fn new() -> Self {
        Self::with_client(Client::builder(TokioExecutor::new()).build_http())
    }

    pub fn with_client(client: HyperClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &HyperClient {
        &self.client
    }

    async fn exchange(&self, request: http::Request<Full<Bytes>>) -> Result<HttpResponse, TransportError> {
        let response: http::Response<Incoming> = self
            .client
            .request(request)
            .await
            .map_err(|err| TransportError::Connection(Box::new(err)))?;
        let (parts, body) = response.into_parts();
        let body = body
            .collect()
            .await
            .map_err(|err| TransportError::Connection(Box::new(err)))?
            .to_bytes();

        Ok(HttpResponse {
            status: parts.status.as_u16(),
            headers: header_pairs(&parts.headers),
            body,
        })
    }
}

impl Default for HyperTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for HyperTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HyperTransport").finish_non_exhaustive()
    }
}

#[async_trait]
impl AsyncTransport for HyperTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let body = Full::new(request.body.clone().unwrap_or_default());
        let http_request = http_request(&request, body)?;
        match tokio::time::timeout(request.timeout, self.exchange(http_request)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(request.timeout)),
        }
    }
}
