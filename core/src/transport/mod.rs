//! Transport adapters.
//!
//! # Design
//! A transport turns one `HttpRequest` into one `HttpResponse` and nothing
//! more: no retries, no status interpretation, no decoding. The core
//! builds requests and casts responses identically for every backend, so
//! swapping the backend never changes what a declared call returns.
//!
//! Blocking and suspending adapters are separate traits; a client picks
//! one at construction and its call style follows from that choice.

use async_trait::async_trait;

use crate::error::TransportError;
use crate::http::{HttpRequest, HttpResponse};

pub mod hyper;
pub mod reqwest;
pub mod ureq;

pub use self::hyper::{HyperClient, HyperTransport};
pub use self::reqwest::ReqwestTransport;
pub use self::ureq::UreqTransport;

/// A transport that blocks the calling thread for the exchange.
pub trait BlockingTransport: Send + Sync {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// A transport whose exchange is awaited.
#[async_trait]
pub trait AsyncTransport: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Collect response headers into owned pairs, skipping non-UTF-8 values.
pub(crate) fn header_pairs(headers: &http::HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_string(), value.to_string()))
        })
        .collect()
}

/// Build an `http::Request` carrying `body`, shared by the adapters that
/// speak the `http` crate types.
pub(crate) fn http_request<B>(
    request: &HttpRequest,
    body: B,
) -> Result<http::Request<B>, TransportError> {
    let mut builder = http::Request::builder()
        .method(http::Method::from(request.method))
        .uri(request.url.as_str());
    for (name, value) in &request.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
        .body(body)
        .map_err(|err| TransportError::Request(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpMethod;
    use std::time::Duration;

    #[test]
    fn http_request_carries_method_uri_and_headers() {
        let request = HttpRequest {
            method: HttpMethod::Patch,
            url: "http://localhost:3000/users/1?v=2".to_string(),
            headers: vec![("x-trace".to_string(), "abc".to_string())],
            body: None,
            timeout: Duration::from_secs(1),
        };
        let built = http_request(&request, ()).unwrap();
        assert_eq!(built.method(), http::Method::PATCH);
        assert_eq!(built.uri().query(), Some("v=2"));
        assert_eq!(built.headers()["x-trace"], "abc");
    }

    #[test]
    fn invalid_header_name_is_a_request_error() {
        let request = HttpRequest {
            method: HttpMethod::Get,
            url: "http://localhost:3000/".to_string(),
            headers: vec![("bad header".to_string(), "v".to_string())],
            body: None,
            timeout: Duration::from_secs(1),
        };
        assert!(matches!(http_request(&request, ()), Err(TransportError::Request(_))));
    }

    #[test]
    fn header_pairs_skips_opaque_values() {
        let mut headers = http::HeaderMap::new();
        headers.insert("content-type", http::HeaderValue::from_static("text/plain"));
        headers.insert("x-bin", http::HeaderValue::from_bytes(b"\xff").unwrap());
        assert_eq!(
            header_pairs(&headers),
            vec![("content-type".to_string(), "text/plain".to_string())]
        );
    }
}
