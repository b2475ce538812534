//! HTTP round-tripper that resolves `req.url().host()` as a logical service
//! name through a [`Balancer`] before delegating to `reqwest`.
//!
//! Grounded on `original_source/net/http/transport.go`'s `RoundTrip` and on
//! `services/http.rs`'s retry-loop shape (buffer body once, retry up to a
//! bound, skip the backend on failure).

use crate::balancer::{Balancer, BackendRef};
use crate::error::{Error, Result};
use log::warn;
use reqwest::{Client, Method, Request, Response};
use std::sync::Arc;
use std::time::Duration;

/// Default retry budget: one initial attempt plus this many retries.
const DEFAULT_MAX_RETRY: u32 = 2;

/// Wraps a `reqwest::Client`, resolving the request's host through a
/// [`Balancer`] and retrying against a different backend on transport
/// failure.
///
/// Unlike a raw `reqwest::Client`, callers address requests to the logical
/// service name (e.g. `http://billing/v1/charge`) rather than a concrete
/// backend address — this type rewrites the host per attempt.
pub struct MeshTransport {
    client: Client,
    balancer: Arc<Balancer>,
    max_retry: u32,
    max_requests_by_backend: i32,
}

impl MeshTransport {
    pub fn new(balancer: Arc<Balancer>) -> Self {
        Self {
            client: Client::new(),
            balancer,
            max_retry: DEFAULT_MAX_RETRY,
            max_requests_by_backend: 0,
        }
    }

    pub fn with_max_retry(mut self, max_retry: u32) -> Self {
        self.max_retry = max_retry;
        self
    }

    pub fn with_max_requests_by_backend(mut self, max_requests_by_backend: i32) -> Self {
        self.max_requests_by_backend = max_requests_by_backend;
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self { client: Client::builder().timeout(timeout).build().unwrap_or_default(), ..self }
    }

    /// Sends `request`, retrying against a fresh backend pick on every
    /// transport failure. The body is buffered once up front so it can be
    /// re-sent on each attempt.
    pub async fn execute(&self, method: Method, url: url::Url, body: Option<bytes::Bytes>) -> Result<Response> {
        let service = url.host_str().ok_or(Error::MissingAddress)?.to_string();

        let mut last_error: Option<Error> = None;

        for _ in 0..=self.max_retry {
            let (upstream, backend_ref) = self.balancer.next(&service, self.max_requests_by_backend)?;
            let backend = upstream.resolve(backend_ref);

            backend.inc_concurrent_request(1);
            let result = self.send_once(&method, &url, &backend.address(), body.clone()).await;
            backend.inc_concurrent_request(-1);

            match result {
                Ok(response) => return Ok(response),
                Err(err) => {
                    warn!("mesh transport: attempt against {} failed: {err}", backend.address());
                    backend.skip();
                    last_error = Some(err);
                }
            }
        }

        Err(last_error.unwrap_or(Error::NoEligibleBackend { service }))
    }

    async fn send_once(
        &self,
        method: &Method,
        url: &url::Url,
        backend_address: &str,
        body: Option<bytes::Bytes>,
    ) -> Result<Response> {
        let mut rewritten = url.clone();
        let (host, port) = crate::catalog::normalize_address(backend_address, url.port().unwrap_or(80))?;
        rewritten.set_host(Some(&host)).map_err(|_| Error::InvalidValue {
            path: "url.host".to_string(),
            message: format!("backend address {backend_address} is not a valid host"),
        })?;
        rewritten.set_port(Some(port)).ok();

        let mut request = Request::new(method.clone(), rewritten);
        if let Some(body) = body {
            *request.body_mut() = Some(body.into());
        }

        self.client.execute(request).await.map_err(|e| Error::Catalog(crate::error::CatalogError::Http(e)))
    }
}
