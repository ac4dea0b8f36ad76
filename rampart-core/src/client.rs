use bytes::Bytes;
use http_body_util::{BodyExt as _, Empty};
use hyper::Request;
use hyper::body::Incoming;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use std::time::{Duration, Instant};

use crate::transport::{ApiRequest, ApiResponse, Transport, TransportError, TransportResult};

/// Pooled hyper client implementing the [`Transport`] seam.
#[derive(Debug, Clone)]
pub struct HyperTransport {
    inner: Client<HttpConnector, Empty<Bytes>>,
}

impl Default for HyperTransport {
    fn default() -> Self {
        // The OS-level TCP connect timeout can run to tens of seconds; cap it
        // so unreachable targets surface as failed samples promptly.
        Self::new(Some(Duration::from_secs(3)))
    }
}

impl HyperTransport {
    #[must_use]
    pub fn new(connect_timeout: Option<Duration>) -> Self {
        let mut connector = HttpConnector::new();
        connector.enforce_http(false);
        connector.set_connect_timeout(connect_timeout);

        let inner = Client::builder(TokioExecutor::new()).build(connector);
        Self { inner }
    }

    async fn dispatch(&self, req: ApiRequest) -> TransportResult {
        let parsed =
            url::Url::parse(&req.url).map_err(|_| TransportError::InvalidUrl(req.url.clone()))?;
        if parsed.scheme() != "http" {
            return Err(TransportError::UnsupportedScheme(req.url));
        }

        let uri: hyper::Uri = req
            .url
            .parse()
            .map_err(|_| TransportError::InvalidUrl(req.url))?;

        let request: Request<Empty<Bytes>> = Request::builder()
            .method(req.method)
            .uri(uri)
            .body(Empty::new())?;

        let started = Instant::now();

        let response: hyper::Response<Incoming> = if let Some(timeout) = req.timeout {
            match tokio::time::timeout(timeout, self.inner.request(request)).await {
                Ok(res) => res?,
                Err(_) => return Err(TransportError::Timeout(timeout)),
            }
        } else {
            self.inner.request(request).await?
        };

        let status = response.status().as_u16();
        let body = response.into_body().collect().await?.to_bytes();
        let duration = started.elapsed();

        Ok(ApiResponse {
            status,
            body,
            duration,
        })
    }
}

impl Transport for HyperTransport {
    fn send(&self, req: ApiRequest) -> impl Future<Output = TransportResult> + Send {
        self.dispatch(req)
    }
}
