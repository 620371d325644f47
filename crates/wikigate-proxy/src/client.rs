//! Pooled HTTP client for upstream requests

use http::{Request, Response};
use hyper::body::Incoming;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::time::Duration;
use wikigate_core::{Body, Error, Result};

/// Connection pool settings
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum idle connections kept per upstream host
    pub max_idle_per_host: usize,

    /// How long an idle connection stays in the pool
    pub idle_timeout: Duration,

    /// TCP connect timeout
    pub connect_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_idle_per_host: 32,
            idle_timeout: Duration::from_secs(90),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

/// HTTP client shared by every proxy handler
///
/// Cloning is cheap; clones share the same connection pool.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client<HttpsConnector<HttpConnector>, Body>,
    timeout: Duration,
}

impl HttpClient {
    /// Create a new HTTP client with the default 30s timeout
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(30))
    }

    /// Create a new HTTP client with custom timeout
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_config(timeout, PoolConfig::default())
    }

    /// Create a new HTTP client with custom timeout and pool settings
    pub fn with_config(timeout: Duration, pool: PoolConfig) -> Self {
        let mut http = HttpConnector::new();
        http.enforce_http(false);
        http.set_nodelay(true);
        http.set_connect_timeout(Some(pool.connect_timeout));

        let connector = HttpsConnectorBuilder::new()
            .with_webpki_roots()
            .https_or_http()
            .enable_http1()
            .wrap_connector(http);

        let client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(pool.idle_timeout)
            .pool_max_idle_per_host(pool.max_idle_per_host)
            .build(connector);

        Self { client, timeout }
    }

    /// Send a request and wait for the upstream response head
    ///
    /// The timeout covers connecting and receiving the response head. The
    /// body is streamed back afterwards and is not subject to it.
    pub async fn send(&self, req: Request<Body>) -> Result<Response<Incoming>> {
        let timeout = tokio::time::timeout(self.timeout, self.client.request(req));

        match timeout.await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) => Err(Error::UpstreamConnection(e.to_string())),
            Err(_) => Err(Error::UpstreamTimeout),
        }
    }

    /// Get the configured timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_http_client_new() {
        let client = HttpClient::new();
        assert_eq!(client.timeout(), Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_http_client_with_timeout() {
        let client = HttpClient::with_timeout(Duration::from_secs(10));
        assert_eq!(client.timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_pool_config_default() {
        let config = PoolConfig::default();
        assert_eq!(config.max_idle_per_host, 32);
        assert_eq!(config.idle_timeout, Duration::from_secs(90));
    }

    #[tokio::test]
    async fn test_refused_connection_is_upstream_error() {
        // Port 9 (discard) on loopback is not expected to accept connections.
        let client = HttpClient::with_timeout(Duration::from_secs(2));
        let req = Request::builder()
            .uri("http://127.0.0.1:9/")
            .body(wikigate_core::body::empty())
            .unwrap();

        let err = client.send(req).await.unwrap_err();
        assert!(matches!(
            err,
            Error::UpstreamConnection(_) | Error::UpstreamTimeout
        ));
    }
}
