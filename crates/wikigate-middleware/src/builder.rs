//! Middleware chain builder
//!
//! This module provides a builder pattern for constructing middleware chains.

use crate::*;
use std::sync::Arc;
use wikigate_config::Config;
use wikigate_core::Result;

/// Middleware chain builder
///
/// Middleware runs in insertion order on the way in and in reverse on the
/// way out.
#[derive(Debug, Default)]
pub struct MiddlewareBuilder {
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareBuilder {
    /// Create a new middleware builder
    #[must_use]
    pub fn new() -> Self {
        Self {
            middlewares: Vec::new(),
        }
    }

    /// The gateway's standard chain for `config`:
    /// request ID, access log, recovery, CORS
    ///
    /// The access log sits outside recovery so it records the final status,
    /// including the 500 produced for a panic.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new()
            .with_request_id()
            .with_access_log()
            .with_recovery()
            .with_cors(Cors::new(&config.cors)?))
    }

    /// Add Request ID middleware
    #[must_use]
    pub fn with_request_id(mut self) -> Self {
        self.middlewares.push(Arc::new(RequestId::new()));
        self
    }

    /// Add access log middleware
    #[must_use]
    pub fn with_access_log(mut self) -> Self {
        self.middlewares.push(Arc::new(AccessLog::new()));
        self
    }

    /// Add panic recovery middleware
    #[must_use]
    pub fn with_recovery(mut self) -> Self {
        self.middlewares.push(Arc::new(Recovery::new()));
        self
    }

    /// Add CORS middleware
    #[must_use]
    pub fn with_cors(mut self, cors: Cors) -> Self {
        self.middlewares.push(Arc::new(cors));
        self
    }

    /// Add custom middleware
    #[must_use]
    pub fn with_middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middlewares.push(middleware);
        self
    }

    /// Build the middleware chain
    ///
    /// Returns an `Arc<[Arc<dyn Middleware>]>` for efficient sharing.
    #[must_use]
    pub fn build(self) -> Arc<[Arc<dyn Middleware>]> {
        self.middlewares.into()
    }

    /// Get the number of middlewares in the chain
    #[must_use]
    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    /// Check if the chain is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{Request, Response, StatusCode};
    use wikigate_config::{ConfigBuilder, CorsConfig};
    use crate::test_support::CapturedLogs;
    use http_body_util::BodyExt;
    use wikigate_core::response::responses;
    use wikigate_core::{body, Body, Next, REQUEST_ID_HEADER};

    #[derive(Debug)]
    struct Panicking;

    #[async_trait::async_trait]
    impl Middleware for Panicking {
        async fn call(&self, _req: Request<Body>, _next: Next) -> Result<Response<Body>> {
            panic!("downstream failure");
        }
    }

    #[test]
    fn test_builder_empty() {
        let chain = MiddlewareBuilder::new().build();
        assert!(chain.is_empty());
    }

    #[test]
    fn test_builder_multiple_middlewares() {
        let chain = MiddlewareBuilder::new()
            .with_request_id()
            .with_access_log()
            .with_recovery()
            .with_cors(Cors::new(&CorsConfig::default()).unwrap())
            .build();
        assert_eq!(chain.len(), 4);
    }

    #[test]
    fn test_builder_len_and_is_empty() {
        let builder = MiddlewareBuilder::new();
        assert_eq!(builder.len(), 0);
        assert!(builder.is_empty());

        let builder = builder.with_request_id();
        assert_eq!(builder.len(), 1);
        assert!(!builder.is_empty());
    }

    #[tokio::test]
    async fn test_standard_chain_recovers_with_request_id() {
        let config = ConfigBuilder::new()
            .listen("127.0.0.1:0".parse().unwrap())
            .required_services(Vec::<String>::new())
            .build()
            .unwrap();

        let stack = MiddlewareBuilder::from_config(&config)
            .unwrap()
            .with_middleware(Arc::new(Panicking))
            .build();

        let req = Request::builder()
            .uri("/api/wikis/1")
            .header(REQUEST_ID_HEADER, "trace-me")
            .body(body::empty())
            .unwrap();

        let response = Next::new(stack).run(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.headers()[REQUEST_ID_HEADER], "trace-me");
    }

    #[derive(Debug)]
    struct NotFound;

    #[async_trait::async_trait]
    impl Middleware for NotFound {
        async fn call(&self, _req: Request<Body>, _next: Next) -> Result<Response<Body>> {
            responses::not_found()
        }
    }

    #[tokio::test]
    async fn test_standard_chain_logs_recovered_status() {
        let (logs, _guard) = CapturedLogs::install();
        let config = ConfigBuilder::new()
            .listen("127.0.0.1:0".parse().unwrap())
            .required_services(Vec::<String>::new())
            .build()
            .unwrap();

        for handler in [Arc::new(Panicking) as Arc<dyn Middleware>, Arc::new(NotFound)] {
            let stack = MiddlewareBuilder::from_config(&config)
                .unwrap()
                .with_middleware(handler)
                .build();
            let req = Request::builder()
                .uri("/api/wikis/1")
                .body(body::empty())
                .unwrap();

            let response = Next::new(stack).run(req).await.unwrap();
            response.into_body().collect().await.unwrap();
        }

        // Access log sits outside Recovery, so the panic is logged as the 500
        // the client received, once.
        let lines = logs.access_lines();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["level"], "ERROR");
        assert_eq!(lines[0]["fields"]["status"], 500);
        assert_eq!(lines[1]["level"], "WARN");
        assert_eq!(lines[1]["fields"]["status"], 404);
    }
}
