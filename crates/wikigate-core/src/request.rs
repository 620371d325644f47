//! Request context and utilities

use http::Request;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Peer address of the connection a request arrived on.
///
/// Inserted into request extensions by the server before the middleware chain
/// runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientAddr(pub SocketAddr);

/// Context attached to each request
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Correlation ID, echoed or generated
    pub request_id: String,

    /// When the gateway started handling the request
    pub started_at: Instant,

    /// Remote peer, when known
    pub client_addr: Option<SocketAddr>,
}

impl RequestContext {
    /// Create a new request context with a freshly generated ID
    pub fn new() -> Self {
        Self::with_id(Uuid::new_v4().to_string())
    }

    /// Create a request context carrying an existing correlation ID
    pub fn with_id(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            started_at: Instant::now(),
            client_addr: None,
        }
    }

    /// Attach the peer address
    pub fn client_addr(mut self, addr: Option<SocketAddr>) -> Self {
        self.client_addr = addr;
        self
    }

    /// Time spent on the request so far
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Context previously attached to a request, if any
    pub fn of<B>(req: &Request<B>) -> Option<&RequestContext> {
        req.extensions().get::<RequestContext>()
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}
