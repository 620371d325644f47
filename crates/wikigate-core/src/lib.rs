//! # Wikigate Core
//!
//! Core types, traits, and error handling for the Wikigate API gateway.
//!
//! This crate provides the foundational abstractions used throughout the gateway:
//! - Streaming body type shared by the server, middleware and proxy
//! - Middleware trait and chain runner
//! - Per-request context (correlation ID, timing, peer address)
//! - Error types

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod body;
pub mod error;
pub mod middleware;
pub mod request;
pub mod response;

pub use body::{Body, BodyOutcome, BoxError};
pub use error::{Error, Result};
pub use middleware::{Middleware, Next};
pub use request::{ClientAddr, RequestContext};
pub use response::ResponseBuilder;

// Re-export commonly used HTTP types
pub use bytes::Bytes;
pub use http::{Method, Request, Response, StatusCode};

/// Header carrying the correlation ID in both directions
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Re-export commonly used types
pub mod prelude {
    pub use crate::body::{Body, BoxError};
    pub use crate::error::{Error, Result};
    pub use crate::middleware::{Middleware, Next};
    pub use crate::request::{ClientAddr, RequestContext};
    pub use crate::response::ResponseBuilder;
}
