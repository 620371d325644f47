//! # Wikigate Middleware
//!
//! Middleware applied to every request the gateway handles:
//! - Request ID (correlation ID) injection
//! - Structured access logging
//! - Panic recovery
//! - CORS (Cross-Origin Resource Sharing)

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod access_log;
pub mod builder;
pub mod cors;
pub mod recovery;
pub mod request_id;

#[cfg(test)]
mod test_support;

pub use access_log::{level_for_status, AccessLog};
pub use builder::MiddlewareBuilder;
pub use cors::Cors;
pub use recovery::{install_panic_hook, panic_message, Recovery};
pub use request_id::RequestId;

// Re-export core middleware types from wikigate-core
pub use wikigate_core::middleware::{Middleware, Next};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::access_log::AccessLog;
    pub use crate::builder::MiddlewareBuilder;
    pub use crate::cors::Cors;
    pub use crate::recovery::{install_panic_hook, Recovery};
    pub use crate::request_id::RequestId;
    pub use wikigate_core::middleware::{Middleware, Next};
}
