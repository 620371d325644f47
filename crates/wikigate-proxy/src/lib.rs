//! # Wikigate Reverse Proxy
//!
//! Streaming reverse proxy used by every gateway route:
//! - Pure request rewriting (scheme, authority, stripped path, forwarding headers)
//! - Pooled upstream connections shared across routes
//! - Request timeout
//! - Transport failures mapped to `502 Bad Gateway`
//!
//! Bodies are never buffered; request and response streams pass straight
//! through.

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod client;
pub mod proxy;

pub use client::{HttpClient, PoolConfig};
pub use proxy::{remove_hop_by_hop, rewrite, ProxyHandler, UpstreamTarget};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::client::{HttpClient, PoolConfig};
    pub use crate::proxy::{ProxyHandler, UpstreamTarget};
}
