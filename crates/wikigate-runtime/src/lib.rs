//! # Wikigate Runtime
//!
//! Gateway lifecycle and request dispatch:
//! - Server lifecycle (bind, serve, drain, stop)
//! - Graceful shutdown with signal handling and forced exit on a second signal
//! - Dispatch of requests to `/health`, the upstream proxies or `404`
//! - In-flight request accounting

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod handler;
pub mod server;
pub mod shutdown;

pub use handler::{Dispatcher, InFlight, RequestHandler, HEALTH_PATH};
pub use server::{Server, ServerBuilder};
pub use shutdown::{OsSignals, ShutdownSignal, SignalHandler, SignalOutcome, SignalSource};

/// Runtime state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeState {
    /// Built but not yet accepting connections
    Starting,
    /// Accepting and serving connections
    Serving,
    /// No longer accepting; draining in-flight requests
    ShuttingDown,
    /// All connections drained or the grace period elapsed
    Stopped,
}

/// Re-export commonly used types
pub mod prelude {
    pub use crate::server::{Server, ServerBuilder};
    pub use crate::shutdown::{OsSignals, ShutdownSignal, SignalHandler, SignalOutcome};
    pub use crate::RuntimeState;
}
