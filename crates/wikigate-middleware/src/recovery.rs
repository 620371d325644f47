//! Panic recovery middleware

use async_trait::async_trait;
use futures::FutureExt;
use http::{Request, Response, StatusCode};
use std::any::Any;
use std::backtrace::Backtrace;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;
use wikigate_core::response::responses;
use wikigate_core::{Body, Middleware, Next, RequestContext, Result};

static PANIC_HOOK: Once = Once::new();

/// Route panic reports through `tracing` instead of stderr
///
/// The hook logs the message, source location and a captured backtrace at
/// error level. It runs on the panicking thread, so the line lands inside the
/// current `request` span and carries its correlation ID. Installing more
/// than once is a no-op.
pub fn install_panic_hook() {
    PANIC_HOOK.call_once(|| {
        panic::set_hook(Box::new(|info| {
            let location = info
                .location()
                .map(|l| l.to_string())
                .unwrap_or_else(|| "unknown".to_string());
            let backtrace = Backtrace::force_capture();

            tracing::error!(
                panic = %panic_message(info.payload()),
                location = %location,
                backtrace = %backtrace,
                "Panic while handling request"
            );
        }));
    });
}

/// Text of a panic payload
pub fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "Box<dyn Any>"
    }
}

/// Panic recovery middleware
///
/// Catches panics raised anywhere downstream and answers
/// `500 Internal Server Error` instead of tearing down the connection.
/// Later requests are unaffected.
#[derive(Clone, Default)]
pub struct Recovery {
    _private: (),
}

impl Recovery {
    /// Create a new recovery middleware
    pub fn new() -> Self {
        Self::default()
    }
}

impl fmt::Debug for Recovery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Recovery").finish()
    }
}

#[async_trait]
impl Middleware for Recovery {
    async fn call(&self, req: Request<Body>, next: Next) -> Result<Response<Body>> {
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        let request_id = RequestContext::of(&req).map(|ctx| ctx.request_id.clone());

        match AssertUnwindSafe(next.run(req)).catch_unwind().await {
            Ok(result) => result,
            Err(payload) => {
                tracing::error!(
                    request_id = request_id.as_deref().unwrap_or("-"),
                    method = %method,
                    path = %path,
                    panic = %panic_message(payload.as_ref()),
                    "Recovered from panic"
                );
                Ok(responses::status(StatusCode::INTERNAL_SERVER_ERROR))
            }
        }
    }
}
