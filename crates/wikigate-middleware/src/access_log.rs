//! Access logging middleware

use async_trait::async_trait;
use http::{header, Request, Response, StatusCode};
use std::fmt;
use std::time::Instant;
use tracing::{Level, Span};
use wikigate_core::body::{self, BodyOutcome};
use wikigate_core::{Body, ClientAddr, Middleware, Next, RequestContext, Result};

/// Fields of one access log line, captured before the request moves on
#[derive(Debug, Clone)]
struct AccessLogRecord {
    remote_addr: String,
    host: String,
    path: String,
    protocol: String,
    method: String,
    user_agent: String,
}

impl AccessLogRecord {
    fn from_request<B>(req: &Request<B>) -> Self {
        let remote_addr = RequestContext::of(req)
            .and_then(|ctx| ctx.client_addr)
            .or_else(|| req.extensions().get::<ClientAddr>().map(|addr| addr.0))
            .map(|addr| addr.to_string())
            .unwrap_or_else(|| "-".to_string());

        let header_text = |name: header::HeaderName| {
            req.headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("-")
                .to_string()
        };

        Self {
            remote_addr,
            host: header_text(header::HOST),
            path: req.uri().path().to_string(),
            protocol: format!("{:?}", req.version()),
            method: req.method().to_string(),
            user_agent: header_text(header::USER_AGENT),
        }
    }
}

/// Severity of the access log line for a response status
pub fn level_for_status(status: StatusCode) -> Level {
    if status.is_server_error() {
        Level::ERROR
    } else if status.is_client_error() {
        Level::WARN
    } else {
        Level::INFO
    }
}

/// Access log middleware
///
/// Emits one structured line per request: remote address, host, path,
/// protocol, method, user agent, status, latency and how the response body
/// ended. Responses below 400 log at info, 4xx at warn and 5xx at error.
///
/// The line is written once the response body has been fully streamed,
/// failed or been dropped, so `latency_ms` covers the whole exchange.
#[derive(Clone, Default)]
pub struct AccessLog {
    _private: (),
}

impl AccessLog {
    /// Create a new access log middleware
    pub fn new() -> Self {
        Self::default()
    }
}

impl fmt::Debug for AccessLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessLog").finish()
    }
}

macro_rules! access_line {
    ($level:expr, $record:ident, $status:expr, $latency:expr, $outcome:expr) => {
        tracing::event!(
            $level,
            remote_addr = %$record.remote_addr,
            host = %$record.host,
            path = %$record.path,
            protocol = %$record.protocol,
            method = %$record.method,
            user_agent = %$record.user_agent,
            status = $status,
            latency_ms = $latency,
            outcome = $outcome,
            "Request completed"
        )
    };
}

fn outcome_name(outcome: BodyOutcome) -> &'static str {
    match outcome {
        BodyOutcome::Complete => "complete",
        BodyOutcome::Failed => "failed",
        BodyOutcome::Aborted => "aborted",
    }
}

fn emit(record: &AccessLogRecord, status: StatusCode, start: Instant, outcome: &'static str) {
    let latency = start.elapsed().as_secs_f64() * 1000.0;
    let code = status.as_u16();

    // `tracing::event!` needs a level known at compile time.
    let level = level_for_status(status);
    if level == Level::ERROR {
        access_line!(Level::ERROR, record, code, latency, outcome);
    } else if level == Level::WARN {
        access_line!(Level::WARN, record, code, latency, outcome);
    } else {
        access_line!(Level::INFO, record, code, latency, outcome);
    }
}

#[async_trait]
impl Middleware for AccessLog {
    async fn call(&self, req: Request<Body>, next: Next) -> Result<Response<Body>> {
        let record = AccessLogRecord::from_request(&req);
        let start = Instant::now();
        let span = Span::current();

        match next.run(req).await {
            Ok(response) => {
                let status = response.status();
                Ok(response.map(|inner| {
                    body::on_complete(inner, move |outcome| {
                        let _entered = span.enter();
                        emit(&record, status, start, outcome_name(outcome));
                    })
                }))
            }
            Err(e) => {
                emit(&record, e.to_status_code(), start, "error");
                Err(e)
            }
        }
    }
}
