//! Correlation ID middleware

use async_trait::async_trait;
use http::header::{HeaderName, HeaderValue};
use http::{Request, Response};
use std::fmt;
use tracing::Instrument;
use wikigate_core::response::responses;
use wikigate_core::{
    Body, ClientAddr, Middleware, Next, RequestContext, Result, REQUEST_ID_HEADER,
};

/// Request ID middleware
///
/// Takes the correlation ID from `X-Request-Id`, or generates a UUID v4 when
/// the header is missing or not valid header text. The ID is:
/// - stored in a [`RequestContext`] in the request extensions
/// - forwarded upstream in the request header
/// - echoed on the response, including responses built from errors that
///   reached this layer
/// - recorded on a `request` span wrapping everything downstream
#[derive(Clone)]
pub struct RequestId {
    header_name: HeaderName,
}

impl RequestId {
    /// Create a new Request ID middleware
    pub fn new() -> Self {
        Self {
            header_name: HeaderName::from_static(REQUEST_ID_HEADER),
        }
    }

    /// Correlation ID carried by the inbound request, if usable
    fn inbound_id<B>(&self, req: &Request<B>) -> Option<String> {
        req.headers()
            .get(&self.header_name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestId")
            .field("header_name", &self.header_name)
            .finish()
    }
}

#[async_trait]
impl Middleware for RequestId {
    async fn call(&self, mut req: Request<Body>, next: Next) -> Result<Response<Body>> {
        let client_addr = req.extensions().get::<ClientAddr>().map(|addr| addr.0);

        let context = match self.inbound_id(&req) {
            Some(id) => RequestContext::with_id(id),
            None => RequestContext::new(),
        }
        .client_addr(client_addr);

        // Generated IDs are UUIDs and inbound ones already passed `to_str`.
        let header_value = HeaderValue::from_str(&context.request_id).ok();
        if let Some(value) = header_value.clone() {
            req.headers_mut().insert(self.header_name.clone(), value);
        }

        let span = tracing::info_span!("request", request_id = %context.request_id);
        req.extensions_mut().insert(context);

        let mut response = match next.run(req).instrument(span.clone()).await {
            Ok(response) => response,
            Err(e) => {
                span.in_scope(|| tracing::error!(error = %e, "Request failed"));
                responses::status(e.to_status_code())
            }
        };

        if let Some(value) = header_value {
            response
                .headers_mut()
                .insert(self.header_name.clone(), value);
        }

        Ok(response)
    }
}
