//! CORS (Cross-Origin Resource Sharing) middleware

use async_trait::async_trait;
use http::header::{self, HeaderMap, HeaderValue};
use http::{Method, Request, Response, StatusCode};
use std::fmt;
use wikigate_config::CorsConfig;
use wikigate_core::{Body, Error, Middleware, Next, ResponseBuilder, Result};

/// Methods a cross-origin caller may use
const ALLOWED_METHODS: [Method; 5] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::DELETE,
    Method::OPTIONS,
];

/// CORS middleware
///
/// Handles Cross-Origin Resource Sharing (CORS) by:
/// - Answering preflight requests (`OPTIONS` with `Origin` and
///   `Access-Control-Request-Method`) directly with `204`
/// - Adding `Access-Control-*` headers to actual responses
/// - Validating origin against allowed origins
///
/// With credentials enabled the request origin is echoed back; `*` is only
/// ever sent when credentials are off.
#[derive(Clone)]
pub struct Cors {
    any_origin: bool,
    allowed_origins: Vec<String>,
    allow_credentials: bool,
    allow_methods: HeaderValue,
    allow_headers: HeaderValue,
    expose_headers: Option<HeaderValue>,
    max_age: HeaderValue,
}

impl Cors {
    /// Create a CORS middleware enforcing `config`
    pub fn new(config: &CorsConfig) -> Result<Self> {
        let header_value = |field: &str, value: String| {
            HeaderValue::from_str(&value)
                .map_err(|e| Error::Config(format!("invalid CORS {field} '{value}': {e}")))
        };

        let methods = ALLOWED_METHODS
            .iter()
            .map(Method::as_str)
            .collect::<Vec<_>>()
            .join(", ");

        let expose_headers = if config.exposed_headers.is_empty() {
            None
        } else {
            Some(header_value(
                "exposed_headers",
                config.exposed_headers.join(", "),
            )?)
        };

        Ok(Self {
            any_origin: config.allowed_origins.iter().any(|o| o == "*"),
            allowed_origins: config.allowed_origins.clone(),
            allow_credentials: config.allow_credentials,
            allow_methods: header_value("methods", methods)?,
            allow_headers: header_value("allowed_headers", config.allowed_headers.join(", "))?,
            expose_headers,
            max_age: HeaderValue::from(config.max_age.as_secs()),
        })
    }

    /// Check if origin is allowed
    fn is_origin_allowed(&self, origin: &str) -> bool {
        self.any_origin || self.allowed_origins.iter().any(|o| o == origin)
    }

    /// Value for `Access-Control-Allow-Origin`, or `None` when the origin is
    /// not allowed
    fn allow_origin(&self, request_origin: Option<&str>) -> Option<HeaderValue> {
        if self.any_origin && !self.allow_credentials {
            return Some(HeaderValue::from_static("*"));
        }

        request_origin
            .filter(|origin| self.is_origin_allowed(origin))
            .and_then(|origin| HeaderValue::from_str(origin).ok())
    }

    /// Add the headers shared by preflight and actual responses
    fn apply_origin(&self, origin: Option<&str>, headers: &mut HeaderMap) -> bool {
        let Some(allow_origin) = self.allow_origin(origin) else {
            return false;
        };

        if allow_origin != "*" && !varies_on_origin(headers) {
            headers.append(header::VARY, HeaderValue::from_static("Origin"));
        }
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, allow_origin);

        if self.allow_credentials {
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
                HeaderValue::from_static("true"),
            );
        }

        true
    }

    /// Handle preflight OPTIONS request
    fn preflight(&self, origin: Option<&str>) -> Result<Response<Body>> {
        let mut response = ResponseBuilder::new(StatusCode::NO_CONTENT).build()?;

        let headers = response.headers_mut();
        if self.apply_origin(origin, headers) {
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_METHODS,
                self.allow_methods.clone(),
            );
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_HEADERS,
                self.allow_headers.clone(),
            );
            headers.insert(header::ACCESS_CONTROL_MAX_AGE, self.max_age.clone());
        }

        Ok(response)
    }

    fn is_preflight<B>(req: &Request<B>) -> bool {
        req.method() == Method::OPTIONS
            && req.headers().contains_key(header::ORIGIN)
            && req
                .headers()
                .contains_key(header::ACCESS_CONTROL_REQUEST_METHOD)
    }
}

/// Whether `Vary` already covers `Origin`, either by name or by `*`
fn varies_on_origin(headers: &HeaderMap) -> bool {
    headers
        .get_all(header::VARY)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .any(|field| field == "*" || field.eq_ignore_ascii_case("origin"))
}

impl fmt::Debug for Cors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cors")
            .field("allowed_origins", &self.allowed_origins)
            .field("allow_credentials", &self.allow_credentials)
            .finish()
    }
}

#[async_trait]
impl Middleware for Cors {
    async fn call(&self, req: Request<Body>, next: Next) -> Result<Response<Body>> {
        let origin = req
            .headers()
            .get(header::ORIGIN)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        if Self::is_preflight(&req) {
            return self.preflight(origin.as_deref());
        }

        let mut response = next.run(req).await?;

        let headers = response.headers_mut();
        if self.apply_origin(origin.as_deref(), headers) {
            if let Some(expose) = &self.expose_headers {
                headers.insert(header::ACCESS_CONTROL_EXPOSE_HEADERS, expose.clone());
            }
        }

        Ok(response)
    }
}
