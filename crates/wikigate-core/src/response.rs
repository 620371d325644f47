//! Response builder and utilities

use crate::body::{self, Body};
use crate::Result;
use http::{header, Response, StatusCode};

/// Response builder for convenient response construction
#[derive(Debug)]
pub struct ResponseBuilder {
    status: StatusCode,
    headers: Vec<(header::HeaderName, String)>,
}

impl ResponseBuilder {
    /// Create a new response builder
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Vec::new(),
        }
    }

    /// Set a header
    pub fn header(mut self, name: header::HeaderName, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    fn start(self) -> http::response::Builder {
        let mut response = Response::builder().status(self.status);
        for (name, value) in self.headers {
            response = response.header(name, value);
        }
        response
    }

    /// Build response with empty body
    pub fn build(self) -> Result<Response<Body>> {
        Ok(self.start().body(body::empty())?)
    }

    /// Build response with text body
    pub fn text(self, text: impl Into<String>) -> Result<Response<Body>> {
        let text: String = text.into();
        Ok(self
            .start()
            .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(body::full(text))?)
    }
}

/// Convenience functions for common responses
pub mod responses {
    use super::*;

    /// 200 OK with a plain-text body
    pub fn ok(message: impl Into<String>) -> Result<Response<Body>> {
        ResponseBuilder::new(StatusCode::OK).text(message)
    }

    /// 404 Not Found
    pub fn not_found() -> Result<Response<Body>> {
        Ok(status(StatusCode::NOT_FOUND))
    }

    /// Plain-text response for an arbitrary status, using its canonical reason
    pub fn status(status: StatusCode) -> Response<Body> {
        let reason = status.canonical_reason().unwrap_or("Error");
        let mut response = Response::new(body::full(reason));
        *response.status_mut() = status;
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[tokio::test]
    async fn test_response_builder() {
        let response = ResponseBuilder::new(StatusCode::OK)
            .header(header::HeaderName::from_static("x-custom"), "value")
            .text("Hello, World!")
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get("x-custom").unwrap(), "value");

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"Hello, World!");
    }

    #[test]
    fn test_empty_response() {
        let response = ResponseBuilder::new(StatusCode::NO_CONTENT)
            .header(header::VARY, "Origin")
            .build()
            .unwrap();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(response.headers()[header::VARY], "Origin");
    }

    #[tokio::test]
    async fn test_fixed_error_bodies() {
        let response = responses::status(StatusCode::BAD_GATEWAY);
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/plain; charset=utf-8"
        );
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"Bad Gateway");

        let response = responses::not_found().unwrap();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"Not Found");

        let response = responses::status(StatusCode::SERVICE_UNAVAILABLE);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"Service Unavailable");
    }
}
