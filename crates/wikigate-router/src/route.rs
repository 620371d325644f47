//! Route definition and builder

use url::Url;
use wikigate_core::{Error, Result};

/// A path prefix owned by one upstream service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    /// Logical service name (e.g. "wikis")
    pub service: String,

    /// Path prefix that selects this route (e.g. "/api/wikis")
    pub prefix: String,

    /// Upstream base URL
    pub upstream: Url,
}

impl Route {
    /// Create a new route builder
    pub fn builder() -> RouteBuilder {
        RouteBuilder::new()
    }

    /// Whether `path` falls under this route's prefix on a segment boundary
    pub fn matches(&self, path: &str) -> bool {
        if self.prefix == "/" {
            return path.starts_with('/');
        }

        match path.strip_prefix(self.prefix.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }
}

/// Builder for constructing routes
#[derive(Debug, Default)]
pub struct RouteBuilder {
    service: Option<String>,
    prefix: Option<String>,
    upstream: Option<String>,
}

impl RouteBuilder {
    /// Create a new route builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the service name
    pub fn service(mut self, name: impl Into<String>) -> Self {
        self.service = Some(name.into());
        self
    }

    /// Set the path prefix
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Set the upstream base URL
    pub fn upstream(mut self, url: impl Into<String>) -> Self {
        self.upstream = Some(url.into());
        self
    }

    /// Build the route
    pub fn build(self) -> Result<Route> {
        let service = self
            .service
            .ok_or_else(|| Error::Config("service is required".to_string()))?;

        let prefix = self
            .prefix
            .ok_or_else(|| Error::Config("prefix is required".to_string()))?;

        let upstream = self
            .upstream
            .ok_or_else(|| Error::Config("upstream is required".to_string()))?;

        if !prefix.starts_with('/') {
            return Err(Error::Config(format!(
                "route prefix '{prefix}' must start with '/'"
            )));
        }

        if prefix.len() > 1 && prefix.ends_with('/') {
            return Err(Error::Config(format!(
                "route prefix '{prefix}' must not end with '/'"
            )));
        }

        let upstream = wikigate_config::validate_upstream_url(&upstream)?;

        Ok(Route {
            service,
            prefix,
            upstream,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wikis() -> Route {
        RouteBuilder::new()
            .service("wikis")
            .prefix("/api/wikis")
            .upstream("http://wiki-svc:8081")
            .build()
            .unwrap()
    }

    #[test]
    fn test_route_builder() {
        let route = wikis();

        assert_eq!(route.service, "wikis");
        assert_eq!(route.prefix, "/api/wikis");
        assert_eq!(route.upstream.host_str(), Some("wiki-svc"));
        assert_eq!(route.upstream.port(), Some(8081));
    }

    #[test]
    fn test_route_builder_missing_fields() {
        let result = RouteBuilder::new().prefix("/api/wikis").build();
        assert!(result.is_err());
    }

    #[test]
    fn test_route_builder_invalid_prefix() {
        let result = RouteBuilder::new()
            .service("wikis")
            .prefix("api/wikis")
            .upstream("http://wiki-svc:8081")
            .build();
        assert!(result.is_err());

        let result = RouteBuilder::new()
            .service("wikis")
            .prefix("/api/wikis/")
            .upstream("http://wiki-svc:8081")
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_route_builder_invalid_upstream() {
        let result = RouteBuilder::new()
            .service("wikis")
            .prefix("/api/wikis")
            .upstream("wiki-svc")
            .build();

        assert!(matches!(result, Err(Error::InvalidUpstream { .. })));
    }

    #[test]
    fn test_segment_boundary_matching() {
        let route = wikis();

        assert!(route.matches("/api/wikis"));
        assert!(route.matches("/api/wikis/"));
        assert!(route.matches("/api/wikis/abc123"));
        assert!(route.matches("/api/wikis/abc123/entries"));

        assert!(!route.matches("/api/wikisx"));
        assert!(!route.matches("/api/wiki"));
        assert!(!route.matches("/api"));
        assert!(!route.matches("/other/api/wikis"));
    }

    #[test]
    fn test_root_prefix_matches_everything() {
        let route = RouteBuilder::new()
            .service("fallback")
            .prefix("/")
            .upstream("http://fallback:80")
            .build()
            .unwrap();

        assert!(route.matches("/"));
        assert!(route.matches("/anything/at/all"));
    }
}
