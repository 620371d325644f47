//! # Wikigate Router
//!
//! Immutable prefix router mapping path prefixes to upstream services:
//! - One route per configured service, mounted at `{route_prefix}/{service}`
//! - Matching on whole path segments (`/api/wikis` never matches `/api/wikisx`)
//! - Longest prefix wins when several routes match
//!
//! The router is built once at startup and shared read-only between
//! connection tasks.

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod route;

pub use route::{Route, RouteBuilder};

use std::sync::Arc;
use wikigate_config::Config;
use wikigate_core::{Error, Result};

/// Router for matching request paths to upstream routes
#[derive(Debug, Clone)]
pub struct Router {
    /// Routes ordered by descending prefix length
    routes: Arc<[Route]>,
}

impl Router {
    /// Create a router from a set of routes
    ///
    /// Fails if two routes share the same prefix.
    pub fn new(routes: impl IntoIterator<Item = Route>) -> Result<Self> {
        let mut routes: Vec<Route> = routes.into_iter().collect();
        routes.sort_by(|a, b| {
            b.prefix
                .len()
                .cmp(&a.prefix.len())
                .then_with(|| a.prefix.cmp(&b.prefix))
        });

        if let Some(pair) = routes.windows(2).find(|w| w[0].prefix == w[1].prefix) {
            return Err(Error::Config(format!(
                "services '{}' and '{}' share prefix '{}'",
                pair[0].service, pair[1].service, pair[0].prefix
            )));
        }

        for route in &routes {
            tracing::debug!(
                service = %route.service,
                prefix = %route.prefix,
                upstream = %route.upstream,
                "Route registered"
            );
        }

        Ok(Self {
            routes: routes.into(),
        })
    }

    /// Build the router from configuration, one route per service
    pub fn from_config(config: &Config) -> Result<Self> {
        let routes = config
            .services
            .iter()
            .map(|(service, url)| {
                Route::builder()
                    .service(service.as_str())
                    .prefix(config.service_prefix(service))
                    .upstream(url.as_str())
                    .build()
            })
            .collect::<Result<Vec<_>>>()?;

        Self::new(routes)
    }

    /// Find the route owning `path`, longest prefix first
    pub fn match_route(&self, path: &str) -> Option<&Route> {
        self.routes.iter().find(|route| route.matches(path))
    }

    /// Find a route by service name
    pub fn route_for_service(&self, service: &str) -> Option<&Route> {
        self.routes.iter().find(|route| route.service == service)
    }

    /// All registered routes, longest prefix first
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Number of registered routes
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Whether no routes are registered
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wikigate_config::ConfigBuilder;

    fn route(service: &str, prefix: &str) -> Route {
        RouteBuilder::new()
            .service(service)
            .prefix(prefix)
            .upstream(format!("http://{service}-svc:8080"))
            .build()
            .unwrap()
    }

    #[test]
    fn test_router_from_config() {
        let config = ConfigBuilder::new()
            .listen("127.0.0.1:8080".parse().unwrap())
            .service("wikis", "http://wiki-svc:8081")
            .service("entries", "http://entry-svc:8082")
            .build()
            .unwrap();

        let router = Router::from_config(&config).unwrap();
        assert_eq!(router.len(), 2);

        let matched = router.match_route("/api/wikis/abc123").unwrap();
        assert_eq!(matched.service, "wikis");
        assert_eq!(matched.upstream.as_str(), "http://wiki-svc:8081/");

        let matched = router.match_route("/api/entries").unwrap();
        assert_eq!(matched.service, "entries");
    }

    #[test]
    fn test_unmatched_path() {
        let router = Router::new([route("wikis", "/api/wikis")]).unwrap();

        assert!(router.match_route("/api/media/1").is_none());
        assert!(router.match_route("/api/wikisx").is_none());
        assert!(router.match_route("/health").is_none());
    }

    #[test]
    fn test_longest_prefix_wins() {
        let router = Router::new([
            route("api", "/api"),
            route("wikis", "/api/wikis"),
            route("drafts", "/api/wikis/drafts"),
        ])
        .unwrap();

        assert_eq!(router.match_route("/api/wikis/drafts/1").unwrap().service, "drafts");
        assert_eq!(router.match_route("/api/wikis/1").unwrap().service, "wikis");
        assert_eq!(router.match_route("/api/comments").unwrap().service, "api");
    }

    #[test]
    fn test_duplicate_prefix_rejected() {
        let result = Router::new([route("wikis", "/api/wikis"), route("other", "/api/wikis")]);
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_service_url_is_fatal() {
        let config = ConfigBuilder::new()
            .listen("127.0.0.1:8080".parse().unwrap())
            .service("wikis", "not a url")
            .build()
            .unwrap();

        assert!(Router::from_config(&config).is_err());
    }

    #[test]
    fn test_route_for_service() {
        let router = Router::new([route("wikis", "/api/wikis"), route("media", "/api/media")]).unwrap();

        assert_eq!(router.route_for_service("media").unwrap().prefix, "/api/media");
        assert!(router.route_for_service("auth").is_none());
        assert!(!router.is_empty());
    }
}
