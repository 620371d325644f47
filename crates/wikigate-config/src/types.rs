//! Configuration types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::Duration;

/// Service name to upstream base URL
pub type ServiceUrls = BTreeMap<String, String>;

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Gateway configuration
    pub gateway: GatewayConfig,

    /// Upstream base URL per logical service
    #[serde(default)]
    pub services: ServiceUrls,

    /// Cross-origin policy
    #[serde(default)]
    pub cors: CorsConfig,

    /// Observability
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Path prefix that routes to `service`, e.g. `/api/wikis`
    pub fn service_prefix(&self, service: &str) -> String {
        format!(
            "{}/{}",
            self.gateway.route_prefix.trim_end_matches('/'),
            service
        )
    }
}

/// Gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GatewayConfig {
    /// Listen address
    pub listen: SocketAddr,

    /// Prefix under which every service is mounted
    #[serde(default = "default_route_prefix")]
    pub route_prefix: String,

    /// Upstream request timeout
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Graceful shutdown timeout (wait for in-flight requests)
    #[serde(default = "default_shutdown_timeout", with = "humantime_serde")]
    pub shutdown_timeout: Duration,

    /// Services that must have an upstream URL before the gateway starts
    #[serde(default = "default_required_services")]
    pub required_services: Vec<String>,
}

impl GatewayConfig {
    /// Gateway settings with defaults for everything but the listen address
    pub fn new(listen: SocketAddr) -> Self {
        Self {
            listen,
            route_prefix: default_route_prefix(),
            request_timeout: default_timeout(),
            shutdown_timeout: default_shutdown_timeout(),
            required_services: default_required_services(),
        }
    }
}

/// Cross-origin resource sharing policy
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CorsConfig {
    /// Allowed origins; `*` allows any origin
    pub allowed_origins: Vec<String>,

    /// Request headers a browser may send
    pub allowed_headers: Vec<String>,

    /// Response headers a browser may read
    pub exposed_headers: Vec<String>,

    /// Whether cookies and auth headers may cross origins
    pub allow_credentials: bool,

    /// How long a browser may cache a preflight result
    #[serde(with = "humantime_serde")]
    pub max_age: Duration,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["http://localhost:3000".to_string()],
            allowed_headers: vec![
                "Accept".to_string(),
                "Authorization".to_string(),
                "Content-Type".to_string(),
                "X-CSRF-Token".to_string(),
                "X-Request-Id".to_string(),
            ],
            exposed_headers: vec!["Link".to_string(), "X-Request-Id".to_string()],
            allow_credentials: true,
            max_age: Duration::from_secs(300),
        }
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,

    /// Log format
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

/// Log line encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

// Default functions
fn default_route_prefix() -> String {
    "/api".to_string()
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_required_services() -> Vec<String> {
    [
        "wikis",
        "entries",
        "versions",
        "comments",
        "media",
        "auth",
        "translations",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
