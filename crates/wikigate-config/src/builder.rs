//! Configuration builder

use crate::types::{Config, CorsConfig, GatewayConfig, ObservabilityConfig, ServiceUrls};
use std::net::SocketAddr;
use std::time::Duration;
use wikigate_core::{Error, Result};

/// Builder for constructing configuration programmatically
///
/// Setters may be called in any order; they are applied on [`build`].
///
/// [`build`]: ConfigBuilder::build
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    listen: Option<SocketAddr>,
    shutdown_timeout: Option<Duration>,
    required_services: Option<Vec<String>>,
    services: ServiceUrls,
    cors: Option<CorsConfig>,
}

impl ConfigBuilder {
    /// Create a new configuration builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set listen address
    pub fn listen(mut self, addr: SocketAddr) -> Self {
        self.listen = Some(addr);
        self
    }

    /// Set the graceful shutdown timeout
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = Some(timeout);
        self
    }

    /// Set the list of services that must be configured
    pub fn required_services<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_services = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Add an upstream service
    pub fn service(mut self, name: impl Into<String>, url: impl Into<String>) -> Self {
        self.services.insert(name.into(), url.into());
        self
    }

    /// Set the cross-origin policy
    pub fn cors(mut self, cors: CorsConfig) -> Self {
        self.cors = Some(cors);
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<Config> {
        let listen = self
            .listen
            .ok_or_else(|| Error::Config("listen address is required".to_string()))?;

        let mut gateway = GatewayConfig::new(listen);
        if let Some(timeout) = self.shutdown_timeout {
            gateway.shutdown_timeout = timeout;
        }
        if let Some(required) = self.required_services {
            gateway.required_services = required;
        }

        Ok(Config {
            gateway,
            services: self.services,
            cors: self.cors.unwrap_or_default(),
            observability: ObservabilityConfig::default(),
        })
    }
}
