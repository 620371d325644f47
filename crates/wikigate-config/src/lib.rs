//! # Wikigate Configuration
//!
//! Configuration management with support for:
//! - Multiple formats (TOML, YAML, JSON)
//! - Environment variable expansion
//! - Validation
//! - Default values
//!
//! A [`Config`] is built once at startup and handed by reference to the
//! router, middleware and server builders. Nothing mutates it afterwards.

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod builder;
pub mod loader;
pub mod types;
pub mod validator;

pub use builder::ConfigBuilder;
pub use loader::{load_config, load_from_file, load_from_str};
pub use types::{
    Config, CorsConfig, GatewayConfig, LogFormat, LoggingConfig, ObservabilityConfig, ServiceUrls,
};
pub use validator::{validate_config, validate_upstream_url};

use std::path::Path;
use wikigate_core::{Error, Result};

/// Configuration format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML format
    Toml,
    /// YAML format
    Yaml,
    /// JSON format
    Json,
}

impl ConfigFormat {
    /// Detect format from file extension
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .ok_or_else(|| Error::Config("Unable to detect config format".to_string()))?;

        match ext {
            "toml" => Ok(ConfigFormat::Toml),
            "yaml" | "yml" => Ok(ConfigFormat::Yaml),
            "json" => Ok(ConfigFormat::Json),
            _ => Err(Error::Config(format!("Unsupported config format: {}", ext))),
        }
    }
}
