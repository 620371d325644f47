//! Configuration validation

use crate::Config;
use url::Url;
use wikigate_core::{Error, Result};

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    validate_gateway(config)?;

    validate_services(config)?;

    validate_cors(config)?;

    Ok(())
}

fn validate_gateway(config: &Config) -> Result<()> {
    let gateway = &config.gateway;

    if gateway.request_timeout.is_zero() {
        return Err(Error::Config("request_timeout must be > 0".to_string()));
    }

    if gateway.request_timeout.as_secs() > 300 {
        tracing::warn!("request_timeout is very high (>5 minutes)");
    }

    if gateway.shutdown_timeout.is_zero() {
        return Err(Error::Config("shutdown_timeout must be > 0".to_string()));
    }

    if !gateway.route_prefix.starts_with('/') {
        return Err(Error::Config("route_prefix must start with '/'".to_string()));
    }

    if gateway.route_prefix.len() > 1 && gateway.route_prefix.ends_with('/') {
        return Err(Error::Config(
            "route_prefix must not end with '/'".to_string(),
        ));
    }

    Ok(())
}

fn validate_services(config: &Config) -> Result<()> {
    for (name, url) in &config.services {
        if name.is_empty() || name.contains('/') {
            return Err(Error::Config(format!(
                "service name '{name}' must be a single non-empty path segment"
            )));
        }

        validate_upstream_url(url)?;
    }

    let missing: Vec<&str> = config
        .gateway
        .required_services
        .iter()
        .filter(|name| !config.services.contains_key(name.as_str()))
        .map(String::as_str)
        .collect();

    if !missing.is_empty() {
        return Err(Error::Config(format!(
            "missing upstream URL for required service(s): {}",
            missing.join(", ")
        )));
    }

    if config.services.is_empty() {
        tracing::warn!("No services configured; every proxied request will return 404");
    }

    Ok(())
}

/// Check that `raw` is an absolute http(s) URL with a host
pub fn validate_upstream_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw).map_err(|e| Error::invalid_upstream(raw, e.to_string()))?;

    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(Error::invalid_upstream(
                raw,
                format!("unsupported scheme '{other}'"),
            ))
        }
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(Error::invalid_upstream(raw, "missing host"));
    }

    if url.query().is_some() || url.fragment().is_some() {
        return Err(Error::invalid_upstream(
            raw,
            "query and fragment are not allowed",
        ));
    }

    Ok(url)
}

fn validate_cors(config: &Config) -> Result<()> {
    for origin in &config.cors.allowed_origins {
        if origin.is_empty() {
            return Err(Error::Config("CORS origin cannot be empty".to_string()));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::*;
    use std::time::Duration;

    fn minimal_config() -> Config {
        let mut gateway = GatewayConfig::new("127.0.0.1:8080".parse().unwrap());
        gateway.required_services = vec!["wikis".to_string()];

        let mut services = ServiceUrls::new();
        services.insert("wikis".to_string(), "http://wiki-svc:8081".to_string());

        Config {
            gateway,
            services,
            cors: CorsConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }

    #[test]
    fn test_valid_minimal_config() {
        assert!(validate_config(&minimal_config()).is_ok());
    }

    #[test]
    fn test_zero_timeouts() {
        let mut config = minimal_config();
        config.gateway.request_timeout = Duration::ZERO;
        assert!(validate_config(&config).is_err());

        let mut config = minimal_config();
        config.gateway.shutdown_timeout = Duration::ZERO;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_route_prefix_shape() {
        let mut config = minimal_config();
        config.gateway.route_prefix = "api".to_string();
        assert!(validate_config(&config).is_err());

        config.gateway.route_prefix = "/api/".to_string();
        assert!(validate_config(&config).is_err());

        config.gateway.route_prefix = "/".to_string();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_missing_required_service() {
        let mut config = minimal_config();
        config.gateway.required_services.push("media".to_string());

        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("media"));
    }

    #[test]
    fn test_invalid_service_name() {
        let mut config = minimal_config();
        config
            .services
            .insert("wikis/v2".to_string(), "http://wiki-svc:8081".to_string());
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_upstream_url_validation() {
        assert!(validate_upstream_url("http://wiki-svc:8081").is_ok());
        assert!(validate_upstream_url("https://media.example.com/v1").is_ok());

        assert!(validate_upstream_url("wiki-svc:8081").is_err());
        assert!(validate_upstream_url("ftp://wiki-svc").is_err());
        assert!(validate_upstream_url("not a url").is_err());
        assert!(validate_upstream_url("http://wiki-svc:8081/?q=1").is_err());
    }

    #[test]
    fn test_malformed_service_url_is_fatal() {
        let mut config = minimal_config();
        config
            .services
            .insert("wikis".to_string(), "wiki-svc".to_string());

        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, Error::InvalidUpstream { .. }));
    }
}
