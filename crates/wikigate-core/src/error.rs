//! Error types for Wikigate

/// Result type alias using [`Error`]
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Main error type for Wikigate
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid HTTP request
    #[error("Invalid HTTP request: {0}")]
    InvalidRequest(String),

    /// Route not found
    #[error("Route not found: {0}")]
    RouteNotFound(String),

    /// Upstream connection error
    #[error("Failed to connect to upstream: {0}")]
    UpstreamConnection(String),

    /// Upstream timeout
    #[error("Upstream request timed out")]
    UpstreamTimeout,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid upstream URL
    #[error("Invalid upstream URL '{url}': {reason}")]
    InvalidUpstream {
        /// The offending URL as configured
        url: String,
        /// Why it was rejected
        reason: String,
    },

    /// Runtime error
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("HTTP error: {0}")]
    HttpError(#[from] http::Error),

    /// Internal error (should not happen in production)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Convert error to HTTP status code
    pub fn to_status_code(&self) -> http::StatusCode {
        use http::StatusCode;
        match self {
            Error::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Error::RouteNotFound(_) => StatusCode::NOT_FOUND,
            Error::UpstreamConnection(_) | Error::UpstreamTimeout => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Create an invalid-upstream error
    pub fn invalid_upstream(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidUpstream {
            url: url.into(),
            reason: reason.into(),
        }
    }
}
