//! Reverse proxy handler

use crate::client::HttpClient;
use http::header::{self, HeaderMap, HeaderName, HeaderValue, InvalidHeaderValue};
use http::uri::{Authority, Scheme};
use http::{Request, Response, StatusCode, Uri, Version};
use std::fmt;
use url::Url;
use wikigate_core::response::responses;
use wikigate_core::{body, Body, ClientAddr, Error, Result};

/// Headers that describe a single transport hop and are never forwarded
const HOP_BY_HOP_HEADERS: [&str; 9] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
const X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");
const X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");

/// Where a proxy handler sends requests
#[derive(Debug, Clone)]
pub struct UpstreamTarget {
    url: Url,
    scheme: Scheme,
    authority: Authority,
    /// Base path of the upstream URL without trailing `/`; empty for root
    base_path: String,
    /// Inbound prefix removed before forwarding
    strip_prefix: String,
}

impl UpstreamTarget {
    /// Parse an upstream base URL and the inbound prefix to strip
    pub fn new(upstream_base_url: &str, strip_prefix: impl Into<String>) -> Result<Self> {
        let url = wikigate_config::validate_upstream_url(upstream_base_url)?;

        let scheme: Scheme = url
            .scheme()
            .parse()
            .map_err(|_| Error::invalid_upstream(upstream_base_url, "invalid scheme"))?;

        let host = url
            .host_str()
            .ok_or_else(|| Error::invalid_upstream(upstream_base_url, "missing host"))?;
        let authority = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        let authority: Authority = authority
            .parse()
            .map_err(|_| Error::invalid_upstream(upstream_base_url, "invalid authority"))?;

        let base_path = url.path().trim_end_matches('/').to_string();

        Ok(Self {
            url,
            scheme,
            authority,
            base_path,
            strip_prefix: strip_prefix.into(),
        })
    }

    /// The upstream authority (`host[:port]`)
    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    /// Path the upstream sees for an inbound path
    ///
    /// The prefix is removed from the start of `path`; an empty remainder
    /// becomes `/`. A non-root upstream base path is joined in front.
    pub fn forward_path(&self, path: &str) -> String {
        let rest = path.strip_prefix(self.strip_prefix.as_str()).unwrap_or(path);

        let rest = if rest.is_empty() {
            "/".to_string()
        } else if rest.starts_with('/') {
            rest.to_string()
        } else {
            format!("/{rest}")
        };

        format!("{}{}", self.base_path, rest)
    }
}

impl fmt::Display for UpstreamTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}

/// Rewrite an inbound request so it can be sent to `target`
///
/// Method and body are kept. The URI gets the upstream scheme and authority
/// and the stripped path; the query string is carried over verbatim.
/// Hop-by-hop headers are dropped, `Host` is set to the upstream authority and
/// the `X-Forwarded-*` headers describe the original request.
pub fn rewrite(req: Request<Body>, target: &UpstreamTarget) -> Result<Request<Body>> {
    let (mut parts, body) = req.into_parts();

    let inbound_host = parts.headers.get(header::HOST).cloned().or_else(|| {
        parts
            .uri
            .authority()
            .and_then(|authority| HeaderValue::from_str(authority.as_str()).ok())
    });
    let inbound_proto = parts.uri.scheme_str().unwrap_or("http").to_string();

    let path = target.forward_path(parts.uri.path());
    let path_and_query = match parts.uri.query() {
        Some(query) => format!("{path}?{query}"),
        None => path,
    };

    parts.uri = Uri::builder()
        .scheme(target.scheme.clone())
        .authority(target.authority.clone())
        .path_and_query(path_and_query)
        .build()?;
    parts.version = Version::HTTP_11;

    let headers = &mut parts.headers;
    remove_hop_by_hop(headers);

    let host = HeaderValue::from_str(target.authority.as_str())
        .map_err(|e| Error::InvalidRequest(format!("Invalid host: {e}")))?;
    headers.insert(header::HOST, host);

    if let Some(ClientAddr(addr)) = parts.extensions.get::<ClientAddr>() {
        let forwarded_for = append_forwarded_for(headers, &addr.ip().to_string())
            .map_err(|e| Error::InvalidRequest(format!("Invalid X-Forwarded-For: {e}")))?;
        headers.insert(X_FORWARDED_FOR, forwarded_for);
    }

    let proto = HeaderValue::from_str(&inbound_proto)
        .map_err(|e| Error::InvalidRequest(format!("Invalid X-Forwarded-Proto: {e}")))?;
    headers.insert(X_FORWARDED_PROTO, proto);

    if let Some(host) = inbound_host {
        headers.insert(X_FORWARDED_HOST, host);
    }

    Ok(Request::from_parts(parts, body))
}

/// Prior `X-Forwarded-For` chain with `client_ip` appended
///
/// Repeated header lines are merged in order. Values are kept as raw bytes,
/// so a hop that wrote non-ASCII text is not lost.
fn append_forwarded_for(
    headers: &HeaderMap,
    client_ip: &str,
) -> std::result::Result<HeaderValue, InvalidHeaderValue> {
    let mut chain: Vec<u8> = Vec::new();
    let prior = headers
        .get_all(&X_FORWARDED_FOR)
        .iter()
        .map(HeaderValue::as_bytes)
        .filter(|value| !value.iter().all(u8::is_ascii_whitespace));

    for value in prior {
        chain.extend_from_slice(value);
        chain.extend_from_slice(b", ");
    }
    chain.extend_from_slice(client_ip.as_bytes());

    HeaderValue::from_bytes(&chain)
}

/// Drop hop-by-hop headers, including any listed in `Connection`
pub fn remove_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in listed {
        headers.remove(name);
    }

    for name in HOP_BY_HOP_HEADERS {
        headers.remove(name);
    }
}

/// Handler forwarding requests for one route to its upstream
#[derive(Debug, Clone)]
pub struct ProxyHandler {
    target: UpstreamTarget,
    client: HttpClient,
}

impl ProxyHandler {
    /// Create a handler for `upstream_base_url`, removing `strip_prefix`
    /// from inbound paths
    ///
    /// Fails if the URL is not an absolute http(s) URL with a host.
    pub fn new(
        upstream_base_url: &str,
        strip_prefix: impl Into<String>,
        client: HttpClient,
    ) -> Result<Self> {
        Ok(Self {
            target: UpstreamTarget::new(upstream_base_url, strip_prefix)?,
            client,
        })
    }

    /// The upstream this handler forwards to
    pub fn target(&self) -> &UpstreamTarget {
        &self.target
    }

    /// Forward a request and stream the upstream response back
    ///
    /// Never fails: transport errors are logged and turned into
    /// `502 Bad Gateway`.
    pub async fn forward(&self, req: Request<Body>) -> Response<Body> {
        let method = req.method().clone();
        let path = req.uri().path().to_string();

        let result = match rewrite(req, &self.target) {
            Ok(outbound) => {
                tracing::debug!(
                    upstream = %self.target,
                    uri = %outbound.uri(),
                    "Forwarding request"
                );
                self.client.send(outbound).await
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(response) => {
                let (mut parts, incoming) = response.into_parts();
                remove_hop_by_hop(&mut parts.headers);
                Response::from_parts(parts, body::boxed(incoming))
            }
            Err(e) => {
                tracing::error!(
                    upstream = %self.target,
                    method = %method,
                    path = %path,
                    error = %e,
                    "Upstream request failed"
                );
                responses::status(StatusCode::BAD_GATEWAY)
            }
        }
    }
}
