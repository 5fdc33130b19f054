//! The upstream transport.
//!
//! A thin single-origin reverse proxy over a shared [`reqwest::Client`]:
//! path, query, body, and non-identity headers are forwarded as
//! classified (and possibly rewritten), and the upstream response is
//! streamed back. The configured identity headers stop at the gateway;
//! the backend never sees them. Gzip-encoded upstream responses are
//! decoded transparently by the client, which drops `Content-Encoding`
//! and `Content-Length` in the process, so callers always see plain
//! bytes.

use axum::{body::Body, response::Response};
use http::HeaderName;
use reqwest::{Client, Url};

use crate::{classify::RequestContext, config::GatewayConfig};

/// Connection to the single configured upstream origin.
#[derive(Debug)]
pub struct Upstream {
    client: Client,
    origin: Url,
    /// Configured identity header names, lowercased for comparison
    /// against parsed header names.
    identity_headers: [String; 2],
}

/// Upstream transport errors.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("target is not a valid URL: {0}")]
    Target(String),

    #[error("failed to build the upstream HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("upstream request failed: {0}")]
    RoundTrip(#[from] reqwest::Error),
}

impl Upstream {
    pub fn new(config: &GatewayConfig) -> Result<Self, UpstreamError> {
        let origin = config
            .target
            .parse::<Url>()
            .map_err(|err| UpstreamError::Target(err.to_string()))?;
        let client = Client::builder()
            .gzip(true)
            .build()
            .map_err(UpstreamError::Client)?;

        Ok(Self {
            client,
            origin,
            identity_headers: [
                config.user_header_name.to_ascii_lowercase(),
                config.group_header_name.to_ascii_lowercase(),
            ],
        })
    }

    /// Forward a classified request and stream the upstream response back.
    ///
    /// The context's buffered body is what goes out, so a rewritten body
    /// is forwarded without re-reading anything from the client socket.
    pub async fn forward(&self, ctx: RequestContext) -> Result<Response, UpstreamError> {
        let mut url = self.origin.clone();
        match self.origin.path().trim_end_matches('/') {
            "" => url.set_path(ctx.parts.uri.path()),
            prefix => url.set_path(&format!("{prefix}{}", ctx.parts.uri.path())),
        }
        url.set_query(ctx.parts.uri.query());

        let mut headers = http::HeaderMap::new();
        for (name, value) in ctx.parts.headers.iter() {
            if forward_request_header(name, &self.identity_headers) {
                headers.append(name.clone(), value.clone());
            }
        }

        let upstream = self
            .client
            .request(ctx.parts.method.clone(), url)
            .headers(headers)
            .body(ctx.body)
            .send()
            .await?;

        let status = upstream.status();
        let response_headers = upstream.headers().clone();

        let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
        *response.status_mut() = status;
        for (name, value) in response_headers.iter() {
            if !is_hop_by_hop(name) {
                response.headers_mut().append(name.clone(), value.clone());
            }
        }

        Ok(response)
    }
}

/// Whether a client request header should be forwarded upstream.
///
/// The configured identity headers are excluded: they are the SSO proxy's
/// contract with the gateway, not with the backend. `Host` and
/// `Content-Length` are rewritten by the client for the new origin and
/// body; `Accept-Encoding` is left to the client so that it can negotiate
/// gzip and decode the answer for us.
fn forward_request_header(name: &HeaderName, identity_headers: &[String]) -> bool {
    if identity_headers
        .iter()
        .any(|header| header == name.as_str())
    {
        return false;
    }
    !matches!(name.as_str(), "host" | "content-length" | "accept-encoding") && !is_hop_by_hop(name)
}

/// Hop-by-hop headers per RFC 7230 §6.1; never forwarded in either
/// direction.
fn is_hop_by_hop(name: &HeaderName) -> bool {
    matches!(
        name.as_str(),
        "connection"
            | "keep-alive"
            | "proxy-authenticate"
            | "proxy-authorization"
            | "te"
            | "trailer"
            | "transfer-encoding"
            | "upgrade"
    )
}
