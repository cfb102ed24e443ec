//! Buffered exchanges: forward, then rewrite HTML before replying.

use std::net::IpAddr;

use axum::{
    body::{Body, Bytes},
    http::{
        header::{CONTENT_LENGTH, HOST},
        HeaderValue, Method, Request, Version,
    },
    response::Response,
};

use crate::proxy::headers::{append_forwarded_for, strip_hop_by_hop};
use crate::proxy::inject::{inject_snippet, is_rewritable_html, NAV_SNIPPET};
use crate::proxy::types::ProxyError;
use crate::proxy::upstream::UpstreamClient;

/// Forward `request` as-is (apart from target and `Host`) and relay the
/// response, injecting the navigation snippet into HTML documents.
pub async fn forward(
    upstream: &UpstreamClient,
    request: Request<Body>,
    client: Option<IpAddr>,
    max_html_bytes: usize,
) -> Result<Response, ProxyError> {
    let (mut parts, body) = request.into_parts();
    let is_head = parts.method == Method::HEAD;

    parts.uri = upstream.target_uri(&parts.uri)?;
    parts.version = Version::HTTP_11;
    strip_hop_by_hop(&mut parts.headers);
    if let Some(ip) = client {
        append_forwarded_for(&mut parts.headers, ip);
    }
    let host = HeaderValue::from_str(upstream.authority().as_str())
        .map_err(|e| ProxyError::InvalidTarget(e.to_string()))?;
    parts.headers.insert(HOST, host);

    let response = upstream.send(Request::from_parts(parts, body)).await?;
    let (mut parts, body) = response.into_parts();
    strip_hop_by_hop(&mut parts.headers);

    if is_head || !is_rewritable_html(&parts.headers) {
        return Ok(Response::from_parts(parts, Body::new(body)));
    }

    let original = axum::body::to_bytes(Body::new(body), max_html_bytes)
        .await
        .map_err(|e| ProxyError::UpstreamBody(e.to_string()))?;
    let body = match inject_snippet(&original, NAV_SNIPPET.as_bytes()) {
        Some(rewritten) => Bytes::from(rewritten),
        None => original,
    };

    parts.headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
    Ok(Response::from_parts(parts, Body::from(body)))
}
