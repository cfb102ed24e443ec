//! Streaming exchanges: relay an event stream one line at a time.
//!
//! The response body is a lazy stream pulling from the upstream body. Each
//! complete line becomes its own body frame, which hyper writes out before
//! polling for the next. When the client goes away hyper drops the body,
//! which drops the upstream connection with it.

use std::convert::Infallible;
use std::fmt::Display;

use axum::{
    body::{Body, Bytes},
    http::{
        header::{CACHE_CONTROL, CONNECTION, CONTENT_TYPE, HOST},
        Request, StatusCode, Version,
    },
    response::Response,
};
use futures_util::{stream, Stream, StreamExt};

use crate::observability::metrics;
use crate::proxy::mode::EVENT_STREAM;
use crate::proxy::types::ProxyError;
use crate::proxy::upstream::UpstreamClient;

/// Tells nginx-style front proxies not to buffer the response.
const X_ACCEL_BUFFERING: &str = "x-accel-buffering";

/// Forward `request` and relay the upstream body line by line.
pub async fn forward(
    upstream: &UpstreamClient,
    request: Request<Body>,
) -> Result<Response, ProxyError> {
    ensure_streamable(request.version())?;

    let (parts, body) = request.into_parts();
    let mut headers = parts.headers;
    headers.remove(HOST);

    let mut upstream_request = Request::builder()
        .method(parts.method)
        .uri(upstream.target_uri(&parts.uri)?)
        .body(body)
        .map_err(|e| ProxyError::InvalidTarget(e.to_string()))?;
    *upstream_request.headers_mut() = headers;

    let response = upstream.send(upstream_request).await?;
    let events = lines(Body::new(response.into_body()).into_data_stream());

    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, EVENT_STREAM)
        .header(CACHE_CONTROL, "no-cache")
        .header(CONNECTION, "keep-alive")
        .header(X_ACCEL_BUFFERING, "no")
        .body(Body::from_stream(events))
        .map_err(|e| ProxyError::InvalidTarget(e.to_string()))
}

/// HTTP/1.0 has no chunked encoding, so a response there cannot be flushed
/// piece by piece.
pub fn ensure_streamable(version: Version) -> Result<(), ProxyError> {
    if version == Version::HTTP_09 || version == Version::HTTP_10 {
        return Err(ProxyError::StreamingUnsupported(version));
    }
    Ok(())
}

/// Re-chunk `body` into newline-terminated lines.
///
/// Ends quietly on upstream EOF or on a read error; an unterminated tail at
/// EOF is not forwarded.
pub fn lines<S, E>(body: S) -> impl Stream<Item = Result<Bytes, Infallible>> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send + Unpin + 'static,
    E: Display,
{
    stream::unfold(LineSplitter::new(body), |mut splitter| async move {
        match splitter.next_line().await {
            Some(line) => {
                metrics::record_stream_line();
                Some((Ok(line), splitter))
            }
            None => None,
        }
    })
}

struct LineSplitter<S> {
    inner: S,
    buffer: Vec<u8>,
    /// Bytes of `buffer` already known to contain no newline.
    scanned: usize,
    done: bool,
}

impl<S, E> LineSplitter<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: Display,
{
    fn new(inner: S) -> Self {
        Self {
            inner,
            buffer: Vec::new(),
            scanned: 0,
            done: false,
        }
    }

    async fn next_line(&mut self) -> Option<Bytes> {
        loop {
            if let Some(pos) = self.buffer[self.scanned..].iter().position(|&b| b == b'\n') {
                let end = self.scanned + pos + 1;
                let rest = self.buffer.split_off(end);
                let line = std::mem::replace(&mut self.buffer, rest);
                self.scanned = 0;
                return Some(Bytes::from(line));
            }
            self.scanned = self.buffer.len();

            if self.done {
                return None;
            }
            match self.inner.next().await {
                Some(Ok(chunk)) => self.buffer.extend_from_slice(&chunk),
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "Stream read error");
                    self.done = true;
                }
                None => {
                    if !self.buffer.is_empty() {
                        tracing::debug!(bytes = self.buffer.len(), "Dropping unterminated stream tail");
                    }
                    self.done = true;
                }
            }
        }
    }
}
