//! Proxy exchange types and error definitions.

use axum::http::{StatusCode, Version};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// How the upstream response is shaped for the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeMode {
    /// Whole response read, HTML rewritten, then relayed.
    Buffered,
    /// Response relayed line by line as it arrives.
    Streaming,
}

impl ExchangeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExchangeMode::Buffered => "buffered",
            ExchangeMode::Streaming => "streaming",
        }
    }
}

/// Errors that end a proxy exchange.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// Connecting to or sending to the upstream failed.
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// The upstream response body could not be read for rewriting.
    #[error("failed to read upstream body: {0}")]
    UpstreamBody(String),

    /// The inbound connection cannot receive an incrementally flushed body.
    #[error("streaming not supported over {0:?}")]
    StreamingUnsupported(Version),

    /// The upstream request could not be constructed.
    #[error("invalid upstream target: {0}")]
    InvalidTarget(String),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::UpstreamUnavailable(_) | ProxyError::UpstreamBody(_) => {
                StatusCode::BAD_GATEWAY
            }
            ProxyError::StreamingUnsupported(_) | ProxyError::InvalidTarget(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let message = match self {
            ProxyError::UpstreamUnavailable(_) | ProxyError::UpstreamBody(_) => {
                "Upstream request failed"
            }
            ProxyError::StreamingUnsupported(_) => "Streaming not supported",
            ProxyError::InvalidTarget(_) => "Invalid upstream target",
        };
        (self.status(), message).into_response()
    }
}
