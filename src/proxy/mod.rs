//! Reverse proxy to the single upstream service.
//!
//! # Data Flow
//! ```text
//! inbound request
//!     → mode.rs (buffered or streaming, decided once)
//!     → buffered.rs  → upstream.rs → HTML snippet injection (inject.rs)
//!     → streaming.rs → upstream.rs → line-by-line relay
//! ```
//!
//! # Design Decisions
//! - One upstream, no retries: upstream failure is a 502
//! - Cancellation follows ownership: dropping the handler future or the
//!   response body drops the upstream request
//! - Streaming responses have no timeout

pub mod buffered;
pub mod headers;
pub mod inject;
pub mod mode;
pub mod streaming;
pub mod types;
pub mod upstream;

use std::net::IpAddr;

use axum::{body::Body, http::Request, response::Response};

use crate::config::{TimeoutConfig, UpstreamConfig};

pub use types::{ExchangeMode, ProxyError};
pub use upstream::UpstreamClient;

/// Dispatches each exchange to the buffered or streaming path.
#[derive(Clone)]
pub struct Proxy {
    upstream: UpstreamClient,
    max_html_bytes: usize,
}

impl Proxy {
    pub fn new(config: &UpstreamConfig, timeouts: &TimeoutConfig) -> Result<Self, ProxyError> {
        Ok(Self {
            upstream: UpstreamClient::new(config, timeouts)?,
            max_html_bytes: config.max_html_bytes,
        })
    }

    /// Forward one request in the given mode.
    pub async fn forward(
        &self,
        mode: ExchangeMode,
        request: Request<Body>,
        client: Option<IpAddr>,
    ) -> Result<Response, ProxyError> {
        match mode {
            ExchangeMode::Buffered => {
                buffered::forward(&self.upstream, request, client, self.max_html_bytes).await
            }
            ExchangeMode::Streaming => streaming::forward(&self.upstream, request).await,
        }
    }
}
