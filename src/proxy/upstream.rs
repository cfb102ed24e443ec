//! Client for the single upstream origin.
//!
//! One pooled hyper client serves both exchange modes. Only the connect phase
//! has a timeout; streaming responses may stay open indefinitely.

use std::time::Duration;

use axum::{
    body::Body,
    http::{
        uri::{Authority, Scheme},
        Request, Response, Uri,
    },
};
use hyper::body::Incoming;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};

use crate::config::{TimeoutConfig, UpstreamConfig};
use crate::proxy::types::ProxyError;

#[derive(Clone)]
pub struct UpstreamClient {
    scheme: Scheme,
    authority: Authority,
    base_path: String,
    client: Client<HttpConnector, Body>,
}

impl UpstreamClient {
    pub fn new(config: &UpstreamConfig, timeouts: &TimeoutConfig) -> Result<Self, ProxyError> {
        let origin: Uri = config
            .origin
            .parse()
            .map_err(|e| ProxyError::InvalidTarget(format!("{}: {}", config.origin, e)))?;
        let parts = origin.into_parts();
        let authority = parts
            .authority
            .ok_or_else(|| ProxyError::InvalidTarget(format!("{}: missing host", config.origin)))?;
        let scheme = parts.scheme.unwrap_or(Scheme::HTTP);
        let base_path = parts
            .path_and_query
            .map(|pq| pq.path().trim_end_matches('/').to_string())
            .unwrap_or_default();

        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(timeouts.connect_secs)));
        let client = Client::builder(TokioExecutor::new()).build(connector);

        Ok(Self {
            scheme,
            authority,
            base_path,
            client,
        })
    }

    /// Host (and port) of the upstream, used as the forwarded `Host`.
    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    /// Map an inbound URI (path + query) onto the upstream origin.
    pub fn target_uri(&self, inbound: &Uri) -> Result<Uri, ProxyError> {
        let path_and_query = inbound
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        let target = format!(
            "{}://{}{}{}",
            self.scheme, self.authority, self.base_path, path_and_query
        );
        target
            .parse()
            .map_err(|e| ProxyError::InvalidTarget(format!("{}: {}", target, e)))
    }

    /// Send a fully built request. Dropping the returned future aborts it.
    pub async fn send(&self, request: Request<Body>) -> Result<Response<Incoming>, ProxyError> {
        self.client
            .request(request)
            .await
            .map_err(|e| ProxyError::UpstreamUnavailable(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(origin: &str) -> UpstreamClient {
        let config = UpstreamConfig {
            origin: origin.to_string(),
            ..Default::default()
        };
        UpstreamClient::new(&config, &TimeoutConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn target_keeps_path_and_query() {
        let upstream = client("http://localhost:9001");
        let uri = upstream
            .target_uri(&"/api/chat?id=7&x=%20".parse().unwrap())
            .unwrap();
        assert_eq!(uri.to_string(), "http://localhost:9001/api/chat?id=7&x=%20");
        assert_eq!(upstream.authority().as_str(), "localhost:9001");
    }

    #[tokio::test]
    async fn origin_base_path_is_prefixed() {
        let upstream = client("http://10.1.2.3:8080/app/");
        let uri = upstream.target_uri(&"/index.html".parse().unwrap()).unwrap();
        assert_eq!(uri.to_string(), "http://10.1.2.3:8080/app/index.html");
    }

    #[test]
    fn origin_without_host_is_rejected() {
        let config = UpstreamConfig {
            origin: "/relative".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            UpstreamClient::new(&config, &TimeoutConfig::default()),
            Err(ProxyError::InvalidTarget(_))
        ));
    }
}
