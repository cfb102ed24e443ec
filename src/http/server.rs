//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build the Axum router: portal routes, terminal socket, proxy fallback
//! - Wire up middleware (request ID, tracing, session gate, API timeout)
//! - Bind the server to a listener and drain on shutdown

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::PortalConfig;
use crate::http::request::request_id;
use crate::http::websocket;
use crate::observability::metrics;
use crate::portal::{files, mgmt, pages, FileStore, Supervisor};
use crate::proxy::{ExchangeMode, Proxy, ProxyError};
use crate::session::{self, login};
use crate::terminal::{ProcessLauncher, ShellLauncher};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<PortalConfig>,
    pub token: Arc<str>,
    pub proxy: Proxy,
    pub files: FileStore,
    pub launcher: Arc<dyn ProcessLauncher>,
    pub supervisor: Arc<Supervisor>,
}

/// HTTP server for the portal.
pub struct HttpServer {
    router: Router,
    config: Arc<PortalConfig>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    ///
    /// Without a configured token a random one is generated and logged.
    pub fn new(config: PortalConfig) -> Result<Self, ProxyError> {
        let config = Arc::new(config);
        let token: Arc<str> = match &config.auth.token {
            Some(token) => Arc::from(token.as_str()),
            None => {
                let token = session::generate_token();
                tracing::info!(token = %token, "Generated portal access token");
                Arc::from(token)
            }
        };

        let state = AppState {
            proxy: Proxy::new(&config.upstream, &config.timeouts)?,
            files: FileStore::new(&config.files),
            launcher: Arc::new(ShellLauncher::new(&config.terminal)),
            supervisor: Arc::new(Supervisor::new(config.backend.clone())),
            token,
            config: config.clone(),
        };

        let router = Self::build_router(&config, state);
        Ok(Self { router, config })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &PortalConfig, state: AppState) -> Router {
        let api = Router::new()
            .route("/files", get(files::list_root).post(files::create_in_root))
            .route("/files/", get(files::list_root).post(files::create_in_root))
            .route(
                "/files/{*path}",
                get(files::list_dir)
                    .post(files::create_entry)
                    .delete(files::remove_entry),
            )
            .route(
                "/file/{*path}",
                get(files::read_file)
                    .put(files::write_file)
                    .post(files::rename_file),
            )
            .route("/mgmt/status", get(mgmt::status))
            .route("/mgmt/token", get(mgmt::token))
            .route("/mgmt/start", post(mgmt::start))
            .route("/mgmt/stop", post(mgmt::stop))
            .route("/mgmt/restart", post(mgmt::restart))
            .route("/mgmt/check-update", get(mgmt::check_update).post(mgmt::check_update))
            .route("/mgmt/update", post(mgmt::update))
            .route("/mgmt/backups", get(mgmt::backups))
            .route("/mgmt/rollback", post(mgmt::rollback))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.api_secs)));

        Router::new()
            .route("/login", get(login::page).post(login::submit))
            .route("/logout", get(login::logout))
            .route("/portal/assets/{*asset}", get(pages::asset))
            .route("/portal", get(pages::home))
            .route("/portal/", get(pages::home))
            .route("/portal/terminal", get(pages::terminal))
            .route("/portal/files", get(pages::files))
            .route("/portal/ws/terminal", get(websocket::terminal_upgrade))
            .nest("/portal/api", api)
            .fallback(proxy_handler)
            .layer(middleware::from_fn_with_state(
                state.clone(),
                session::require_session,
            ))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id()),
            )
    }

    /// Run the server until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = %self.config.upstream.origin,
            "HTTP server starting"
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &PortalConfig {
        &self.config
    }
}

/// Everything not claimed by the portal goes upstream.
async fn proxy_handler(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let start_time = Instant::now();
    let request_id = request_id(request.headers()).to_string();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let mode = ExchangeMode::detect(request.uri(), request.headers());

    tracing::debug!(
        request_id = %request_id,
        method = %method,
        path = %path,
        mode = mode.as_str(),
        "Proxying request"
    );

    match state.proxy.forward(mode, request, Some(addr.ip())).await {
        Ok(response) => {
            metrics::record_request(method.as_str(), response.status().as_u16(), mode.as_str(), start_time);
            response
        }
        Err(e) => {
            tracing::error!(
                request_id = %request_id,
                path = %path,
                error = %e,
                "Upstream error"
            );
            metrics::record_request(method.as_str(), e.status().as_u16(), mode.as_str(), start_time);
            e.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header::AUTHORIZATION, StatusCode};
    use tower::ServiceExt;

    fn server() -> HttpServer {
        let mut config = PortalConfig::default();
        config.auth.token = Some("t0ken".to_string());
        HttpServer::new(config).unwrap()
    }

    #[tokio::test]
    async fn responses_carry_a_request_id() {
        let response = server()
            .router
            .oneshot(Request::get("/login").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn bearer_token_opens_the_api() {
        let router = server().router;

        let denied = router
            .clone()
            .oneshot(Request::get("/portal/api/mgmt/token").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(denied.status(), StatusCode::UNAUTHORIZED);

        let allowed = router
            .oneshot(
                Request::get("/portal/api/mgmt/token")
                    .header(AUTHORIZATION, "Bearer t0ken")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(allowed.status(), StatusCode::OK);
        let body = axum::body::to_bytes(allowed.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], br#"{"token":"t0ken"}"#);
    }

    #[test]
    fn generates_a_token_when_none_is_configured() {
        let server = HttpServer::new(PortalConfig::default()).unwrap();
        assert!(server.config().auth.token.is_none());
    }
}
