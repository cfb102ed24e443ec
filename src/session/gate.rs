//! Session gate: every route except login and static assets needs the token.

use axum::{
    body::Body,
    extract::State,
    http::{
        header::{AUTHORIZATION, COOKIE},
        HeaderMap, Request, StatusCode,
    },
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use rand::RngCore;

use crate::http::server::AppState;

/// Cookie carrying the portal token after login.
pub const SESSION_COOKIE: &str = "portal_token";

/// Paths reachable without a session.
fn is_public(path: &str) -> bool {
    path == "/login" || path == "/logout" || path.starts_with("/portal/assets/")
}

/// Paths answered with 401 instead of a login redirect.
fn is_machine_path(path: &str) -> bool {
    path.starts_with("/portal/api/") || path.starts_with("/portal/ws/")
}

pub async fn require_session(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let path = request.uri().path();
    if is_public(path) || is_authorized(request.headers(), &state.token) {
        return next.run(request).await;
    }

    tracing::debug!(path = %path, "Unauthenticated request");
    if is_machine_path(path) {
        (StatusCode::UNAUTHORIZED, "Unauthorized").into_response()
    } else {
        Redirect::to("/login").into_response()
    }
}

/// True when the session cookie or a bearer header carries `token`.
pub fn is_authorized(headers: &HeaderMap, token: &str) -> bool {
    if cookie_value(headers, SESSION_COOKIE) == Some(token) {
        return true;
    }
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .is_some_and(|bearer| bearer == token)
}

/// First value of cookie `name` across all `Cookie` headers.
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

/// Random 128-bit token, hex encoded.
pub fn generate_token() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn cookie_grants_access() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("theme=dark; portal_token=abc"));
        assert!(is_authorized(&headers, "abc"));
        assert!(!is_authorized(&headers, "abcd"));
    }

    #[test]
    fn bearer_grants_access() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert!(is_authorized(&headers, "abc"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(!is_authorized(&headers, "abc"));
    }

    #[test]
    fn nothing_means_no_access() {
        assert!(!is_authorized(&HeaderMap::new(), "abc"));
    }

    #[test]
    fn public_and_machine_paths() {
        assert!(is_public("/login"));
        assert!(is_public("/portal/assets/portal.css"));
        assert!(!is_public("/portal"));
        assert!(!is_public("/"));
        assert!(is_machine_path("/portal/api/mgmt/status"));
        assert!(is_machine_path("/portal/ws/terminal"));
        assert!(!is_machine_path("/portal/terminal"));
    }

    #[test]
    fn generated_tokens_are_hex_and_distinct() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }
}
