//! Embedded portal pages and assets.

use axum::{
    extract::Path,
    http::{header::CONTENT_TYPE, StatusCode},
    response::{Html, IntoResponse, Response},
};

pub const LOGIN_HTML: &str = include_str!("../../static/login.html");
const INDEX_HTML: &str = include_str!("../../static/index.html");
const TERMINAL_HTML: &str = include_str!("../../static/terminal.html");
const FILES_HTML: &str = include_str!("../../static/files.html");
const PORTAL_CSS: &str = include_str!("../../static/portal.css");

/// Everything reachable under `/portal/assets/`.
const ASSETS: &[(&str, &str)] = &[
    ("index.html", INDEX_HTML),
    ("terminal.html", TERMINAL_HTML),
    ("files.html", FILES_HTML),
    ("login.html", LOGIN_HTML),
    ("portal.css", PORTAL_CSS),
];

pub async fn home() -> Html<&'static str> {
    Html(INDEX_HTML)
}

pub async fn terminal() -> Html<&'static str> {
    Html(TERMINAL_HTML)
}

pub async fn files() -> Html<&'static str> {
    Html(FILES_HTML)
}

pub async fn asset(Path(name): Path<String>) -> Response {
    match lookup(&name) {
        Some((body, content_type)) => ([(CONTENT_TYPE, content_type)], body).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

fn lookup(name: &str) -> Option<(&'static str, &'static str)> {
    ASSETS
        .iter()
        .find(|(asset, _)| *asset == name)
        .map(|(asset, body)| (*body, content_type(asset)))
}

fn content_type(name: &str) -> &'static str {
    match name.rsplit_once('.').map(|(_, ext)| ext) {
        Some("css") => "text/css",
        Some("js") => "application/javascript",
        Some("html") => "text/html; charset=utf-8",
        _ => "application/octet-stream",
    }
}
