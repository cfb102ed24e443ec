//! Login and logout handlers.

use axum::{
    extract::State,
    http::header::SET_COOKIE,
    response::{Html, IntoResponse, Redirect, Response},
    Form,
};
use serde::Deserialize;

use crate::http::server::AppState;
use crate::portal::pages::LOGIN_HTML;
use crate::session::gate::SESSION_COOKIE;

/// Thirty days.
const SESSION_MAX_AGE_SECS: u64 = 30 * 24 * 60 * 60;

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub token: String,
}

pub async fn page() -> Html<&'static str> {
    Html(LOGIN_HTML)
}

pub async fn submit(State(state): State<AppState>, Form(form): Form<LoginForm>) -> Response {
    if form.token != *state.token {
        tracing::warn!("Rejected login attempt");
        return Redirect::to("/login?error=invalid").into_response();
    }

    let cookie = format!(
        "{}={}; Path=/; Max-Age={}; HttpOnly",
        SESSION_COOKIE, form.token, SESSION_MAX_AGE_SECS
    );
    tracing::info!("Portal login");
    ([(SET_COOKIE, cookie)], Redirect::to("/portal")).into_response()
}

pub async fn logout() -> Response {
    let cookie = format!("{}=; Path=/; Max-Age=0", SESSION_COOKIE);
    ([(SET_COOKIE, cookie)], Redirect::to("/login")).into_response()
}
