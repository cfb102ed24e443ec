//! `/portal/api/mgmt/*` handlers.
//!
//! Failures are reported in the body as `{"success": false, "error": ...}`
//! with status 200 so the portal page can show them inline.

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::http::server::AppState;
use crate::portal::supervisor::SupervisorError;

#[derive(Debug, Deserialize)]
pub struct RollbackRequest {
    pub backup_name: String,
}

fn reply<T: Serialize>(result: Result<T, SupervisorError>) -> Json<Value> {
    match result {
        Ok(report) => Json(serde_json::to_value(report).unwrap_or(Value::Null)),
        Err(e) => {
            tracing::warn!(error = %e, "Management operation failed");
            let mut body = json!({ "success": false, "error": e.to_string() });
            if let Some(output) = e.output() {
                body["output"] = Value::String(output.to_string());
            }
            Json(body)
        }
    }
}

pub async fn status(State(state): State<AppState>) -> Json<Value> {
    reply(Ok(state.supervisor.status().await))
}

pub async fn token(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "token": &*state.token }))
}

pub async fn start(State(state): State<AppState>) -> Json<Value> {
    reply(state.supervisor.start().await)
}

pub async fn stop(State(state): State<AppState>) -> Json<Value> {
    reply(Ok(state.supervisor.stop().await))
}

pub async fn restart(State(state): State<AppState>) -> Json<Value> {
    reply(state.supervisor.restart().await)
}

pub async fn check_update(State(state): State<AppState>) -> Json<Value> {
    reply(state.supervisor.check_update().await)
}

pub async fn update(State(state): State<AppState>) -> Json<Value> {
    reply(state.supervisor.update().await)
}

pub async fn backups(State(state): State<AppState>) -> Json<Value> {
    match state.supervisor.backups().await {
        Ok(backups) => Json(json!({ "success": true, "backups": backups })),
        Err(e) => reply::<()>(Err(e)),
    }
}

pub async fn rollback(
    State(state): State<AppState>,
    request: Result<Json<RollbackRequest>, JsonRejection>,
) -> Json<Value> {
    let Ok(Json(request)) = request else {
        return Json(json!({ "success": false, "error": "Invalid request" }));
    };
    reply(state.supervisor.rollback(&request.backup_name).await)
}
