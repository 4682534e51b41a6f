//! Engine trigger routes.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, put};
use axum::{Json, Router};
use tracing::{error, info};

use recofine_runtime::EngineKind;

use crate::state::AppState;

/// Routes reachable without the API token.
pub fn public_routes() -> Router<Arc<AppState>> {
    Router::new().route("/up", get(up))
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/{engine}/train", put(train))
        .route("/{engine}/train/wait", put(train_wait))
        .route("/engines/{engine}/checkpoints", get(checkpoints))
}

async fn up() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "up": true }))
}

fn parse_engine(engine: &str) -> Result<EngineKind, Response> {
    engine.parse::<EngineKind>().map_err(|e| {
        (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": e.to_string() })),
        )
            .into_response()
    })
}

/// PUT /{engine}/train: start the engine and return immediately.
async fn train(State(state): State<Arc<AppState>>, Path(engine): Path<String>) -> Response {
    let kind = match parse_engine(&engine) {
        Ok(kind) => kind,
        Err(response) => return response,
    };

    info!("Starting {} in background", kind.checkpoint_name());
    tokio::task::spawn_blocking(move || {
        if let Err(e) = state.orchestrator.run(kind, &state.store) {
            error!("Background {} run failed: {}", kind.checkpoint_name(), e);
        }
    });

    (
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "started": true })),
    )
        .into_response()
}

/// PUT /{engine}/train/wait: run the engine to completion.
async fn train_wait(State(state): State<Arc<AppState>>, Path(engine): Path<String>) -> Response {
    let kind = match parse_engine(&engine) {
        Ok(kind) => kind,
        Err(response) => return response,
    };

    let result =
        tokio::task::spawn_blocking(move || state.orchestrator.run(kind, &state.store)).await;

    match result {
        Ok(Ok(report)) => Json(serde_json::json!({
            "status": true,
            "message": format!("{} engine performed in {}ms", kind.checkpoint_name(), report.duration_ms),
            "report": report,
        }))
        .into_response(),
        Ok(Err(e)) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({
                "status": false,
                "message": e.to_string(),
                "retryable": e.is_retryable(),
            })),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({
                "status": false,
                "message": format!("{} task failed: {}", kind.checkpoint_name(), e),
            })),
        )
            .into_response(),
    }
}

/// GET /engines/{engine}/checkpoints
async fn checkpoints(State(state): State<Arc<AppState>>, Path(engine): Path<String>) -> Response {
    let kind = match parse_engine(&engine) {
        Ok(kind) => kind,
        Err(response) => return response,
    };

    match state.store.checkpoints(kind.checkpoint_name()) {
        Ok(rows) => Json(serde_json::json!({
            "engine": kind,
            "checkpoints": rows,
        }))
        .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}
