//! HTTP route handlers.

pub mod engines;

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::state::AppState;

/// Header carrying the shared API secret.
pub const API_TOKEN_HEADER: &str = "x-api-token";

/// Build the main Axum router with all routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    let protected = engines::routes()
        .route_layer(middleware::from_fn_with_state(state.clone(), require_token));

    Router::new()
        .merge(engines::public_routes())
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn require_token(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let provided = request
        .headers()
        .get(API_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok());

    if provided != Some(state.config.api_token.as_str()) {
        warn!(
            "Rejected {} {}: missing or invalid API token",
            request.method(),
            request.uri().path()
        );
        return (
            StatusCode::FORBIDDEN,
            Json(serde_json::json!({ "error": "Invalid API token" })),
        )
            .into_response();
    }

    next.run(request).await
}
