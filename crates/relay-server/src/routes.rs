//! Router assembly: the gateway's HTTP surface plus CORS and tracing layers.

use axum::http::{HeaderName, Method};
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use relay_wire::models::model_catalogue;

use crate::handlers::{messages, quota, tokens};
use crate::state::AppState;

/// Build the axum router for the given state.
#[must_use]
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/messages", post(messages::handle))
        .route("/messages", post(messages::handle))
        .route("/v1/messages/count_tokens", post(tokens::handle))
        .route("/v1/models", get(models))
        .route("/models", get(models))
        .route("/v1/quota", get(quota::status))
        .route("/v1/quota/reset", post(quota::reset))
        .route("/health", get(health))
        .route("/api/event_logging/batch", post(event_logging))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer())
}

/// CORS: open origin, the three verbs the surface uses, and the Anthropic
/// client headers.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            HeaderName::from_static("content-type"),
            HeaderName::from_static("authorization"),
            HeaderName::from_static("x-api-key"),
            HeaderName::from_static("anthropic-version"),
        ])
        .max_age(std::time::Duration::from_secs(86_400))
}

/// GET `/health`.
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// GET `/v1/models` — the static catalogue.
async fn models() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "object": "list",
        "data": model_catalogue(),
    }))
}

/// POST `/api/event_logging/batch` — client telemetry, acknowledged and
/// dropped.
async fn event_logging() -> Json<serde_json::Value> {
    Json(serde_json::json!({"success": true}))
}
