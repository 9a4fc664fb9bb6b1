//! Token counting.
//!
//! When a native upstream is configured the request is proxied to its
//! count_tokens endpoint (a beta feature, unwrapped from the success
//! envelope). On any failure — non-200, non-JSON, transport — the handler
//! degrades to the local char-based heuristic instead of failing the caller.

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use serde_json::Value;
use tracing::{info, warn};

use relay_core::GatewayError;
use relay_wire::estimate::estimate_request_tokens;
use relay_wire::models::{Upstream, map_model};

use super::error_response;
use super::native::unwrap_success_envelope;
use crate::state::AppState;

/// POST `/v1/messages/count_tokens`.
pub async fn handle(State(state): State<AppState>, body: Bytes) -> Response {
    if body.is_empty() {
        return error_response(&GatewayError::InvalidRequest("Request body is empty".into()));
    }
    let mut request: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            return error_response(&GatewayError::InvalidRequest(format!("Invalid JSON: {e}")));
        }
    };

    if let Some(native) = &state.native {
        if let Some(model) = request.get("model").and_then(Value::as_str) {
            let mapped = map_model(model, Upstream::Native);
            request["model"] = Value::String(mapped);
        }

        match native.post_count_tokens(&request).await {
            Ok(response) if response.status().is_success() => {
                match response.json::<Value>().await {
                    Ok(value) => {
                        let result = unwrap_success_envelope(value);
                        return Json(result).into_response();
                    }
                    Err(e) => {
                        warn!("count_tokens returned non-JSON, falling back to estimate: {e}");
                    }
                }
            }
            Ok(response) => {
                warn!(
                    status = response.status().as_u16(),
                    "count_tokens upstream error, falling back to estimate"
                );
            }
            Err(e) => {
                warn!("count_tokens request failed, falling back to estimate: {e}");
            }
        }
    }

    let input_tokens = estimate_request_tokens(&request);
    info!(input_tokens, "token count estimated locally");
    Json(serde_json::json!({ "input_tokens": input_tokens })).into_response()
}
