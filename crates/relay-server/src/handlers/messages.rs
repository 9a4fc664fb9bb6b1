//! The per-request router.
//!
//! Validates the request, then dispatches by mode: native passthrough,
//! legacy transcoding, or hybrid. Hybrid prefers the native upstream while
//! the quota ledger allows it and re-issues the original request through the
//! legacy path when the native upstream reports quota exhaustion — always
//! before any response bytes have reached the caller.

use axum::body::Bytes;
use axum::extract::State;
use axum::response::Response;
use serde_json::Value;
use tracing::{info, warn};

use relay_core::GatewayError;

use super::{error_response, legacy, native};
use crate::config::ProviderMode;
use crate::state::AppState;

/// POST `/v1/messages`.
pub async fn handle(State(state): State<AppState>, body: Bytes) -> Response {
    if body.is_empty() {
        return error_response(&GatewayError::InvalidRequest("Request body is empty".into()));
    }
    let request: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            return error_response(&GatewayError::InvalidRequest(format!("Invalid JSON: {e}")));
        }
    };

    if request.get("model").is_none() {
        return error_response(&GatewayError::InvalidRequest(
            "Missing required parameter: model".into(),
        ));
    }
    if request.get("messages").is_none() {
        return error_response(&GatewayError::InvalidRequest(
            "Missing required parameter: messages".into(),
        ));
    }

    info!(
        model = request["model"].as_str().unwrap_or(""),
        stream = request["stream"].as_bool().unwrap_or(false),
        messages = request["messages"].as_array().map_or(0, Vec::len),
        "messages request received"
    );

    match state.config.mode {
        ProviderMode::Native => serve_native_only(&state, request).await,
        ProviderMode::Legacy => serve_legacy_only(&state, &request).await,
        ProviderMode::Hybrid => serve_hybrid(&state, request).await,
    }
}

async fn serve_native_only(state: &AppState, request: Value) -> Response {
    let Some(native) = &state.native else {
        return error_response(&GatewayError::AuthFailed(
            "native upstream is not configured".into(),
        ));
    };
    match native::serve(native, request, false).await {
        native::NativeOutcome::Served(response) => response,
        // Unreachable with allow_failover = false; surface it anyway.
        native::NativeOutcome::QuotaExhausted { status, body } => error_response(
            &GatewayError::QuotaExhausted(format!("HTTP {status}: {body}")),
        ),
    }
}

async fn serve_legacy_only(state: &AppState, request: &Value) -> Response {
    let Some(upstream) = &state.legacy else {
        return error_response(&GatewayError::AuthFailed(
            "legacy upstream is not configured".into(),
        ));
    };
    legacy::serve(state, upstream.clone(), request).await
}

async fn serve_hybrid(state: &AppState, request: Value) -> Response {
    let Some(quota) = &state.quota else {
        return error_response(&GatewayError::Api("quota ledger not initialized".into()));
    };

    let native = state.native.as_ref().filter(|_| quota.is_native_available());

    if let Some(native) = native {
        quota.record_request();
        match native::serve(native, request.clone(), true).await {
            native::NativeOutcome::Served(response) => response,
            native::NativeOutcome::QuotaExhausted { status, body } => {
                warn!(status, "native quota exhausted, failing over to legacy upstream");
                quota.mark_native_exhausted(&body);
                match &state.legacy {
                    Some(upstream) => legacy::serve(state, upstream.clone(), &request).await,
                    None => error_response(&GatewayError::QuotaExhausted(format!(
                        "HTTP {status}: {body}"
                    ))),
                }
            }
        }
    } else {
        info!("native upstream exhausted or unavailable, using legacy upstream");
        let Some(upstream) = &state.legacy else {
            return error_response(&GatewayError::AuthFailed(
                "legacy upstream is not configured".into(),
            ));
        };
        quota.record_request();
        legacy::serve(state, upstream.clone(), &request).await
    }
}
