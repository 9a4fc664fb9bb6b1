//! Quota ledger endpoints (hybrid mode).

use axum::Json;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use relay_core::GatewayError;

use super::error_response;
use crate::config::ProviderMode;
use crate::state::AppState;

const RESET_POLICY: &str = "automatic reset every Monday 00:00 local time";

/// GET `/v1/quota`.
pub async fn status(State(state): State<AppState>) -> Response {
    if state.config.mode != ProviderMode::Hybrid {
        return Json(json!({
            "provider": state.config.mode.to_string(),
            "message": "Quota management is only available in hybrid mode",
        }))
        .into_response();
    }

    let Some(quota) = &state.quota else {
        return error_response(&GatewayError::Api("quota ledger not initialized".into()));
    };

    Json(json!({
        "provider": "hybrid",
        "native_api": quota.status(),
        "reset_policy": RESET_POLICY,
    }))
    .into_response()
}

/// POST `/v1/quota/reset`.
pub async fn reset(State(state): State<AppState>) -> Response {
    if state.config.mode != ProviderMode::Hybrid {
        return Json(json!({
            "provider": state.config.mode.to_string(),
            "message": "Quota management is only available in hybrid mode",
            "success": false,
        }))
        .into_response();
    }

    let Some(quota) = &state.quota else {
        return error_response(&GatewayError::Api("quota ledger not initialized".into()));
    };

    quota.reset_native();
    Json(json!({
        "success": true,
        "message": "Native upstream quota has been reset",
        "status": {
            "native_api": quota.status(),
            "reset_policy": RESET_POLICY,
        },
    }))
    .into_response()
}
