//! Request handlers for the gateway's HTTP surface.

pub mod legacy;
pub mod messages;
pub mod native;
pub mod quota;
pub mod tokens;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use relay_core::GatewayError;

/// Build the caller-facing Anthropic error response for a gateway error.
#[must_use]
pub fn error_response(err: &GatewayError) -> Response {
    let status =
        StatusCode::from_u16(err.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(err.to_body())).into_response()
}
