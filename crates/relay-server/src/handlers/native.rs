//! Native upstream passthrough.
//!
//! The native upstream already speaks Anthropic wire format, so the body is
//! forwarded untyped: only the model name is mapped and reserved billing
//! headers are stripped from `system`. Streams are relayed byte for byte.
//!
//! The upstream status is inspected before anything is written to the caller,
//! which is what makes hybrid failover safe: a quota-classified error here
//! returns [`NativeOutcome::QuotaExhausted`] with zero caller bytes sent.

use axum::Json;
use axum::body::Body;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde_json::Value;
use tracing::{info, warn};

use relay_quota::is_quota_exhausted_error;
use relay_wire::models::{Upstream, map_model};
use relay_wire::rewrite::filter_system_value;

use super::error_response;
use crate::upstream::NativeUpstream;

/// Result of a native attempt.
pub enum NativeOutcome {
    /// A response was produced for the caller.
    Served(Response),
    /// Quota-classified upstream error before any caller bytes; the router
    /// may fail over.
    QuotaExhausted {
        /// Upstream HTTP status.
        status: u16,
        /// Upstream error body.
        body: String,
    },
}

/// Forward one request to the native upstream.
///
/// `allow_failover` is set by the hybrid router; when false, quota errors are
/// relayed to the caller like any other upstream error.
pub async fn serve(native: &NativeUpstream, mut request: Value, allow_failover: bool) -> NativeOutcome {
    let stream = request["stream"].as_bool().unwrap_or(false);

    if let Some(model) = request.get("model").and_then(Value::as_str) {
        let mapped = map_model(model, Upstream::Native);
        if mapped != model {
            info!(from = model, to = %mapped, "mapped model for native upstream");
        }
        request["model"] = Value::String(mapped);
    }

    if let Some(system) = request.get_mut("system") {
        *system = filter_system_value(system.take());
    }

    let response = match native.post_messages(&request).await {
        Ok(r) => r,
        Err(e) => {
            warn!("native upstream request failed: {e}");
            return NativeOutcome::Served(error_response(&e));
        }
    };

    let status = response.status();
    if !status.is_success() {
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("text/plain")
            .to_string();
        let body = response.text().await.unwrap_or_default();

        if allow_failover && is_quota_exhausted_error(status.as_u16(), &body) {
            return NativeOutcome::QuotaExhausted {
                status: status.as_u16(),
                body,
            };
        }

        warn!(status = status.as_u16(), "native upstream error");
        return NativeOutcome::Served(relay_raw(status, &content_type, body));
    }

    if stream {
        // Relay the SSE byte stream untouched.
        let response = Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "text/event-stream; charset=utf-8")
            .header(header::CACHE_CONTROL, "no-cache")
            .body(Body::from_stream(response.bytes_stream()))
            .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response());
        return NativeOutcome::Served(response);
    }

    // Non-stream: the upstream wraps successes as {"type":"success","data":{…}}.
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("text/plain")
        .to_string();
    let body = response.text().await.unwrap_or_default();
    match serde_json::from_str::<Value>(&body) {
        Ok(value) => {
            let result = unwrap_success_envelope(value);
            NativeOutcome::Served(Json(result).into_response())
        }
        Err(_) => {
            warn!(status = status.as_u16(), "native upstream returned non-JSON body");
            NativeOutcome::Served(relay_raw(status, &content_type, body))
        }
    }
}

/// Pull `.data` out of a `{"type":"success","data":{…}}` envelope; anything
/// already in Anthropic shape passes through.
#[must_use]
pub fn unwrap_success_envelope(value: Value) -> Value {
    if value.get("type").and_then(Value::as_str) == Some("success") {
        if let Some(data) = value.get("data") {
            return data.clone();
        }
    }
    value
}

/// Relay an upstream body as-is with its original status and content type.
fn relay_raw(status: reqwest::StatusCode, content_type: &str, body: String) -> Response {
    Response::builder()
        .status(StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::BAD_GATEWAY))
        .header(header::CONTENT_TYPE, content_type)
        .body(Body::from(body))
        .unwrap_or_else(|_| StatusCode::BAD_GATEWAY.into_response())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
