//! Legacy upstream path: full protocol transcoding.
//!
//! The request is transcoded into chat-completions format and the upstream is
//! always called in streaming mode. Streaming callers get the Anthropic SSE
//! sequence driven live by [`StreamTranscoder`]; non-streaming callers get
//! the same stream buffered through [`ResponseCollector`].
//!
//! On the streaming path `message_start` is written before the upstream call,
//! so upstream failures after that point surface as a terminal `error` event
//! rather than an HTTP status. A caller disconnect drops the body stream,
//! which cancels the upstream read silently.

use std::sync::Arc;

use axum::Json;
use axum::body::Body;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures::StreamExt;
use serde_json::Value;
use tracing::{info, warn};

use relay_core::GatewayError;
use relay_core::sse::{data_frames, decode_frame};
use relay_quota::is_quota_exhausted_error;
use relay_wire::anthropic::{MessagesRequest, StreamEvent, StreamError};
use relay_wire::estimate::estimate_chat_tokens;
use relay_wire::legacy::ChatChunk;
use relay_wire::models::{Upstream, map_model};
use relay_wire::transcode::{ResponseCollector, StreamTranscoder, TranscodeOptions, build_chat_request};

use super::error_response;
use crate::state::AppState;
use crate::upstream::LegacyUpstream;

/// Serve one request through the legacy upstream.
pub async fn serve(state: &AppState, upstream: Arc<LegacyUpstream>, request: &Value) -> Response {
    let typed: MessagesRequest = match serde_json::from_value(request.clone()) {
        Ok(r) => r,
        Err(e) => {
            return error_response(&GatewayError::InvalidRequest(format!(
                "malformed request: {e}"
            )));
        }
    };

    let mapped = map_model(&typed.model, Upstream::Legacy);
    info!(from = %typed.model, to = %mapped, stream = typed.stream, "routing to legacy upstream");

    let options = TranscodeOptions {
        context_window: state.config.context_window,
        max_output_tokens: state.config.max_output_tokens,
    };
    let chat = match build_chat_request(&typed, &mapped, &options) {
        Ok(c) => c,
        Err(e) => return error_response(&e),
    };
    let estimated_input = estimate_chat_tokens(&chat.messages);

    if typed.stream {
        stream_response(upstream, chat, typed.model, estimated_input)
    } else {
        collect_response(upstream, chat, typed.model, estimated_input).await
    }
}

/// Streaming path: an SSE body driving the transcoder state machine.
fn stream_response(
    upstream: Arc<LegacyUpstream>,
    chat: relay_wire::legacy::ChatRequest,
    original_model: String,
    estimated_input: u64,
) -> Response {
    let body_stream = async_stream::stream! {
        let mut transcoder = StreamTranscoder::new(original_model, estimated_input);
        yield Ok::<Bytes, std::convert::Infallible>(Bytes::from(transcoder.message_start().to_sse()));

        let response = match upstream.post_chat(&chat).await {
            Ok(r) => r,
            Err(e) => {
                warn!("legacy upstream request failed: {e}");
                yield Ok(Bytes::from(terminal_error(e.error_type(), &e.to_string())));
                return;
            }
        };

        let status = response.status().as_u16();
        if status >= 400 {
            let body = response.text().await.unwrap_or_default();
            warn!(status, "legacy upstream error");
            let (error_type, message) = classify_upstream_error(status, &body);
            yield Ok(Bytes::from(terminal_error(error_type, &message)));
            return;
        }

        let frames = data_frames(Box::pin(response.bytes_stream()));
        futures::pin_mut!(frames);
        while let Some(frame) = frames.next().await {
            if let Some(chunk) = decode_frame::<ChatChunk>(&frame) {
                for event in transcoder.on_chunk(&chunk) {
                    yield Ok(Bytes::from(event.to_sse()));
                }
            }
        }

        for event in transcoder.finish() {
            yield Ok(Bytes::from(event.to_sse()));
        }
    };

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream; charset=utf-8")
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(body_stream))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

/// Non-streaming path: buffer the upstream stream into one response object.
async fn collect_response(
    upstream: Arc<LegacyUpstream>,
    chat: relay_wire::legacy::ChatRequest,
    original_model: String,
    estimated_input: u64,
) -> Response {
    let response = match upstream.post_chat(&chat).await {
        Ok(r) => r,
        Err(e) => return error_response(&e),
    };

    let status = response.status().as_u16();
    if status >= 400 {
        let body = response.text().await.unwrap_or_default();
        warn!(status, "legacy upstream error");
        let err = if is_quota_exhausted_error(status, &body) {
            GatewayError::QuotaExhausted(format!("API quota exhausted (HTTP {status}): {body}"))
        } else {
            GatewayError::Api(format!("legacy upstream error (HTTP {status}): {body}"))
        };
        return error_response(&err);
    }

    let mut collector = ResponseCollector::new();
    let frames = data_frames(Box::pin(response.bytes_stream()));
    futures::pin_mut!(frames);
    while let Some(frame) = frames.next().await {
        if let Some(chunk) = decode_frame::<ChatChunk>(&frame) {
            collector.on_chunk(&chunk);
        }
    }

    let message = collector.into_response(&original_model, estimated_input);
    info!(
        blocks = message.content.len(),
        stop_reason = message.stop_reason.as_deref().unwrap_or(""),
        "legacy response collected"
    );
    Json(message).into_response()
}

/// A terminal SSE `error` event.
fn terminal_error(error_type: &str, message: &str) -> String {
    StreamEvent::Error {
        error: StreamError {
            error_type: error_type.to_string(),
            message: message.to_string(),
        },
    }
    .to_sse()
}

/// Map an upstream error body to the SSE error type and message.
fn classify_upstream_error(status: u16, body: &str) -> (&'static str, String) {
    if is_quota_exhausted_error(status, body) {
        (
            "rate_limit_error",
            format!("API quota exhausted (HTTP {status}): {body}"),
        )
    } else {
        (
            "api_error",
            format!("legacy upstream error (HTTP {status}): {body}"),
        )
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_error_is_an_sse_error_event() {
        let sse = terminal_error("api_error", "boom");
        assert!(sse.starts_with("event: error\n"));
        assert!(sse.contains(r#""type":"error""#));
        assert!(sse.contains(r#""message":"boom""#));
    }

    #[test]
    fn quota_bodies_classify_as_rate_limit() {
        let (kind, msg) = classify_upstream_error(403, "rate limit reached");
        assert_eq!(kind, "rate_limit_error");
        assert!(msg.contains("quota exhausted"));

        let (kind, _) = classify_upstream_error(500, "internal error");
        assert_eq!(kind, "api_error");
    }
}
