//! Gateway error taxonomy.
//!
//! Every failure the HTTP surface can report maps to an HTTP status plus an
//! Anthropic-style error type string, so handlers build the caller-visible
//! `{"type":"error","error":{...}}` envelope from one place.

/// Errors surfaced by the gateway's request paths.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Caller sent an unusable request (missing fields, invalid JSON).
    #[error("{0}")]
    InvalidRequest(String),

    /// Estimated input alone exceeds the model context window.
    #[error("{0}")]
    ContextTooLong(String),

    /// Upstream failure classified as quota exhaustion.
    #[error("{0}")]
    QuotaExhausted(String),

    /// Upstream transport failure (timeout, connect, reset).
    #[error("upstream transport error: {0}")]
    UpstreamTransport(String),

    /// Upstream request timed out.
    #[error("upstream timeout: {0}")]
    UpstreamTimeout(String),

    /// Stored credential is missing or was rejected by the upstream.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// Anything else the upstream path can produce.
    #[error("{0}")]
    Api(String),
}

impl GatewayError {
    /// HTTP status code for the caller-facing response.
    #[must_use]
    pub fn status(&self) -> u16 {
        match self {
            Self::InvalidRequest(_) | Self::ContextTooLong(_) => 400,
            Self::QuotaExhausted(_) => 429,
            Self::UpstreamTransport(_) => 502,
            Self::UpstreamTimeout(_) => 504,
            Self::AuthFailed(_) | Self::Api(_) => 500,
        }
    }

    /// Anthropic error type string for the error envelope.
    #[must_use]
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) | Self::ContextTooLong(_) => "invalid_request_error",
            Self::QuotaExhausted(_) => "rate_limit_error",
            Self::AuthFailed(_) => "api_error",
            Self::UpstreamTransport(_) | Self::UpstreamTimeout(_) | Self::Api(_) => "api_error",
        }
    }

    /// Build the caller-facing Anthropic error envelope.
    #[must_use]
    pub fn to_body(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "error",
            "error": {
                "type": self.error_type(),
                "message": self.to_string(),
            },
        })
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::UpstreamTimeout(e.to_string())
        } else if e.is_connect() || e.is_request() {
            Self::UpstreamTransport(e.to_string())
        } else {
            Self::Api(e.to_string())
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
