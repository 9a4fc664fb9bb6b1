//! Auth error types.

/// Errors from credential loading, persistence, and refresh.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The refresh endpoint rejected the credential.
    #[error("401 Unauthorized: {0}")]
    Unauthorized(String),

    /// The refresh endpoint returned a non-success status.
    #[error("refresh failed (HTTP {status}): {message}")]
    Refresh {
        /// HTTP status code.
        status: u16,
        /// Response body.
        message: String,
    },

    /// The stored key has no refresh token.
    #[error("missing refresh token")]
    MissingRefreshToken,

    /// A credential file was present but unusable.
    #[error("invalid credential: {0}")]
    InvalidKey(String),
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
