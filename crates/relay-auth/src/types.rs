//! Credential record types.
//!
//! Field names are camelCase on the wire to match the on-disk
//! `config.json` written by the external authentication tool.

use serde::{Deserialize, Serialize};

/// Sentinel `expires_at` for keys with no expiration (externally managed).
pub const NO_EXPIRY: i64 = 0;

/// One OAuth credential record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthKey {
    /// Opaque access token, non-empty.
    pub access_token: String,
    /// Refresh token; empty for static-token mode.
    #[serde(default)]
    pub refresh_token: String,
    /// Expiry in milliseconds since epoch; `0` = no expiration.
    #[serde(default)]
    pub expires_at: i64,
}

impl OAuthKey {
    /// A static key: an access token with no refresh machinery.
    #[must_use]
    pub fn static_token(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: String::new(),
            expires_at: NO_EXPIRY,
        }
    }

    /// Whether this key is static (never refreshed, never displaced).
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.expires_at == NO_EXPIRY
    }
}

/// Current system time in milliseconds since the Unix epoch.
#[must_use]
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
