//! OAuth refresh protocol and client-id discovery.
//!
//! The refresh endpoint takes `application/x-www-form-urlencoded` with
//! `refresh_token`, `client_id`, `grant_type=refresh_token`, and the current
//! access token in an `OAUTH-TOKEN` header. The response carries
//! `{access_token, refresh_token?, expires_in}` with `expires_in` in seconds;
//! an empty `refresh_token` means keep using the old one.
//!
//! The client id is discovered best-effort: `OAUTH_CLIENT_ID` env var, then
//! explicit config, then a text scan of the sibling authentication binary
//! for its embedded `clientId:"<32 hex>"` literal, then a fallback literal.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::bytes::Regex;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::errors::AuthError;
use crate::types::{OAuthKey, now_ms};

/// Default refresh endpoint.
pub const DEFAULT_REFRESH_URL: &str =
    "https://copilot.code.woa.com/api/v2/auth/oauth_token/refresh";
/// Env var overriding the refresh endpoint.
pub const ENV_REFRESH_URL_VAR: &str = "OAUTH_REFRESH_URL";
/// Env var supplying the client id directly.
pub const ENV_CLIENT_ID_VAR: &str = "OAUTH_CLIENT_ID";
/// Env var pointing at the authentication binary to scan.
pub const ENV_CLIENT_BINARY_VAR: &str = "CLAUDE_INTERNAL_BIN";
/// Fallback client id when discovery fails entirely.
pub const FALLBACK_CLIENT_ID: &str = "claude-code-internal";

static CLIENT_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"clientId:"([0-9a-f]{32})""#).expect("valid regex"));

/// Refresh endpoint configuration.
#[derive(Clone, Debug)]
pub struct RefreshConfig {
    /// Refresh endpoint URL.
    pub refresh_url: String,
    /// Explicit client id (skips discovery).
    pub client_id: Option<String>,
    /// Binary to scan for an embedded client id.
    pub client_binary: Option<PathBuf>,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        let refresh_url = std::env::var(ENV_REFRESH_URL_VAR)
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_REFRESH_URL.to_string());
        let client_binary = std::env::var(ENV_CLIENT_BINARY_VAR)
            .ok()
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .or_else(find_client_binary);
        Self {
            refresh_url,
            client_id: None,
            client_binary,
        }
    }
}

impl RefreshConfig {
    /// Resolve the client id: env var, explicit config, binary scan, fallback.
    #[must_use]
    pub fn resolve_client_id(&self) -> String {
        if let Ok(id) = std::env::var(ENV_CLIENT_ID_VAR) {
            if !id.is_empty() {
                info!(prefix = &id[..id.len().min(8)], "using client id from environment");
                return id;
            }
        }

        if let Some(id) = &self.client_id {
            return id.clone();
        }

        if let Some(binary) = &self.client_binary {
            match extract_client_id(binary) {
                Some(id) => {
                    info!(prefix = &id[..8], binary = %binary.display(), "extracted client id from binary");
                    return id;
                }
                None => {
                    warn!(binary = %binary.display(), "could not extract client id from binary");
                }
            }
        }

        warn!(
            "authentication binary not found, using fallback client id; set {ENV_CLIENT_ID_VAR} to override"
        );
        FALLBACK_CLIENT_ID.to_string()
    }
}

/// Look for the authentication binary on PATH and in the usual places.
fn find_client_binary() -> Option<PathBuf> {
    let name = "claude-internal";

    if let Ok(path_var) = std::env::var("PATH") {
        for dir in std::env::split_paths(&path_var) {
            let candidate = dir.join(name);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
    }

    let mut candidates = vec![
        PathBuf::from("/usr/local/bin").join(name),
        PathBuf::from("/usr/bin").join(name),
    ];
    if let Some(home) = dirs::home_dir() {
        candidates.push(home.join("bin").join(name));
        candidates.push(home.join(".local").join("bin").join(name));
    }
    candidates.into_iter().find(|p| p.is_file())
}

/// Scan a binary for its embedded 32-hex client id.
fn extract_client_id(binary: &Path) -> Option<String> {
    let bytes = match std::fs::read(binary) {
        Ok(b) => b,
        Err(e) => {
            debug!(binary = %binary.display(), "failed to read binary: {e}");
            return None;
        }
    };
    let captures = CLIENT_ID_RE.captures(&bytes)?;
    let id = std::str::from_utf8(captures.get(1)?.as_bytes()).ok()?;
    Some(id.to_string())
}

/// Refresh endpoint response.
#[derive(Deserialize)]
struct RefreshResponse {
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    expires_in: Option<i64>,
}

/// Call the refresh endpoint and build the replacement key.
pub async fn refresh_key(
    client: &reqwest::Client,
    config: &RefreshConfig,
    key: &OAuthKey,
) -> Result<OAuthKey, AuthError> {
    if key.refresh_token.is_empty() {
        return Err(AuthError::MissingRefreshToken);
    }

    let client_id = config.resolve_client_id();

    let response = client
        .post(&config.refresh_url)
        .header("OAUTH-TOKEN", &key.access_token)
        .form(&[
            ("refresh_token", key.refresh_token.as_str()),
            ("client_id", client_id.as_str()),
            ("grant_type", "refresh_token"),
        ])
        .send()
        .await?;

    let status = response.status().as_u16();
    if status == 401 {
        let body = response.text().await.unwrap_or_default();
        return Err(AuthError::Unauthorized(body));
    }
    if status >= 400 {
        let body = response.text().await.unwrap_or_default();
        return Err(AuthError::Refresh {
            status,
            message: body,
        });
    }

    let data: RefreshResponse = response.json().await?;
    let (Some(access_token), Some(expires_in)) = (data.access_token, data.expires_in) else {
        return Err(AuthError::InvalidKey(
            "refresh response missing access_token or expires_in".into(),
        ));
    };

    // An empty refresh_token in the response means the old one stays valid.
    let refresh_token = match data.refresh_token.filter(|t| !t.is_empty()) {
        Some(t) => t,
        None => {
            debug!("refresh response has no refresh_token, keeping the old one");
            key.refresh_token.clone()
        }
    };

    Ok(OAuthKey {
        access_token,
        refresh_token,
        expires_at: now_ms() + expires_in * 1000,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
