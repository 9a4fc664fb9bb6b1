//! Gateway configuration.

use std::path::PathBuf;
use std::time::Duration;

use relay_auth::sources::default_config_path;
use relay_auth::store::DEFAULT_REFRESH_BUFFER_MS;
use relay_auth::watcher::poll_interval_from_env;

/// Which backend serves `/v1/messages`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
#[clap(rename_all = "lowercase")]
pub enum ProviderMode {
    /// Native Anthropic-format upstream only (passthrough).
    Native,
    /// Legacy chat-completions upstream only (transcoding).
    Legacy,
    /// Native preferred, legacy fallback on quota exhaustion.
    Hybrid,
}

impl std::fmt::Display for ProviderMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Native => "native",
            Self::Legacy => "legacy",
            Self::Hybrid => "hybrid",
        };
        f.write_str(name)
    }
}

/// Env var overriding the refresh buffer (milliseconds).
pub const ENV_REFRESH_BUFFER_VAR: &str = "KEY_REFRESH_BUFFER_MS";

/// Default native upstream base URL.
pub const DEFAULT_NATIVE_BASE_URL: &str =
    "https://copilot.code.woa.com/server/chat/codebuddy-gateway/codebuddy-code";
/// Default legacy chat-completions endpoint.
pub const DEFAULT_LEGACY_CHAT_URL: &str = "https://copilot.tencent.com/v2/chat/completions";

/// Full gateway configuration.
#[derive(Clone, Debug)]
pub struct GatewayConfig {
    /// Bind host.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Routing mode.
    pub mode: ProviderMode,
    /// Native upstream base URL (`/v1/messages` is appended).
    pub native_base_url: String,
    /// Legacy chat-completions URL.
    pub legacy_chat_url: String,
    /// Quota state file.
    pub quota_file: PathBuf,
    /// Dynamic credential config file.
    pub credential_file: PathBuf,
    /// Legacy auth file override (None = discover).
    pub legacy_auth_file: Option<PathBuf>,
    /// Upstream request timeout.
    pub request_timeout: Duration,
    /// Model context window for the pre-flight budget check.
    pub context_window: u64,
    /// Optional output-token cap (None = no cap).
    pub max_output_tokens: Option<u32>,
    /// Credential expiry buffer in milliseconds.
    pub refresh_buffer_ms: i64,
    /// Credential file poll interval.
    pub watcher_interval: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        let refresh_buffer_ms = std::env::var(ENV_REFRESH_BUFFER_VAR)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_REFRESH_BUFFER_MS);
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            mode: ProviderMode::Legacy,
            native_base_url: DEFAULT_NATIVE_BASE_URL.to_string(),
            legacy_chat_url: DEFAULT_LEGACY_CHAT_URL.to_string(),
            quota_file: PathBuf::from("quota_state.json"),
            credential_file: default_config_path(),
            legacy_auth_file: None,
            request_timeout: Duration::from_secs(300),
            context_window: 200_000,
            max_output_tokens: None,
            refresh_buffer_ms,
            watcher_interval: poll_interval_from_env(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = GatewayConfig::default();
        assert_eq!(cfg.host, "0.0.0.0");
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.mode, ProviderMode::Legacy);
        assert_eq!(cfg.context_window, 200_000);
        assert!(cfg.max_output_tokens.is_none());
        assert_eq!(cfg.request_timeout, Duration::from_secs(300));
    }

    #[test]
    fn default_urls_point_at_the_vendor() {
        let cfg = GatewayConfig::default();
        assert!(cfg.native_base_url.starts_with("https://"));
        assert!(cfg.legacy_chat_url.ends_with("/chat/completions"));
    }
}
