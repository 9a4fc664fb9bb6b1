//! Upstream HTTP clients and their vendor header sets.
//!
//! The native upstream speaks Anthropic wire format and authenticates with
//! the OAuth access token in `x-api-key` plus a family of vendor
//! identification headers. The legacy upstream speaks chat completions and
//! wants a Bearer token with per-tenant identification headers read from the
//! IDE extension's auth file.

use std::path::PathBuf;
use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use tracing::debug;

use relay_auth::CredentialStore;
use relay_core::GatewayError;
use relay_wire::legacy::ChatRequest;

/// Product identification sent to the legacy upstream.
const PRODUCT_NAME: &str = "CodeBuddy";
const PRODUCT_VERSION: &str = "2.36.3";
const PLATFORM: &str = "CLI";

/// Env var overriding the legacy auth file path.
pub const ENV_LEGACY_AUTH_FILE_VAR: &str = "CODEBUDDY_AUTH_FILE";
/// Beta header required by the native count_tokens endpoint.
const COUNT_TOKENS_BETA: &str = "token-counting-2024-11-01";

// ─────────────────────────────────────────────────────────────────────────────
// Native upstream
// ─────────────────────────────────────────────────────────────────────────────

/// Client for the Anthropic-wire-format upstream.
#[derive(Debug)]
pub struct NativeUpstream {
    base_url: String,
    client: reqwest::Client,
    store: Arc<CredentialStore>,
}

impl NativeUpstream {
    /// New native upstream client.
    #[must_use]
    pub fn new(base_url: String, client: reqwest::Client, store: Arc<CredentialStore>) -> Self {
        Self {
            base_url,
            client,
            store,
        }
    }

    fn headers(&self) -> Result<HeaderMap, GatewayError> {
        let key = self
            .store
            .get()
            .ok_or_else(|| GatewayError::AuthFailed("no OAuth credential loaded".into()))?;

        let mut headers = HeaderMap::new();
        let mut api_key = HeaderValue::from_str(&key.access_token)
            .map_err(|_| GatewayError::AuthFailed("access token is not a valid header".into()))?;
        api_key.set_sensitive(true);
        let _ = headers.insert(HeaderName::from_static("x-api-key"), api_key);
        let _ = headers.insert(
            HeaderName::from_static("anthropic-version"),
            HeaderValue::from_static("2023-06-01"),
        );
        let _ = headers.insert(
            HeaderName::from_static("x-request-platform"),
            HeaderValue::from_static("codebuddy-code"),
        );
        let _ = headers.insert(
            HeaderName::from_static("x-app-name"),
            HeaderValue::from_static("codebuddy-code"),
        );
        let _ = headers.insert(
            HeaderName::from_static("x-scene-name"),
            HeaderValue::from_static("common_chat"),
        );
        let _ = headers.insert(
            HeaderName::from_static("x-request-platform-v2"),
            HeaderValue::from_static("Claude-Code-Internal"),
        );
        let _ = headers.insert(
            HeaderName::from_static("x-app-name-v2"),
            HeaderValue::from_static("claude-code-internal"),
        );
        let _ = headers.insert(
            HeaderName::from_static("x-claude-code-internal"),
            HeaderValue::from_static("true"),
        );
        Ok(headers)
    }

    /// POST the Anthropic request body to `/v1/messages`.
    pub async fn post_messages(&self, body: &Value) -> Result<reqwest::Response, GatewayError> {
        let url = format!("{}/v1/messages", self.base_url);
        debug!(%url, "forwarding to native upstream");
        Ok(self
            .client
            .post(&url)
            .headers(self.headers()?)
            .json(body)
            .send()
            .await?)
    }

    /// POST a count_tokens request (beta header attached).
    pub async fn post_count_tokens(&self, body: &Value) -> Result<reqwest::Response, GatewayError> {
        let url = format!("{}/v1/messages/count_tokens", self.base_url);
        Ok(self
            .client
            .post(&url)
            .headers(self.headers()?)
            .header("anthropic-beta", COUNT_TOKENS_BETA)
            .json(body)
            .send()
            .await?)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Legacy upstream
// ─────────────────────────────────────────────────────────────────────────────

/// Credentials for the legacy upstream, read from the IDE extension's auth
/// file.
#[derive(Clone, Debug)]
pub struct LegacyAuth {
    /// Bearer token.
    pub access_token: String,
    /// `X-User-Id` header value.
    pub user_id: String,
    /// `X-Enterprise-Id` / `X-Tenant-Id` header value.
    pub enterprise_id: String,
    /// `X-Domain` header value.
    pub domain: String,
}

impl LegacyAuth {
    /// Locate the auth file: env override first, then the per-platform
    /// extension data directories.
    #[must_use]
    pub fn find_auth_file() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(ENV_LEGACY_AUTH_FILE_VAR) {
            if !path.is_empty() {
                return Some(PathBuf::from(path));
            }
        }

        const SUFFIX: &str = "CodeBuddyExtension/Data/Public/auth/Tencent-Cloud.copilot.info";
        let home = dirs::home_dir()?;
        let candidates = [
            home.join(".local/share").join(SUFFIX),
            home.join("Library/Application Support").join(SUFFIX),
        ];
        candidates.into_iter().find(|p| p.exists())
    }

    /// Parse the auth file.
    ///
    /// Shape: `{"auth": {"accessToken", "domain"?}, "account": {"uid",
    /// "enterpriseId", "sso": {"domain"}?}}`.
    pub fn load(path: &std::path::Path) -> Result<Self, GatewayError> {
        let data = std::fs::read_to_string(path).map_err(|e| {
            GatewayError::AuthFailed(format!("cannot read auth file {}: {e}", path.display()))
        })?;
        let value: Value = serde_json::from_str(&data)
            .map_err(|e| GatewayError::AuthFailed(format!("invalid auth file: {e}")))?;

        let access_token = value["auth"]["accessToken"]
            .as_str()
            .ok_or_else(|| GatewayError::AuthFailed("auth file missing auth.accessToken".into()))?
            .to_string();
        let user_id = value["account"]["uid"]
            .as_str()
            .ok_or_else(|| GatewayError::AuthFailed("auth file missing account.uid".into()))?
            .to_string();
        let enterprise_id = value["account"]["enterpriseId"]
            .as_str()
            .ok_or_else(|| {
                GatewayError::AuthFailed("auth file missing account.enterpriseId".into())
            })?
            .to_string();
        let domain = value["auth"]["domain"]
            .as_str()
            .or_else(|| value["account"]["sso"]["domain"].as_str())
            .unwrap_or_default()
            .to_string();

        Ok(Self {
            access_token,
            user_id,
            enterprise_id,
            domain,
        })
    }
}

/// Client for the chat-completions upstream.
#[derive(Debug)]
pub struct LegacyUpstream {
    chat_url: String,
    client: reqwest::Client,
    auth: LegacyAuth,
}

impl LegacyUpstream {
    /// New legacy upstream client.
    #[must_use]
    pub fn new(chat_url: String, client: reqwest::Client, auth: LegacyAuth) -> Self {
        Self {
            chat_url,
            client,
            auth,
        }
    }

    fn headers(&self) -> Result<HeaderMap, GatewayError> {
        let as_value = |v: &str| {
            HeaderValue::from_str(v)
                .map_err(|_| GatewayError::AuthFailed("auth field is not a valid header".into()))
        };

        let mut headers = HeaderMap::new();
        let mut bearer = as_value(&format!("Bearer {}", self.auth.access_token))?;
        bearer.set_sensitive(true);
        let _ = headers.insert(reqwest::header::AUTHORIZATION, bearer);
        let _ = headers.insert(HeaderName::from_static("x-user-id"), as_value(&self.auth.user_id)?);
        let _ = headers.insert(
            HeaderName::from_static("x-enterprise-id"),
            as_value(&self.auth.enterprise_id)?,
        );
        let _ = headers.insert(
            HeaderName::from_static("x-tenant-id"),
            as_value(&self.auth.enterprise_id)?,
        );
        let _ = headers.insert(HeaderName::from_static("x-domain"), as_value(&self.auth.domain)?);
        let _ = headers.insert(
            reqwest::header::USER_AGENT,
            as_value(&format!(
                "{PLATFORM}/{} {PRODUCT_NAME}/{PRODUCT_VERSION}",
                std::env::consts::OS
            ))?,
        );
        Ok(headers)
    }

    /// POST the chat request; the response is always an SSE stream.
    pub async fn post_chat(&self, body: &ChatRequest) -> Result<reqwest::Response, GatewayError> {
        debug!(url = %self.chat_url, "forwarding to legacy upstream");
        Ok(self
            .client
            .post(&self.chat_url)
            .headers(self.headers()?)
            .json(body)
            .send()
            .await?)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use relay_auth::OAuthKey;
    use relay_auth::store::DEFAULT_REFRESH_BUFFER_MS;
    use wiremock::matchers::{header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store_with_token(dir: &tempfile::TempDir, token: &str) -> Arc<CredentialStore> {
        let store = Arc::new(CredentialStore::new(
            dir.path().join("config.json"),
            DEFAULT_REFRESH_BUFFER_MS,
        ));
        let _ = store.set_if_newer(OAuthKey::static_token(token));
        store
    }

    #[tokio::test]
    async fn native_sends_vendor_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "tok-123"))
            .and(header("anthropic-version", "2023-06-01"))
            .and(header("x-claude-code-internal", "true"))
            .and(header("x-scene-name", "common_chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": 1})))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::TempDir::new().unwrap();
        let upstream = NativeUpstream::new(
            server.uri(),
            reqwest::Client::new(),
            store_with_token(&dir, "tok-123"),
        );
        let resp = upstream
            .post_messages(&serde_json::json!({"model": "m"}))
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 200);
    }

    #[tokio::test]
    async fn native_count_tokens_sends_beta_header() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages/count_tokens"))
            .and(header("anthropic-beta", "token-counting-2024-11-01"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::TempDir::new().unwrap();
        let upstream = NativeUpstream::new(
            server.uri(),
            reqwest::Client::new(),
            store_with_token(&dir, "tok"),
        );
        let _ = upstream
            .post_count_tokens(&serde_json::json!({"model": "m"}))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn native_without_credential_is_auth_failed() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = Arc::new(CredentialStore::new(
            dir.path().join("config.json"),
            DEFAULT_REFRESH_BUFFER_MS,
        ));
        let upstream =
            NativeUpstream::new("http://127.0.0.1:1".into(), reqwest::Client::new(), store);
        let err = upstream
            .post_messages(&serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::AuthFailed(_)));
    }

    #[tokio::test]
    async fn legacy_sends_tenant_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("authorization", "Bearer tok"))
            .and(header("x-user-id", "u1"))
            .and(header("x-enterprise-id", "e1"))
            .and(header("x-tenant-id", "e1"))
            .and(header("x-domain", "d1"))
            .and(header_exists("user-agent"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let upstream = LegacyUpstream::new(
            server.uri(),
            reqwest::Client::new(),
            LegacyAuth {
                access_token: "tok".into(),
                user_id: "u1".into(),
                enterprise_id: "e1".into(),
                domain: "d1".into(),
            },
        );
        let chat = ChatRequest {
            model: "claude-4.5".into(),
            messages: vec![],
            stream: true,
            max_tokens: None,
            temperature: None,
            top_p: None,
            stop: None,
            tools: None,
            tool_choice: None,
            reasoning_effort: None,
            reasoning_summary: None,
        };
        let resp = upstream.post_chat(&chat).await.unwrap();
        assert_eq!(resp.status().as_u16(), 200);
    }

    #[test]
    fn legacy_auth_parses_extension_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("auth.info");
        std::fs::write(
            &path,
            serde_json::json!({
                "auth": {"accessToken": "at", "domain": "corp"},
                "account": {"uid": "u", "enterpriseId": "e"}
            })
            .to_string(),
        )
        .unwrap();

        let auth = LegacyAuth::load(&path).unwrap();
        assert_eq!(auth.access_token, "at");
        assert_eq!(auth.user_id, "u");
        assert_eq!(auth.enterprise_id, "e");
        assert_eq!(auth.domain, "corp");
    }

    #[test]
    fn legacy_auth_domain_falls_back_to_sso() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("auth.info");
        std::fs::write(
            &path,
            serde_json::json!({
                "auth": {"accessToken": "at"},
                "account": {"uid": "u", "enterpriseId": "e", "sso": {"domain": "sso-corp"}}
            })
            .to_string(),
        )
        .unwrap();

        let auth = LegacyAuth::load(&path).unwrap();
        assert_eq!(auth.domain, "sso-corp");
    }

    #[test]
    fn legacy_auth_missing_fields_is_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("auth.info");
        std::fs::write(&path, r#"{"auth": {}}"#).unwrap();
        assert!(matches!(
            LegacyAuth::load(&path),
            Err(GatewayError::AuthFailed(_))
        ));
    }
}
