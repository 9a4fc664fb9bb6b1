//! Gateway entry point.
//!
//! Mode selection decides which upstreams are initialized:
//! - `native`: OAuth credential required; refresher and watcher daemons are
//!   started only for the dynamic (config-file) credential source.
//! - `legacy`: the IDE extension auth file is required; a native client is
//!   still built best-effort so count_tokens can proxy.
//! - `hybrid`: both, plus the quota ledger.
//!
//! Missing credentials for the chosen mode are fatal (nonzero exit).

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};

use relay_auth::refresh::RefreshConfig;
use relay_auth::refresher::spawn_refresh_loop;
use relay_auth::sources;
use relay_auth::store::CredentialStore;
use relay_auth::watcher::spawn_file_watcher;
use relay_quota::QuotaLedger;
use relay_server::config::{GatewayConfig, ProviderMode};
use relay_server::state::AppState;
use relay_server::upstream::{LegacyAuth, LegacyUpstream, NativeUpstream};
use relay_server::{logging, routes};

#[derive(Parser)]
#[command(name = "relay", version, about = "Anthropic-compatible API gateway")]
struct Cli {
    /// Bind address.
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Bind port.
    #[arg(long, default_value_t = 8080)]
    port: u16,

    /// Backend provider mode.
    #[arg(long, value_enum, default_value_t = ProviderMode::Legacy)]
    provider: ProviderMode,

    /// Quota state file (hybrid mode).
    #[arg(long)]
    quota_file: Option<PathBuf>,

    /// Log file (in addition to stdout).
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Log level when RUST_LOG is not set.
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// Loaded credential store plus whether it came from the dynamic source.
struct LoadedCredentials {
    store: Arc<CredentialStore>,
    dynamic: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _log_guard = logging::init(cli.log_file.as_deref(), &cli.log_level);

    let mut config = GatewayConfig {
        host: cli.host,
        port: cli.port,
        mode: cli.provider,
        ..GatewayConfig::default()
    };
    if let Some(quota_file) = cli.quota_file {
        config.quota_file = quota_file;
    }

    let client = reqwest::Client::builder()
        .timeout(config.request_timeout)
        .build()?;

    let mut state = AppState::new(config.clone());

    match config.mode {
        ProviderMode::Native => {
            info!("initializing native mode (Anthropic passthrough)");
            let Some(creds) = initialize_credentials(&config) else {
                error!("native mode requires an OAuth credential; none found");
                error!(
                    "set {} / sign in via SSO / run the authentication tool",
                    sources::ENV_TOKEN_VAR
                );
                std::process::exit(1);
            };
            state.native = Some(Arc::new(NativeUpstream::new(
                config.native_base_url.clone(),
                client.clone(),
                creds.store.clone(),
            )));
            spawn_credential_daemons(&config, &creds, &client);
        }
        ProviderMode::Legacy => {
            info!("initializing legacy mode (chat-completions transcoding)");
            state.legacy = Some(Arc::new(build_legacy_upstream(&config, &client)));
            // Best-effort native client so count_tokens can proxy.
            if let Some(creds) = initialize_credentials(&config) {
                state.native = Some(Arc::new(NativeUpstream::new(
                    config.native_base_url.clone(),
                    client.clone(),
                    creds.store,
                )));
                info!("native client available for token counting");
            } else {
                info!("no native credential; token counting uses the local estimate");
            }
        }
        ProviderMode::Hybrid => {
            info!("initializing hybrid mode (native preferred, legacy fallback)");
            match initialize_credentials(&config) {
                Some(creds) => {
                    state.native = Some(Arc::new(NativeUpstream::new(
                        config.native_base_url.clone(),
                        client.clone(),
                        creds.store.clone(),
                    )));
                    spawn_credential_daemons(&config, &creds, &client);
                }
                None => {
                    warn!("no native credential found; hybrid will use the legacy upstream only");
                }
            }
            state.legacy = Some(Arc::new(build_legacy_upstream(&config, &client)));

            let ledger = QuotaLedger::open(config.quota_file.clone());
            if ledger.is_native_available() {
                info!("native upstream quota available");
            } else {
                let status = ledger.status();
                let reset_at = status.reset_at.map(|t| t.to_rfc3339()).unwrap_or_default();
                info!(%reset_at, "native upstream quota exhausted, starting on the legacy upstream");
            }
            state.quota = Some(Arc::new(ledger));
        }
    }

    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port)).await?;
    info!(
        addr = %listener.local_addr()?,
        mode = %config.mode,
        "gateway listening"
    );

    axum::serve(listener, routes::router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received, draining connections");
        })
        .await?;

    Ok(())
}

/// Load the OAuth credential from the three sources in precedence order.
fn initialize_credentials(config: &GatewayConfig) -> Option<LoadedCredentials> {
    let store = Arc::new(CredentialStore::new(
        config.credential_file.clone(),
        config.refresh_buffer_ms,
    ));

    if let Some(key) = sources::load_env_token() {
        info!("loaded OAuth token from environment (static mode)");
        let _ = store.set_if_newer(key);
        return Some(LoadedCredentials {
            store,
            dynamic: false,
        });
    }

    if let Some(path) = sources::git_credentials_path() {
        if let Some(key) = sources::load_git_credentials_token(&path) {
            info!("loaded OAuth token from git-credentials (SSO managed, static mode)");
            let _ = store.set_if_newer(key);
            return Some(LoadedCredentials {
                store,
                dynamic: false,
            });
        }
    }

    match sources::load_config_file(&config.credential_file) {
        Ok(key) => {
            if store.needs_refresh(Some(&key)) {
                warn!(expires_at = key.expires_at, "credential close to expiry, will refresh");
            } else {
                info!(expires_at = key.expires_at, "credential loaded (dynamic mode)");
            }
            let _ = store.set_if_newer(key);
            Some(LoadedCredentials {
                store,
                dynamic: true,
            })
        }
        Err(e) => {
            warn!("no credential config available: {e}");
            None
        }
    }
}

/// Start the refresher and watcher daemons for a dynamic credential source.
///
/// Static sources (env var, git-credentials) are externally managed, so
/// nothing is spawned for them. The tasks are daemons: they are not joined at
/// shutdown.
fn spawn_credential_daemons(
    config: &GatewayConfig,
    creds: &LoadedCredentials,
    client: &reqwest::Client,
) {
    if !creds.dynamic {
        return;
    }
    let refresh_config = Arc::new(RefreshConfig::default());
    let _ = spawn_refresh_loop(creds.store.clone(), refresh_config, client.clone());
    let _ = spawn_file_watcher(
        creds.store.clone(),
        config.credential_file.clone(),
        config.watcher_interval,
    );
    info!("credential refresh and file-watcher daemons started");
}

/// Load the legacy auth file; missing credentials are fatal.
fn build_legacy_upstream(config: &GatewayConfig, client: &reqwest::Client) -> LegacyUpstream {
    let path = config
        .legacy_auth_file
        .clone()
        .or_else(LegacyAuth::find_auth_file);
    let Some(path) = path else {
        error!(
            "legacy auth file not found; sign in with the IDE extension or set {}",
            relay_server::upstream::ENV_LEGACY_AUTH_FILE_VAR
        );
        std::process::exit(1);
    };
    match LegacyAuth::load(&path) {
        Ok(auth) => {
            info!(user = %auth.user_id, enterprise = %auth.enterprise_id, "legacy upstream credentials loaded");
            LegacyUpstream::new(config.legacy_chat_url.clone(), client.clone(), auth)
        }
        Err(e) => {
            error!("failed to load legacy auth file {}: {e}", path.display());
            std::process::exit(1);
        }
    }
}
