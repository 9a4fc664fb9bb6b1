//! Credential file watcher.
//!
//! Polls the config file's mtime and merges newer keys into the store when an
//! external tool rewrites it. Polling (not inotify) is deliberate: it behaves
//! identically on all platforms and tolerates editor/temp-file rename
//! patterns. The first observation only records the mtime so startup does not
//! trigger a redundant load; parse failures keep the in-memory key.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::sources::load_config_file;
use crate::store::CredentialStore;

/// Default poll interval.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
/// Env var overriding the poll interval (seconds).
pub const ENV_POLL_INTERVAL_VAR: &str = "FILE_WATCHER_INTERVAL";

/// Poll interval from the environment, or the default.
#[must_use]
pub fn poll_interval_from_env() -> Duration {
    std::env::var(ENV_POLL_INTERVAL_VAR)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(DEFAULT_POLL_INTERVAL, Duration::from_secs)
}

/// Spawn the watcher as a detached daemon task.
pub fn spawn_file_watcher(
    store: Arc<CredentialStore>,
    path: PathBuf,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(path = %path.display(), interval_secs = interval.as_secs(), "credential file watcher started");
        let mut last_mtime: Option<SystemTime> = None;

        loop {
            if let Ok(mtime) = tokio::fs::metadata(&path).await.and_then(|m| m.modified()) {
                match last_mtime {
                    None => last_mtime = Some(mtime),
                    Some(prev) if mtime != prev => {
                        last_mtime = Some(mtime);
                        info!("credential file changed, reloading");
                        match load_config_file(&path) {
                            Ok(key) => {
                                let file_expires = key.expires_at;
                                if store.set_if_newer(key) {
                                    info!(file_expires, "credential updated from file");
                                } else {
                                    info!(
                                        file_expires,
                                        "file credential is older or same, keeping in-memory key"
                                    );
                                }
                            }
                            Err(e) => {
                                warn!("failed to reload credential file, keeping old key: {e}");
                            }
                        }
                    }
                    Some(_) => {}
                }
            }

            tokio::time::sleep(interval).await;
        }
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
