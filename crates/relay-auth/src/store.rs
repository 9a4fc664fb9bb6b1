//! Thread-safe credential store.
//!
//! One reader-writer lock over the canonical key plus an in-flight flag.
//! `set_if_newer` implements the newest-wins merge: a static incumbent is
//! never displaced, and a dated incumbent only yields to a static candidate
//! or a strictly later expiry. `refresh` is single-flight: a second caller
//! returns immediately instead of queueing, and the HTTP call runs outside
//! the lock.

use std::path::PathBuf;

use parking_lot::RwLock;
use tracing::{error, info, warn};

use crate::errors::AuthError;
use crate::refresh::{RefreshConfig, refresh_key};
use crate::sources::save_config_file;
use crate::types::{OAuthKey, now_ms};

/// Default expiry buffer: refresh five minutes before the deadline.
pub const DEFAULT_REFRESH_BUFFER_MS: i64 = 5 * 60 * 1000;

/// Outcome of a [`CredentialStore::refresh`] call.
#[derive(Debug)]
pub enum RefreshOutcome {
    /// A new key was obtained, persisted, and merged.
    Refreshed,
    /// Another refresh was already in flight; nothing was done.
    SkippedInFlight,
    /// The key is still fresh (or static); nothing to do.
    NotNeeded,
    /// No key is loaded.
    NoKey,
    /// The refresh attempt failed.
    Failed(AuthError),
}

#[derive(Debug, Default)]
struct Inner {
    key: Option<OAuthKey>,
    refreshing: bool,
}

/// Thread-safe, hot-reloadable credential store.
#[derive(Debug)]
pub struct CredentialStore {
    inner: RwLock<Inner>,
    buffer_ms: i64,
    config_path: PathBuf,
}

impl CredentialStore {
    /// New store persisting refreshed keys to `config_path`.
    #[must_use]
    pub fn new(config_path: PathBuf, buffer_ms: i64) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            buffer_ms,
            config_path,
        }
    }

    /// Expiry buffer in milliseconds.
    #[must_use]
    pub fn buffer_ms(&self) -> i64 {
        self.buffer_ms
    }

    /// Snapshot of the current key. Mutating the copy does not touch the
    /// stored state.
    #[must_use]
    pub fn get(&self) -> Option<OAuthKey> {
        self.inner.read().key.clone()
    }

    /// Merge a candidate key, newest wins.
    ///
    /// Accepted iff no key is loaded, or the incumbent is non-static and the
    /// candidate is static or expires strictly later. Returns whether the
    /// store changed.
    pub fn set_if_newer(&self, candidate: OAuthKey) -> bool {
        let mut inner = self.inner.write();

        let Some(current) = &inner.key else {
            if candidate.is_static() {
                info!("credential initialized (no expiration, externally managed)");
            } else {
                info!(expires_at = candidate.expires_at, "credential initialized");
            }
            inner.key = Some(candidate);
            return true;
        };

        if current.is_static() {
            return false;
        }

        if candidate.is_static() || candidate.expires_at > current.expires_at {
            if candidate.is_static() {
                info!(old_expires = current.expires_at, "credential updated to no-expiration mode");
            } else {
                info!(
                    old_expires = current.expires_at,
                    new_expires = candidate.expires_at,
                    "credential updated"
                );
            }
            inner.key = Some(candidate);
            return true;
        }

        false
    }

    /// Whether a key is due for refresh.
    ///
    /// Static keys never are; a missing key always is. Otherwise true iff
    /// `expires_at <= now + buffer`. `None` checks the stored key.
    #[must_use]
    pub fn needs_refresh(&self, key: Option<&OAuthKey>) -> bool {
        let stored;
        let key = match key {
            Some(k) => k,
            None => {
                stored = self.get();
                match &stored {
                    Some(k) => k,
                    None => return true,
                }
            }
        };

        if key.is_static() {
            return false;
        }
        key.expires_at <= now_ms() + self.buffer_ms
    }

    /// Drop the stored key.
    pub fn clear(&self) {
        self.inner.write().key = None;
    }

    /// Refresh the stored key, single-flight.
    ///
    /// The in-flight flag is checked and set under the lock together with a
    /// second `needs_refresh` check; the HTTP call runs with the lock
    /// released. On success the new key is persisted atomically and merged.
    /// A 401 from the endpoint clears the store.
    pub async fn refresh(
        &self,
        client: &reqwest::Client,
        config: &RefreshConfig,
    ) -> RefreshOutcome {
        {
            let mut inner = self.inner.write();
            if inner.refreshing {
                return RefreshOutcome::SkippedInFlight;
            }
            let Some(key) = &inner.key else {
                return RefreshOutcome::NoKey;
            };
            if key.is_static() || key.expires_at > now_ms() + self.buffer_ms {
                return RefreshOutcome::NotNeeded;
            }
            inner.refreshing = true;
        }

        let outcome = self.do_refresh(client, config).await;
        self.inner.write().refreshing = false;
        outcome
    }

    async fn do_refresh(&self, client: &reqwest::Client, config: &RefreshConfig) -> RefreshOutcome {
        let Some(current) = self.get() else {
            return RefreshOutcome::NoKey;
        };

        info!("credential due for refresh, refreshing");
        match refresh_key(client, config, &current).await {
            Ok(new_key) => {
                if let Err(e) = save_config_file(&self.config_path, &new_key) {
                    warn!("failed to persist refreshed credential: {e}");
                    return RefreshOutcome::Failed(e);
                }
                let expires_at = new_key.expires_at;
                let _ = self.set_if_newer(new_key);
                info!(expires_at, "credential refreshed");
                RefreshOutcome::Refreshed
            }
            Err(AuthError::Unauthorized(message)) => {
                error!("refresh rejected with 401, clearing credential");
                self.clear();
                RefreshOutcome::Failed(AuthError::Unauthorized(message))
            }
            Err(e) => {
                warn!("credential refresh failed: {e}");
                RefreshOutcome::Failed(e)
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
