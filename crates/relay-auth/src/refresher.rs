//! Background refresh loop.
//!
//! One worker per store. Each iteration refreshes when due, then sleeps
//! until `expires_at − buffer` plus ±30 s of jitter — the jitter
//! desynchronises multi-instance deployments hitting the same refresh
//! endpoint. Failures switch the wake time to an exponential backoff capped
//! at 60 s; after five consecutive failures the key is cleared and the
//! counter reset, leaving re-authentication to the external tool.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::refresh::RefreshConfig;
use crate::store::{CredentialStore, RefreshOutcome};
use crate::types::now_ms;

/// Consecutive failures tolerated before the key is dropped.
const MAX_RETRIES: u32 = 5;
/// Poll interval while no key is loaded.
const NO_KEY_SLEEP_MS: i64 = 60_000;
/// Jitter half-width applied to the wake time.
const JITTER_MS: i64 = 30_000;
/// Backoff ceiling.
const MAX_BACKOFF_MS: i64 = 60_000;

/// Spawn the refresh loop as a detached daemon task.
pub fn spawn_refresh_loop(
    store: Arc<CredentialStore>,
    config: Arc<RefreshConfig>,
    client: reqwest::Client,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("credential refresh loop started");
        let mut retries: u32 = 0;

        loop {
            let key = store.get();
            if let Some(key) = &key {
                if store.needs_refresh(Some(key)) {
                    match store.refresh(&client, &config).await {
                        RefreshOutcome::Refreshed => retries = 0,
                        RefreshOutcome::SkippedInFlight
                        | RefreshOutcome::NotNeeded
                        | RefreshOutcome::NoKey => {}
                        RefreshOutcome::Failed(e) => {
                            retries += 1;
                            warn!(retries, max = MAX_RETRIES, "refresh failed: {e}");
                            if retries >= MAX_RETRIES {
                                error!("max refresh retries exceeded, clearing credential");
                                store.clear();
                                retries = 0;
                            }
                        }
                    }
                }
            }

            let mut sleep_ms = match store.get() {
                Some(key) if !key.is_static() => {
                    let refresh_at = key.expires_at - store.buffer_ms();
                    let jitter = rand::rng().random_range(-JITTER_MS..=JITTER_MS);
                    (refresh_at - now_ms() + jitter).max(1_000)
                }
                _ => NO_KEY_SLEEP_MS,
            };

            if retries > 0 {
                sleep_ms = sleep_ms.min(backoff_ms(retries));
            }

            tokio::time::sleep(Duration::from_millis(sleep_ms as u64)).await;
        }
    })
}

/// Exponential backoff: `min(60 s, 2^retry × 1 s)`.
fn backoff_ms(retry: u32) -> i64 {
    let exp = 1_000_i64.saturating_mul(1_i64 << retry.min(16));
    exp.min(MAX_BACKOFF_MS)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
