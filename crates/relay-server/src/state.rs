//! Shared state accessible from axum handlers.

use std::sync::Arc;

use relay_quota::QuotaLedger;

use crate::config::GatewayConfig;
use crate::upstream::{LegacyUpstream, NativeUpstream};

/// Per-process state shared by every request handler.
///
/// Which upstreams are present depends on the mode: native mode carries only
/// the native upstream, legacy mode carries the legacy upstream (plus a
/// best-effort native client for count_tokens), hybrid carries both and the
/// quota ledger.
#[derive(Clone)]
pub struct AppState {
    /// Gateway configuration.
    pub config: Arc<GatewayConfig>,
    /// Native upstream, when configured.
    pub native: Option<Arc<NativeUpstream>>,
    /// Legacy upstream, when configured.
    pub legacy: Option<Arc<LegacyUpstream>>,
    /// Quota ledger (hybrid mode).
    pub quota: Option<Arc<QuotaLedger>>,
}

impl AppState {
    /// State with a config and no upstreams; callers attach what the mode
    /// needs.
    #[must_use]
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            config: Arc::new(config),
            native: None,
            legacy: None,
            quota: None,
        }
    }
}
