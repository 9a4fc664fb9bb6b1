//! Persistent weekly quota ledger for the native upstream.
//!
//! The exhausted flag resets at the next Monday 00:00 *local* boundary. Every
//! read path (`is_native_available`, `status`) runs the auto-reset check
//! first, so a process that slept across the boundary repairs its state on
//! the next observation. All mutators persist synchronously with a temp file
//! and rename under the ledger mutex; readers of the file never see a torn
//! write.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Datelike, Duration, Local, LocalResult, TimeZone};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Weekly quota state for the native upstream.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct QuotaState {
    /// Whether the weekly quota is exhausted.
    #[serde(default)]
    pub quota_exhausted: bool,
    /// When exhaustion was observed.
    #[serde(default)]
    pub exhausted_at: Option<DateTime<Local>>,
    /// Next Monday 00:00 local; `None` while not exhausted.
    #[serde(default)]
    pub reset_at: Option<DateTime<Local>>,
    /// The upstream error that triggered exhaustion.
    #[serde(default)]
    pub last_error: Option<String>,
    /// Requests counted against the ledger (observability, not enforcement).
    #[serde(default)]
    pub request_count: u64,
    /// Timestamp of the last counted request.
    #[serde(default)]
    pub last_request_at: Option<DateTime<Local>>,
}

/// On-disk envelope of the ledger file.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct LedgerFile {
    native_api: QuotaState,
    version: u32,
}

const LEDGER_VERSION: u32 = 2;

/// Status snapshot returned by [`QuotaLedger::status`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QuotaStatus {
    /// Whether the native upstream may be used.
    pub available: bool,
    /// Exhausted flag.
    pub quota_exhausted: bool,
    /// When exhaustion was observed.
    pub exhausted_at: Option<DateTime<Local>>,
    /// Scheduled reset boundary.
    pub reset_at: Option<DateTime<Local>>,
    /// Human-readable countdown, e.g. `"2d 4h 31m"`.
    pub time_until_reset: Option<String>,
    /// The triggering upstream error.
    pub last_error: Option<String>,
    /// Requests counted against the quota.
    pub request_count: u64,
    /// Timestamp of the last counted request.
    pub last_request_at: Option<DateTime<Local>>,
}

/// Errors from ledger persistence.
#[derive(Debug, thiserror::Error)]
pub enum QuotaError {
    /// File I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Persistent quota ledger.
#[derive(Debug)]
pub struct QuotaLedger {
    path: PathBuf,
    state: Mutex<QuotaState>,
}

impl QuotaLedger {
    /// Open (or initialize) the ledger at `path`, applying the auto-reset
    /// check immediately.
    #[must_use]
    pub fn open(path: PathBuf) -> Self {
        let state = load_state(&path).unwrap_or_default();
        let ledger = Self {
            path,
            state: Mutex::new(state),
        };
        ledger.check_auto_reset();
        ledger
    }

    /// Whether the native upstream may be used. Runs the auto-reset check
    /// first.
    #[must_use]
    pub fn is_native_available(&self) -> bool {
        self.check_auto_reset();
        !self.state.lock().quota_exhausted
    }

    /// Mark the native quota exhausted until the next Monday 00:00 local.
    ///
    /// When today already is Monday the reset lands a full week out, never
    /// zero days.
    pub fn mark_native_exhausted(&self, error_message: &str) {
        let mut state = self.state.lock();
        let now = Local::now();
        let reset_at = next_monday_midnight(now);

        state.quota_exhausted = true;
        state.exhausted_at = Some(now);
        state.reset_at = Some(reset_at);
        state.last_error = Some(error_message.to_string());
        self.persist(&state);

        info!(reset_at = %reset_at, "native upstream quota exhausted, reset scheduled");
    }

    /// Count one request against the native quota.
    pub fn record_request(&self) {
        let mut state = self.state.lock();
        state.request_count += 1;
        state.last_request_at = Some(Local::now());
        self.persist(&state);
    }

    /// Manual reset (the `/v1/quota/reset` endpoint).
    pub fn reset_native(&self) {
        let mut state = self.state.lock();
        *state = QuotaState::default();
        self.persist(&state);
        info!("native upstream quota manually reset");
    }

    /// Status snapshot with a computed countdown. Runs the auto-reset check
    /// first.
    #[must_use]
    pub fn status(&self) -> QuotaStatus {
        self.check_auto_reset();
        let state = self.state.lock();

        let time_until_reset = state.reset_at.and_then(|reset_at| {
            let remaining = reset_at - Local::now();
            if remaining.num_seconds() <= 0 {
                return None;
            }
            let days = remaining.num_days();
            let hours = remaining.num_hours() % 24;
            let minutes = remaining.num_minutes() % 60;
            Some(format!("{days}d {hours}h {minutes}m"))
        });

        QuotaStatus {
            available: !state.quota_exhausted,
            quota_exhausted: state.quota_exhausted,
            exhausted_at: state.exhausted_at,
            reset_at: state.reset_at,
            time_until_reset,
            last_error: state.last_error.clone(),
            request_count: state.request_count,
            last_request_at: state.last_request_at,
        }
    }

    /// Clear exhausted state when the wall clock has passed the boundary.
    fn check_auto_reset(&self) {
        let mut state = self.state.lock();
        if !state.quota_exhausted {
            return;
        }
        let Some(reset_at) = state.reset_at else {
            return;
        };
        if Local::now() >= reset_at {
            info!(reset_at = %reset_at, "auto-resetting native upstream quota");
            *state = QuotaState::default();
            self.persist(&state);
        }
    }

    /// Persist under the held lock via temp file and rename.
    fn persist(&self, state: &QuotaState) {
        if let Err(e) = write_state(&self.path, state) {
            warn!("failed to persist quota state: {e}");
        }
    }
}

/// The next Monday 00:00 in local time, strictly after `now`.
#[must_use]
pub fn next_monday_midnight(now: DateTime<Local>) -> DateTime<Local> {
    let mut days_ahead = i64::from(7 - now.weekday().num_days_from_monday()) % 7;
    if days_ahead == 0 {
        days_ahead = 7;
    }

    let date = now.date_naive() + Duration::days(days_ahead);
    let naive = date.and_hms_opt(0, 0, 0).expect("midnight exists");
    match Local.from_local_datetime(&naive) {
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt,
        // A DST gap swallowed midnight; the first valid hour after it is close enough.
        LocalResult::None => Local
            .from_local_datetime(&(naive + Duration::hours(1)))
            .earliest()
            .unwrap_or_else(Local::now),
    }
}

fn load_state(path: &Path) -> Option<QuotaState> {
    let data = match std::fs::read_to_string(path) {
        Ok(d) => d,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            warn!("failed to read quota state file: {e}");
            return None;
        }
    };
    match serde_json::from_str::<LedgerFile>(&data) {
        Ok(file) => Some(file.native_api),
        Err(e) => {
            warn!("failed to parse quota state file, starting fresh: {e}");
            None
        }
    }
}

fn write_state(path: &Path, state: &QuotaState) -> Result<(), QuotaError> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent)?;

    let file = LedgerFile {
        native_api: state.clone(),
        version: LEDGER_VERSION,
    };
    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    serde_json::to_writer_pretty(&mut tmp, &file)?;
    let _ = tmp.persist(path).map_err(|e| QuotaError::Io(e.error))?;
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
