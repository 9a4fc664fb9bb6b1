//! # relay-quota
//!
//! Weekly quota tracking for the native upstream:
//! - [`ledger`]: persistent exhausted/reset state with automatic reset at the
//!   next Monday 00:00 local boundary
//! - [`classify`]: decides whether an upstream failure is a quota-exhaustion
//!   signal that should trigger failover

#![deny(unsafe_code)]

pub mod classify;
pub mod ledger;

pub use classify::is_quota_exhausted_error;
pub use ledger::{QuotaLedger, QuotaState, QuotaStatus, next_monday_midnight};
