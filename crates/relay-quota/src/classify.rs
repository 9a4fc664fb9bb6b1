//! Upstream-error classification.
//!
//! Decides whether an upstream failure means "weekly quota exhausted" and the
//! request should fail over. HTTP 429 always qualifies; otherwise the body is
//! matched against known quota phrasings — an English set matched
//! case-insensitively and the vendor's Chinese set matched as-is.

/// English quota phrasings, matched against the lowercased body.
const ENGLISH_KEYWORDS: &[&str] = &[
    "rate limit",
    "rate_limit",
    "ratelimit",
    "quota exceeded",
    "quota_exceeded",
    "too many requests",
    "request limit",
    "usage limit",
    "daily limit",
    "monthly limit",
    "weekly limit",
];

/// Vendor quota phrasings, matched case-sensitively.
const VENDOR_KEYWORDS: &[&str] = &[
    "额度已用尽",
    "额度用尽",
    "本周额度",
    "本日额度",
    "本月额度",
    "额度不足",
    "额度耗尽",
    "临时提额",
    "使用详情",
];

/// Whether an upstream error should be treated as quota exhaustion.
#[must_use]
pub fn is_quota_exhausted_error(status: u16, body: &str) -> bool {
    if status == 429 {
        return true;
    }

    let lower = body.to_lowercase();
    if ENGLISH_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return true;
    }

    VENDOR_KEYWORDS.iter().any(|k| body.contains(k))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
