//! Prompt rewriting: reserved billing-header strip and moderation-trigger
//! sanitisation.
//!
//! Newer CLI clients inject billing metadata lines at the top of the system
//! prompt (`x-anthropic-billing-header: …`). Upstreams reject those as
//! reserved keywords, so they are stripped from every text form a system
//! prompt can take. The moderation table rewrites a handful of phrases known
//! to trip the legacy upstream's content filter; it applies to the legacy
//! path only.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::{debug, info};

static RESERVED_HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^x-anthropic-billing(?:-header)?:[^\n]*\n*").expect("valid regex")
});

/// Phrases that trip the legacy upstream's moderation filter, with neutral
/// replacements. Applied to system and user text on the legacy path.
pub const MODERATION_PATTERNS: &[(&str, &str)] = &[
    (
        "You are Claude Code, Anthropic's official CLI for Claude.",
        "You are an AI coding assistant.",
    ),
    (
        "You are Claude Code, Anthropic's official CLI.",
        "You are an AI coding assistant.",
    ),
    (
        "Main branch (you will usually use this for PRs)",
        "Default branch for pull requests",
    ),
    (
        "To give feedback, users should report the issue at",
        "To provide feedback, users can report issues at",
    ),
];

/// Strip reserved billing-header lines from one text.
///
/// Idempotent. Logs when a rewrite occurred.
#[must_use]
pub fn strip_reserved_headers(text: &str) -> String {
    let stripped = RESERVED_HEADER_RE.replace_all(text, "");
    if stripped.len() != text.len() {
        info!(
            before = text.len(),
            after = stripped.len(),
            "removed reserved billing headers from system prompt"
        );
    }
    stripped.into_owned()
}

/// Strip reserved headers from a raw-JSON `system` value (native passthrough
/// path, where the body is forwarded untyped). Text blocks that become empty
/// are dropped; non-text blocks pass through.
#[must_use]
pub fn filter_system_value(system: Value) -> Value {
    match system {
        Value::String(text) => Value::String(strip_reserved_headers(&text)),
        Value::Array(blocks) => {
            let filtered: Vec<Value> = blocks
                .into_iter()
                .filter_map(|block| {
                    let is_text = block.get("type").and_then(Value::as_str) == Some("text");
                    if !is_text {
                        return Some(block);
                    }
                    let mut block = block;
                    let text = block.get("text").and_then(Value::as_str).unwrap_or_default();
                    let stripped = strip_reserved_headers(text);
                    if stripped.is_empty() {
                        return None;
                    }
                    block["text"] = Value::String(stripped);
                    Some(block)
                })
                .collect();
            Value::Array(filtered)
        }
        other => other,
    }
}

/// Replace moderation-trigger phrases (legacy upstream only).
#[must_use]
pub fn sanitize_moderation(text: &str) -> String {
    let mut result = text.to_string();
    for (pattern, replacement) in MODERATION_PATTERNS {
        if result.contains(pattern) {
            result = result.replace(pattern, replacement);
            debug!(pattern = &pattern[..pattern.len().min(50)], "replaced moderation trigger");
        }
    }
    result
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // ── strip_reserved_headers ───────────────────────────────────────────

    #[test]
    fn strips_billing_header_line() {
        let text = "x-anthropic-billing-header: v=2.1.15\n\nYou are helpful.";
        assert_eq!(strip_reserved_headers(text), "You are helpful.");
    }

    #[test]
    fn strips_short_form() {
        let text = "x-anthropic-billing: ?cc_version=2.1.15\nYou are helpful.";
        assert_eq!(strip_reserved_headers(text), "You are helpful.");
    }

    #[test]
    fn strips_mid_text_line() {
        let text = "Intro.\nx-anthropic-billing-header: x\nOutro.";
        assert_eq!(strip_reserved_headers(text), "Intro.\nOutro.");
    }

    #[test]
    fn leaves_clean_text_alone() {
        let text = "You are helpful.";
        assert_eq!(strip_reserved_headers(text), text);
    }

    #[test]
    fn strip_is_idempotent() {
        let text = "x-anthropic-billing-header: v=2.1.15\n\nYou are helpful.";
        let once = strip_reserved_headers(text);
        assert_eq!(strip_reserved_headers(&once), once);
    }

    #[test]
    fn does_not_strip_inline_mention() {
        let text = "the x-anthropic-billing-header: thing";
        assert_eq!(strip_reserved_headers(text), text);
    }

    // ── filter_system_value ──────────────────────────────────────────────

    #[test]
    fn drops_emptied_text_blocks() {
        let v = filter_system_value(json!([
            {"type": "text", "text": "x-anthropic-billing-header: only\n"},
            {"type": "text", "text": "real content"}
        ]));
        let arr = v.as_array().unwrap();
        assert_eq!(arr.len(), 1);
        assert_eq!(arr[0]["text"], "real content");
    }

    #[test]
    fn filters_raw_string_value() {
        let v = filter_system_value(json!("x-anthropic-billing-header: v=2.1.15\n\nYou are helpful."));
        assert_eq!(v, json!("You are helpful."));
    }

    #[test]
    fn filters_raw_block_array_preserving_extras() {
        let v = filter_system_value(json!([
            {"type": "text", "text": "x-anthropic-billing-header: z\nkeep", "cache_control": {"type": "ephemeral"}},
            {"type": "text", "text": "x-anthropic-billing: gone\n"}
        ]));
        let arr = v.as_array().unwrap();
        assert_eq!(arr.len(), 1);
        assert_eq!(arr[0]["text"], "keep");
        assert_eq!(arr[0]["cache_control"]["type"], "ephemeral");
    }

    #[test]
    fn raw_non_text_blocks_pass_through() {
        let v = filter_system_value(json!([{"type": "other", "data": 1}]));
        assert_eq!(v.as_array().unwrap().len(), 1);
    }

    // ── sanitize_moderation ──────────────────────────────────────────────

    #[test]
    fn replaces_cli_self_identification() {
        let text = "You are Claude Code, Anthropic's official CLI for Claude. Be nice.";
        assert_eq!(
            sanitize_moderation(text),
            "You are an AI coding assistant. Be nice."
        );
    }

    #[test]
    fn replaces_all_table_entries() {
        for (pattern, replacement) in MODERATION_PATTERNS {
            let sanitized = sanitize_moderation(pattern);
            assert_eq!(&sanitized, replacement);
        }
    }

    #[test]
    fn clean_text_is_unchanged() {
        let text = "Explain quicksort.";
        assert_eq!(sanitize_moderation(text), text);
    }
}
