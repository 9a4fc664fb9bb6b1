//! Message and tool-call id handling.
//!
//! Anthropic callers expect `msg_`-prefixed message ids and `toolu_`-prefixed
//! tool-call ids. Upstreams are free to send anything (or nothing), so ids on
//! the response path are normalized into the `toolu_` namespace. The reverse
//! mapping is an identity — every supported upstream already accepts `toolu_`
//! ids — but the seam is kept so a future upstream with its own id scheme only
//! has to change one function.

use uuid::Uuid;

/// Mint a fresh Anthropic-style message id (`msg_` + 24 hex chars).
#[must_use]
pub fn new_message_id() -> String {
    format!("msg_{}", short_hex())
}

/// Mint a fresh Anthropic-style tool-call id (`toolu_` + 24 hex chars).
#[must_use]
pub fn new_tool_call_id() -> String {
    format!("toolu_{}", short_hex())
}

/// Normalize an upstream tool-call id into the `toolu_` namespace.
///
/// Empty ids get a freshly minted one; ids already carrying the prefix pass
/// through unchanged, so the function is idempotent.
#[must_use]
pub fn normalize_tool_call_id(id: &str) -> String {
    if id.is_empty() {
        return new_tool_call_id();
    }
    if id.starts_with("toolu_") {
        return id.to_string();
    }
    format!("toolu_{id}")
}

/// Map an Anthropic `toolu_` id back to the upstream's id scheme.
///
/// Identity for every supported upstream; kept as a seam and invoked on both
/// outbound paths.
#[must_use]
pub fn denormalize_tool_call_id(id: &str) -> String {
    id.to_string()
}

fn short_hex() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    hex[..24].to_string()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_id_shape() {
        let id = new_message_id();
        assert!(id.starts_with("msg_"));
        assert_eq!(id.len(), "msg_".len() + 24);
        assert!(id["msg_".len()..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn tool_call_id_shape() {
        let id = new_tool_call_id();
        assert!(id.starts_with("toolu_"));
        assert_eq!(id.len(), "toolu_".len() + 24);
    }

    #[test]
    fn normalize_adds_prefix() {
        assert_eq!(normalize_tool_call_id("call_abc"), "toolu_call_abc");
    }

    #[test]
    fn normalize_keeps_existing_prefix() {
        assert_eq!(normalize_tool_call_id("toolu_01abc"), "toolu_01abc");
    }

    #[test]
    fn normalize_mints_for_empty() {
        let id = normalize_tool_call_id("");
        assert!(id.starts_with("toolu_"));
        assert_eq!(id.len(), "toolu_".len() + 24);
    }

    #[test]
    fn normalize_is_idempotent() {
        let once = normalize_tool_call_id("call_xyz");
        let twice = normalize_tool_call_id(&once);
        assert_eq!(once, twice);
        assert!(twice.starts_with("toolu_"));
    }

    #[test]
    fn denormalize_is_identity() {
        assert_eq!(denormalize_tool_call_id("toolu_01abc"), "toolu_01abc");
        assert_eq!(denormalize_tool_call_id("call_9"), "call_9");
    }

    #[test]
    fn ids_are_unique() {
        assert_ne!(new_message_id(), new_message_id());
        assert_ne!(new_tool_call_id(), new_tool_call_id());
    }
}
