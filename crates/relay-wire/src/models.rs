//! Model-name mapping and the static model catalogue.
//!
//! Each upstream has its own canonical spelling for the same model family, so
//! mapping is per-upstream: an exact case-sensitive table first, then a
//! case-insensitive substring fallback on the family name. Unmatched names
//! pass through unchanged. The native upstream has no haiku-class model;
//! haiku maps to sonnet there.

use serde::{Deserialize, Serialize};

/// Which upstream a request is being prepared for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Upstream {
    /// Anthropic-wire-format upstream.
    Native,
    /// OpenAI-style chat-completions upstream.
    Legacy,
}

/// Canonical native model names.
pub const NATIVE_OPUS: &str = "claude-4.5-opus";
/// Canonical native sonnet name.
pub const NATIVE_SONNET: &str = "claude-4.5-sonnet";

/// Canonical legacy model names.
pub const LEGACY_OPUS: &str = "claude-opus-4.5";
/// Canonical legacy sonnet name.
pub const LEGACY_SONNET: &str = "claude-4.5";
/// Canonical legacy haiku name.
pub const LEGACY_HAIKU: &str = "claude-haiku-4.5";

/// Exact-match table for the native upstream.
const NATIVE_MODEL_MAP: &[(&str, &str)] = &[
    // Opus family
    ("claude-3-opus-20240229", NATIVE_OPUS),
    ("claude-3-opus", NATIVE_OPUS),
    ("claude-opus", NATIVE_OPUS),
    ("claude-opus-4-5-20251101", NATIVE_OPUS),
    ("opus", NATIVE_OPUS),
    // Sonnet family
    ("claude-3-sonnet-20240229", NATIVE_SONNET),
    ("claude-3-5-sonnet-20240620", NATIVE_SONNET),
    ("claude-3-5-sonnet-20241022", NATIVE_SONNET),
    ("claude-sonnet-4-5-20251101", NATIVE_SONNET),
    ("claude-3-sonnet", NATIVE_SONNET),
    ("claude-sonnet", NATIVE_SONNET),
    ("sonnet", NATIVE_SONNET),
    // Haiku family (no native haiku, served by sonnet)
    ("claude-3-haiku-20240307", NATIVE_SONNET),
    ("claude-3-5-haiku-20241022", NATIVE_SONNET),
    ("claude-haiku-4-5-20251001", NATIVE_SONNET),
    ("claude-3-haiku", NATIVE_SONNET),
    ("claude-haiku", NATIVE_SONNET),
    ("haiku", NATIVE_SONNET),
    // Native names pass through
    ("claude-4.5-opus", NATIVE_OPUS),
    ("claude-4.5-sonnet", NATIVE_SONNET),
];

/// Exact-match table for the legacy upstream.
const LEGACY_MODEL_MAP: &[(&str, &str)] = &[
    // Opus family
    ("claude-3-opus-20240229", LEGACY_OPUS),
    ("claude-3-opus", LEGACY_OPUS),
    ("claude-opus", LEGACY_OPUS),
    ("claude-opus-4-5-20251101", LEGACY_OPUS),
    ("opus", LEGACY_OPUS),
    // Sonnet family
    ("claude-3-sonnet-20240229", LEGACY_SONNET),
    ("claude-3-5-sonnet-20240620", LEGACY_SONNET),
    ("claude-3-5-sonnet-20241022", LEGACY_SONNET),
    ("claude-sonnet-4-5-20251101", LEGACY_SONNET),
    ("claude-3-sonnet", LEGACY_SONNET),
    ("claude-sonnet", LEGACY_SONNET),
    ("sonnet", LEGACY_SONNET),
    // Haiku family
    ("claude-3-haiku-20240307", LEGACY_HAIKU),
    ("claude-3-5-haiku-20241022", LEGACY_HAIKU),
    ("claude-haiku-4-5-20251001", LEGACY_HAIKU),
    ("claude-3-haiku", LEGACY_HAIKU),
    ("claude-haiku", LEGACY_HAIKU),
    ("haiku", LEGACY_HAIKU),
];

/// Map a caller-supplied model name to the upstream canonical name.
#[must_use]
pub fn map_model(model: &str, upstream: Upstream) -> String {
    let table = match upstream {
        Upstream::Native => NATIVE_MODEL_MAP,
        Upstream::Legacy => LEGACY_MODEL_MAP,
    };

    if let Some((_, mapped)) = table.iter().find(|(name, _)| *name == model) {
        return (*mapped).to_string();
    }

    let lower = model.to_lowercase();
    let fallback = match upstream {
        Upstream::Native => {
            if lower.contains("opus") {
                Some(NATIVE_OPUS)
            } else if lower.contains("sonnet") || lower.contains("haiku") {
                Some(NATIVE_SONNET)
            } else {
                None
            }
        }
        Upstream::Legacy => {
            if lower.contains("opus") {
                Some(LEGACY_OPUS)
            } else if lower.contains("sonnet") {
                Some(LEGACY_SONNET)
            } else if lower.contains("haiku") {
                Some(LEGACY_HAIKU)
            } else {
                None
            }
        }
    };

    fallback.map_or_else(|| model.to_string(), ToString::to_string)
}

/// One entry of the static `/v1/models` catalogue.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ModelEntry {
    /// Model id.
    pub id: String,
    /// Always `"model"`.
    pub object: String,
    /// Creation timestamp (seconds).
    pub created: i64,
    /// Owner string.
    pub owned_by: String,
    /// Human-readable name.
    pub display_name: String,
}

/// The static model catalogue served at `/v1/models`.
#[must_use]
pub fn model_catalogue() -> Vec<ModelEntry> {
    let entry = |id: &str, created: i64, display: &str| ModelEntry {
        id: id.to_string(),
        object: "model".to_string(),
        created,
        owned_by: "anthropic".to_string(),
        display_name: display.to_string(),
    };
    vec![
        entry("claude-3-opus-20240229", 1_709_251_200, "Claude 3 Opus"),
        entry("claude-3-5-sonnet-20241022", 1_729_555_200, "Claude 3.5 Sonnet"),
        entry("claude-3-5-haiku-20241022", 1_729_555_200, "Claude 3.5 Haiku"),
    ]
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_native() {
        assert_eq!(map_model("opus", Upstream::Native), NATIVE_OPUS);
        assert_eq!(map_model("sonnet", Upstream::Native), NATIVE_SONNET);
        assert_eq!(
            map_model("claude-3-5-sonnet-20241022", Upstream::Native),
            NATIVE_SONNET
        );
    }

    #[test]
    fn exact_match_legacy() {
        assert_eq!(map_model("opus", Upstream::Legacy), LEGACY_OPUS);
        assert_eq!(map_model("sonnet", Upstream::Legacy), LEGACY_SONNET);
        assert_eq!(map_model("haiku", Upstream::Legacy), LEGACY_HAIKU);
    }

    #[test]
    fn haiku_maps_to_sonnet_on_native() {
        assert_eq!(map_model("haiku", Upstream::Native), NATIVE_SONNET);
        assert_eq!(
            map_model("claude-3-5-haiku-20241022", Upstream::Native),
            NATIVE_SONNET
        );
    }

    #[test]
    fn substring_fallback_is_case_insensitive() {
        assert_eq!(
            map_model("Claude-OPUS-9-experimental", Upstream::Native),
            NATIVE_OPUS
        );
        assert_eq!(
            map_model("my-sonnet-build", Upstream::Legacy),
            LEGACY_SONNET
        );
        assert_eq!(map_model("HAIKU-mini", Upstream::Legacy), LEGACY_HAIKU);
    }

    #[test]
    fn unmatched_passes_through() {
        assert_eq!(map_model("gpt-5", Upstream::Native), "gpt-5");
        assert_eq!(map_model("deepseek-v3", Upstream::Legacy), "deepseek-v3");
    }

    #[test]
    fn native_names_pass_through_native() {
        assert_eq!(map_model("claude-4.5-opus", Upstream::Native), NATIVE_OPUS);
        assert_eq!(
            map_model("claude-4.5-sonnet", Upstream::Native),
            NATIVE_SONNET
        );
    }

    #[test]
    fn catalogue_shape() {
        let models = model_catalogue();
        assert_eq!(models.len(), 3);
        assert!(models.iter().all(|m| m.object == "model"));
        assert!(models.iter().all(|m| m.owned_by == "anthropic"));
        assert_eq!(models[0].id, "claude-3-opus-20240229");
    }
}
