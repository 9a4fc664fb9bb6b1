//! Char-based token estimation.
//!
//! Best-effort heuristic used when the native count_tokens endpoint is
//! unavailable and for the pre-flight context-window check: 1 token ≈ 4
//! characters of mixed text; an image counts as 4 000 characters (1 000
//! tokens). Real values can differ by 10–20%.

use serde_json::Value;

use crate::legacy::{ChatContent, ChatMessage, ChatPart};

/// Characters attributed to one image.
const IMAGE_CHARS: u64 = 4_000;
/// Estimation divisor: 1 token ≈ 4 chars.
const CHARS_PER_TOKEN: u64 = 4;

/// Estimate input tokens for a raw count_tokens / messages request body.
#[must_use]
pub fn estimate_request_tokens(request: &Value) -> u64 {
    let mut chars: u64 = 0;

    match request.get("system") {
        Some(Value::String(s)) => chars += s.len() as u64,
        Some(Value::Array(blocks)) => {
            for block in blocks {
                if block.get("type").and_then(Value::as_str) == Some("text") {
                    chars += block
                        .get("text")
                        .and_then(Value::as_str)
                        .map_or(0, |t| t.len() as u64);
                }
            }
        }
        _ => {}
    }

    if let Some(Value::Array(messages)) = request.get("messages") {
        chars += messages_chars(messages);
    }

    if let Some(tools @ Value::Array(_)) = request.get("tools") {
        chars += serde_json::to_string(tools).map_or(0, |s| s.len() as u64);
    }

    chars / CHARS_PER_TOKEN
}

fn messages_chars(messages: &[Value]) -> u64 {
    let mut total: u64 = 0;
    for msg in messages {
        match msg.get("content") {
            Some(Value::String(s)) => total += s.len() as u64,
            Some(Value::Array(blocks)) => {
                for block in blocks {
                    total += block_chars(block);
                }
            }
            _ => {}
        }
    }
    total
}

fn block_chars(block: &Value) -> u64 {
    match block.get("type").and_then(Value::as_str) {
        Some("text") => block
            .get("text")
            .and_then(Value::as_str)
            .map_or(0, |t| t.len() as u64),
        Some("image") => IMAGE_CHARS,
        Some("tool_use") => block
            .get("input")
            .and_then(|i| serde_json::to_string(i).ok())
            .map_or(0, |s| s.len() as u64),
        Some("tool_result") => match block.get("content") {
            Some(Value::String(s)) => s.len() as u64,
            Some(Value::Array(items)) => items
                .iter()
                .filter(|i| i.get("type").and_then(Value::as_str) == Some("text"))
                .map(|i| {
                    i.get("text")
                        .and_then(Value::as_str)
                        .map_or(0, |t| t.len() as u64)
                })
                .sum(),
            _ => 0,
        },
        _ => 0,
    }
}

/// Estimate input tokens for an already-transcoded chat message list.
#[must_use]
pub fn estimate_chat_tokens(messages: &[ChatMessage]) -> u64 {
    messages
        .iter()
        .map(|msg| match &msg.content {
            ChatContent::Text(s) => s.len() as u64 / CHARS_PER_TOKEN,
            ChatContent::Parts(parts) => parts
                .iter()
                .map(|p| match p {
                    ChatPart::Text { text } => text.len() as u64 / CHARS_PER_TOKEN,
                    ChatPart::ImageUrl { .. } => IMAGE_CHARS / CHARS_PER_TOKEN,
                })
                .sum(),
        })
        .sum()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::legacy::ImageUrl;
    use serde_json::json;

    #[test]
    fn empty_request_is_zero() {
        assert_eq!(estimate_request_tokens(&json!({})), 0);
    }

    #[test]
    fn counts_string_system_and_messages() {
        let req = json!({
            "system": "aaaa",
            "messages": [{"role": "user", "content": "bbbbbbbb"}]
        });
        // (4 + 8) / 4 = 3
        assert_eq!(estimate_request_tokens(&req), 3);
    }

    #[test]
    fn counts_system_blocks() {
        let req = json!({
            "system": [{"type": "text", "text": "aaaaaaaa"}],
            "messages": []
        });
        assert_eq!(estimate_request_tokens(&req), 2);
    }

    #[test]
    fn image_counts_fixed_chars() {
        let req = json!({
            "messages": [{"role": "user", "content": [
                {"type": "image", "source": {"type": "base64", "media_type": "image/png", "data": "AAA"}}
            ]}]
        });
        assert_eq!(estimate_request_tokens(&req), 1_000);
    }

    #[test]
    fn tool_use_and_result_count_by_length() {
        let req = json!({
            "messages": [
                {"role": "assistant", "content": [
                    {"type": "tool_use", "id": "toolu_1", "name": "read", "input": {"path": "/x"}}
                ]},
                {"role": "user", "content": [
                    {"type": "tool_result", "tool_use_id": "toolu_1", "content": "12345678"}
                ]}
            ]
        });
        // input json {"path":"/x"} = 14 chars, result 8 chars → 22/4 = 5
        assert_eq!(estimate_request_tokens(&req), 5);
    }

    #[test]
    fn tools_count_by_serialized_length() {
        let req = json!({
            "messages": [],
            "tools": [{"name": "t", "input_schema": {"type": "object"}}]
        });
        let expected = serde_json::to_string(&req["tools"]).unwrap().len() as u64 / 4;
        assert_eq!(estimate_request_tokens(&req), expected);
    }

    #[test]
    fn chat_tokens_string_content() {
        let messages = vec![ChatMessage::text("user", "x".repeat(40))];
        assert_eq!(estimate_chat_tokens(&messages), 10);
    }

    #[test]
    fn chat_tokens_image_part() {
        let messages = vec![ChatMessage {
            role: "user".into(),
            content: ChatContent::Parts(vec![ChatPart::ImageUrl {
                image_url: ImageUrl {
                    url: "data:image/png;base64,AAA".into(),
                },
            }]),
            tool_calls: None,
            tool_call_id: None,
        }];
        assert_eq!(estimate_chat_tokens(&messages), 1_000);
    }
}
