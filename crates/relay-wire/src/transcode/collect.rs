//! Non-streaming response transcoder.
//!
//! The legacy upstream streams unconditionally, so the non-streaming caller
//! path consumes the same chunk stream and buffers it to completion, then
//! emits one Anthropic response object. Tool arguments that fail to parse get
//! one repair attempt (append a missing `}`); if still unparseable the raw
//! string is preserved rather than failing the whole request.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::warn;

use relay_core::{new_message_id, normalize_tool_call_id};

use crate::anthropic::{MessagesResponse, ResponseBlock, Usage};
use crate::legacy::{ChatChunk, ChunkUsage};

/// One buffered tool call.
#[derive(Clone, Debug, Default)]
struct CollectedCall {
    id: String,
    name: String,
    arguments: String,
}

/// Accumulates a full upstream stream into one response.
#[derive(Debug, Default)]
pub struct ResponseCollector {
    text: String,
    thinking: String,
    calls: BTreeMap<usize, CollectedCall>,
    finish_reason: Option<String>,
    usage: Option<ChunkUsage>,
}

impl ResponseCollector {
    /// Fresh collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one upstream chunk into the buffers.
    pub fn on_chunk(&mut self, chunk: &ChatChunk) {
        if let Some(usage) = chunk.usage {
            self.usage = Some(usage);
        }

        let Some(choice) = chunk.choices.first() else {
            return;
        };

        if let Some(thinking) = choice.delta.thinking_fragment() {
            self.thinking.push_str(thinking);
        }
        if let Some(content) = choice.delta.content.as_deref() {
            self.text.push_str(content);
        }

        for tc in &choice.delta.tool_calls {
            let call = self.calls.entry(tc.index.unwrap_or(0)).or_default();
            if let Some(id) = tc.id.as_deref() {
                if !id.is_empty() {
                    call.id = normalize_tool_call_id(id);
                }
            }
            if let Some(function) = &tc.function {
                if let Some(name) = function.name.as_deref() {
                    if !name.is_empty() {
                        call.name = name.to_string();
                    }
                }
                if let Some(args) = function.arguments.as_deref() {
                    call.arguments.push_str(args);
                }
            }
        }

        if let Some(reason) = &choice.finish_reason {
            self.finish_reason = Some(reason.clone());
        }
    }

    /// Build the final Anthropic response.
    ///
    /// `model` is the caller-visible name; `estimated_input_tokens` is used
    /// when the upstream did not report usage.
    #[must_use]
    pub fn into_response(self, model: &str, estimated_input_tokens: u64) -> MessagesResponse {
        let mut content: Vec<ResponseBlock> = Vec::new();

        if !self.thinking.is_empty() {
            content.push(ResponseBlock::Thinking {
                thinking: self.thinking.clone(),
            });
        }
        if !self.text.is_empty() {
            content.push(ResponseBlock::Text {
                text: self.text.clone(),
            });
        }

        let has_tools = self.calls.values().any(|c| !c.name.is_empty());
        for call in self.calls.values().filter(|c| !c.name.is_empty()) {
            content.push(ResponseBlock::ToolUse {
                id: normalize_tool_call_id(&call.id),
                name: call.name.clone(),
                input: parse_arguments(&call.name, &call.arguments),
            });
        }

        let stop_reason = if has_tools {
            "tool_use"
        } else {
            match self.finish_reason.as_deref() {
                Some("length") => "max_tokens",
                _ => "end_turn",
            }
        };

        let input_tokens = self
            .usage
            .filter(|u| u.prompt_tokens > 0)
            .map_or(estimated_input_tokens, |u| u.prompt_tokens);
        let output_tokens = self
            .usage
            .filter(|u| u.completion_tokens > 0)
            .map_or(self.text.len() as u64 / 4, |u| u.completion_tokens);

        if content.is_empty() {
            content.push(ResponseBlock::Text {
                text: String::new(),
            });
        }

        MessagesResponse {
            id: new_message_id(),
            response_type: "message".to_string(),
            role: "assistant".to_string(),
            content,
            model: model.to_string(),
            stop_reason: Some(stop_reason.to_string()),
            stop_sequence: None,
            usage: Usage {
                input_tokens,
                output_tokens,
            },
        }
    }
}

/// Parse accumulated tool arguments, repairing a truncated object if needed.
fn parse_arguments(name: &str, raw: &str) -> Value {
    if raw.is_empty() {
        return serde_json::json!({});
    }
    match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(first_err) => {
            let mut repaired = raw.trim().to_string();
            if !repaired.ends_with('}') {
                repaired.push('}');
            }
            match serde_json::from_str(&repaired) {
                Ok(value) => {
                    warn!(tool = name, "repaired truncated tool arguments");
                    value
                }
                Err(_) => {
                    warn!(tool = name, error = %first_err, "unparseable tool arguments, passing raw");
                    serde_json::json!({
                        "_raw_arguments": raw,
                        "_parse_error": first_err.to_string(),
                    })
                }
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::legacy::{ChunkChoice, ChunkDelta, FunctionDelta, ToolCallDelta};

    fn chunk(delta: ChunkDelta, finish: Option<&str>) -> ChatChunk {
        ChatChunk {
            choices: vec![ChunkChoice {
                delta,
                finish_reason: finish.map(String::from),
            }],
            usage: None,
        }
    }

    fn text_delta(text: &str) -> ChunkDelta {
        ChunkDelta {
            content: Some(text.to_string()),
            ..ChunkDelta::default()
        }
    }

    fn tool_delta(index: usize, id: Option<&str>, name: Option<&str>, args: &str) -> ChunkDelta {
        ChunkDelta {
            tool_calls: vec![ToolCallDelta {
                index: Some(index),
                id: id.map(String::from),
                function: Some(FunctionDelta {
                    name: name.map(String::from),
                    arguments: Some(args.to_string()),
                }),
            }],
            ..ChunkDelta::default()
        }
    }

    #[test]
    fn collects_text_to_single_block() {
        let mut c = ResponseCollector::new();
        c.on_chunk(&chunk(text_delta("Hello"), None));
        c.on_chunk(&chunk(text_delta(" world"), Some("stop")));
        let resp = c.into_response("sonnet", 3);

        assert_eq!(resp.role, "assistant");
        assert_eq!(resp.model, "sonnet");
        assert_eq!(resp.stop_reason.as_deref(), Some("end_turn"));
        assert_eq!(resp.content.len(), 1);
        match &resp.content[0] {
            ResponseBlock::Text { text } => assert_eq!(text, "Hello world"),
            _ => panic!("expected text block"),
        }
    }

    #[test]
    fn thinking_precedes_text() {
        let mut c = ResponseCollector::new();
        c.on_chunk(&chunk(
            ChunkDelta {
                reasoning_content: Some("pondering".into()),
                ..ChunkDelta::default()
            },
            None,
        ));
        c.on_chunk(&chunk(text_delta("answer"), Some("stop")));
        let resp = c.into_response("sonnet", 0);
        assert!(matches!(resp.content[0], ResponseBlock::Thinking { .. }));
        assert!(matches!(resp.content[1], ResponseBlock::Text { .. }));
    }

    #[test]
    fn tool_arguments_assembled_across_chunks() {
        let mut c = ResponseCollector::new();
        c.on_chunk(&chunk(tool_delta(0, Some("call_1"), Some("read"), "{\"path\":"), None));
        c.on_chunk(&chunk(tool_delta(0, None, None, "\"/x\"}"), Some("tool_calls")));
        let resp = c.into_response("sonnet", 0);

        assert_eq!(resp.stop_reason.as_deref(), Some("tool_use"));
        match &resp.content[0] {
            ResponseBlock::ToolUse { id, name, input } => {
                assert_eq!(id, "toolu_call_1");
                assert_eq!(name, "read");
                assert_eq!(input["path"], "/x");
            }
            _ => panic!("expected tool_use"),
        }
    }

    #[test]
    fn truncated_arguments_are_repaired() {
        let mut c = ResponseCollector::new();
        c.on_chunk(&chunk(tool_delta(0, Some("c"), Some("read"), "{\"path\":\"/x\""), None));
        let resp = c.into_response("sonnet", 0);
        match &resp.content[0] {
            ResponseBlock::ToolUse { input, .. } => assert_eq!(input["path"], "/x"),
            _ => panic!("expected tool_use"),
        }
    }

    #[test]
    fn hopeless_arguments_preserved_raw() {
        let mut c = ResponseCollector::new();
        c.on_chunk(&chunk(tool_delta(0, Some("c"), Some("read"), "not json ["), None));
        let resp = c.into_response("sonnet", 0);
        match &resp.content[0] {
            ResponseBlock::ToolUse { input, .. } => {
                assert_eq!(input["_raw_arguments"], "not json [");
                assert!(input["_parse_error"].is_string());
            }
            _ => panic!("expected tool_use"),
        }
    }

    #[test]
    fn empty_arguments_become_empty_object() {
        let mut c = ResponseCollector::new();
        c.on_chunk(&chunk(tool_delta(0, Some("c"), Some("status"), ""), None));
        let resp = c.into_response("sonnet", 0);
        match &resp.content[0] {
            ResponseBlock::ToolUse { input, .. } => {
                assert_eq!(input, &serde_json::json!({}));
            }
            _ => panic!("expected tool_use"),
        }
    }

    #[test]
    fn tools_ordered_by_slot_index() {
        let mut c = ResponseCollector::new();
        c.on_chunk(&chunk(tool_delta(1, Some("b"), Some("second"), "{}"), None));
        c.on_chunk(&chunk(tool_delta(0, Some("a"), Some("first"), "{}"), None));
        let resp = c.into_response("sonnet", 0);
        let names: Vec<&str> = resp
            .content
            .iter()
            .filter_map(|b| match b {
                ResponseBlock::ToolUse { name, .. } => Some(name.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(names, vec!["first", "second"]);
    }

    #[test]
    fn usage_preferred_over_estimates() {
        let mut c = ResponseCollector::new();
        c.on_chunk(&chunk(text_delta("hi"), None));
        c.on_chunk(&ChatChunk {
            choices: vec![ChunkChoice {
                delta: ChunkDelta::default(),
                finish_reason: Some("stop".into()),
            }],
            usage: Some(ChunkUsage {
                prompt_tokens: 11,
                completion_tokens: 5,
            }),
        });
        let resp = c.into_response("sonnet", 99);
        assert_eq!(resp.usage.input_tokens, 11);
        assert_eq!(resp.usage.output_tokens, 5);
    }

    #[test]
    fn estimates_used_without_usage() {
        let mut c = ResponseCollector::new();
        c.on_chunk(&chunk(text_delta(&"x".repeat(20)), Some("stop")));
        let resp = c.into_response("sonnet", 99);
        assert_eq!(resp.usage.input_tokens, 99);
        assert_eq!(resp.usage.output_tokens, 5);
    }

    #[test]
    fn length_maps_to_max_tokens() {
        let mut c = ResponseCollector::new();
        c.on_chunk(&chunk(text_delta("partial"), Some("length")));
        let resp = c.into_response("sonnet", 0);
        assert_eq!(resp.stop_reason.as_deref(), Some("max_tokens"));
    }

    #[test]
    fn empty_stream_yields_empty_text_block() {
        let c = ResponseCollector::new();
        let resp = c.into_response("sonnet", 0);
        assert_eq!(resp.content.len(), 1);
        match &resp.content[0] {
            ResponseBlock::Text { text } => assert!(text.is_empty()),
            _ => panic!("expected empty text block"),
        }
        assert_eq!(resp.stop_reason.as_deref(), Some("end_turn"));
    }

    #[test]
    fn message_id_is_minted() {
        let resp = ResponseCollector::new().into_response("sonnet", 0);
        assert!(resp.id.starts_with("msg_"));
        assert_eq!(resp.response_type, "message");
    }
}
