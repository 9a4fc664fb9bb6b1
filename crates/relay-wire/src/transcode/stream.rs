//! Streaming response transcoder: legacy chat chunks → Anthropic SSE events.
//!
//! A per-request state machine. Block indices are handed out in the order
//! blocks are first observed, not by type — callers reconstruct content by
//! index. Tool calls are accumulated in index-keyed slots; a slot's
//! `content_block_start` is deferred until both id and name are known, and any
//! arguments that arrived early are flushed right after it as a single
//! `input_json_delta`.
//!
//! One upstream bug is worked around here: the same tool call occasionally
//! streams several complete JSON objects back to back. When the accumulated
//! arguments already end with `}` and a new fragment starts with `{`, the
//! slot is marked completed and the extra objects are dropped.

use std::collections::BTreeMap;

use tracing::{info, warn};

use relay_core::{new_message_id, normalize_tool_call_id};

use crate::anthropic::{
    BlockDelta, MessageDeltaBody, MessagesResponse, OutputUsage, ResponseBlock, StreamEvent, Usage,
};
use crate::legacy::{ChatChunk, ChunkUsage, ToolCallDelta};

/// Mutable per-stream accumulator for one tool call slot.
#[derive(Clone, Debug, Default)]
pub struct ToolCallSlot {
    /// Normalized tool call id.
    pub id: String,
    /// Tool name.
    pub name: String,
    /// Arguments string under construction.
    pub arguments: String,
    /// Whether `content_block_start` has been emitted.
    pub started: bool,
    /// Duplicate-object guard: further fragments are dropped once set.
    pub completed: bool,
    /// Assigned Anthropic content-block slot.
    pub block_index: usize,
}

/// State machine emitting the Anthropic SSE sequence for one request.
#[derive(Debug)]
pub struct StreamTranscoder {
    message_id: String,
    model: String,
    estimated_input_tokens: u64,
    next_block_index: usize,
    text_index: Option<usize>,
    thinking_index: Option<usize>,
    slots: BTreeMap<usize, ToolCallSlot>,
    finish_reason: Option<String>,
    usage: Option<ChunkUsage>,
    text_chars: usize,
}

impl StreamTranscoder {
    /// New transcoder for a request against `model` (the caller-visible name).
    #[must_use]
    pub fn new(model: impl Into<String>, estimated_input_tokens: u64) -> Self {
        Self {
            message_id: new_message_id(),
            model: model.into(),
            estimated_input_tokens,
            next_block_index: 0,
            text_index: None,
            thinking_index: None,
            slots: BTreeMap::new(),
            finish_reason: None,
            usage: None,
            text_chars: 0,
        }
    }

    /// The opening `message_start` event.
    #[must_use]
    pub fn message_start(&self) -> StreamEvent {
        StreamEvent::MessageStart {
            message: MessagesResponse {
                id: self.message_id.clone(),
                response_type: "message".to_string(),
                role: "assistant".to_string(),
                content: Vec::new(),
                model: self.model.clone(),
                stop_reason: None,
                stop_sequence: None,
                usage: Usage {
                    input_tokens: self.estimated_input_tokens,
                    output_tokens: 0,
                },
            },
        }
    }

    /// Process one upstream chunk, returning the events to emit.
    pub fn on_chunk(&mut self, chunk: &ChatChunk) -> Vec<StreamEvent> {
        let mut events = Vec::new();

        if let Some(usage) = chunk.usage {
            self.usage = Some(usage);
        }

        let Some(choice) = chunk.choices.first() else {
            return events;
        };

        if let Some(thinking) = choice.delta.thinking_fragment() {
            let index = match self.thinking_index {
                Some(index) => index,
                None => {
                    let index = self.allocate_block();
                    self.thinking_index = Some(index);
                    info!(index, "thinking block started");
                    events.push(StreamEvent::ContentBlockStart {
                        index,
                        content_block: ResponseBlock::Thinking {
                            thinking: String::new(),
                        },
                    });
                    index
                }
            };
            events.push(StreamEvent::ContentBlockDelta {
                index,
                delta: BlockDelta::ThinkingDelta {
                    thinking: thinking.to_string(),
                },
            });
        }

        if let Some(content) = choice.delta.content.as_deref() {
            if !content.is_empty() {
                let index = match self.text_index {
                    Some(index) => index,
                    None => {
                        let index = self.allocate_block();
                        self.text_index = Some(index);
                        info!(index, "text block started");
                        events.push(StreamEvent::ContentBlockStart {
                            index,
                            content_block: ResponseBlock::Text {
                                text: String::new(),
                            },
                        });
                        index
                    }
                };
                self.text_chars += content.len();
                events.push(StreamEvent::ContentBlockDelta {
                    index,
                    delta: BlockDelta::TextDelta {
                        text: content.to_string(),
                    },
                });
            }
        }

        for tc in &choice.delta.tool_calls {
            self.on_tool_call_delta(tc, &mut events);
        }

        if let Some(reason) = &choice.finish_reason {
            self.finish_reason = Some(reason.clone());
        }

        events
    }

    /// Handle one incremental tool-call fragment.
    fn on_tool_call_delta(&mut self, tc: &ToolCallDelta, events: &mut Vec<StreamEvent>) {
        let slot_key = tc.index.unwrap_or(0);
        let slot = self.slots.entry(slot_key).or_default();

        if let Some(id) = tc.id.as_deref() {
            if !id.is_empty() {
                slot.id = normalize_tool_call_id(id);
            }
        }

        let fragment = tc
            .function
            .as_ref()
            .and_then(|f| f.arguments.as_deref())
            .filter(|a| !a.is_empty());

        if let Some(name) = tc.function.as_ref().and_then(|f| f.name.as_deref()) {
            if !name.is_empty() {
                slot.name = name.to_string();
            }
        }

        // Accumulate before the start check so arguments that arrive in the
        // same fragment as the id/name are flushed with the block start.
        if let Some(new_args) = fragment {
            if slot.arguments.trim_end().ends_with('}') && new_args.trim_start().starts_with('{') {
                warn!(
                    slot = slot_key,
                    "multiple JSON objects concatenated in one tool call, dropping extra content"
                );
                slot.completed = true;
            } else if !slot.completed {
                slot.arguments.push_str(new_args);
            }
        }

        if !slot.id.is_empty() && !slot.name.is_empty() && !slot.started {
            slot.block_index = self.next_block_index;
            self.next_block_index += 1;
            slot.started = true;
            info!(name = %slot.name, index = slot.block_index, "tool block started");

            events.push(StreamEvent::ContentBlockStart {
                index: slot.block_index,
                content_block: ResponseBlock::ToolUse {
                    id: slot.id.clone(),
                    name: slot.name.clone(),
                    input: serde_json::json!({}),
                },
            });

            // Flush arguments accumulated before the block could start.
            if !slot.arguments.is_empty() {
                events.push(StreamEvent::ContentBlockDelta {
                    index: slot.block_index,
                    delta: BlockDelta::InputJsonDelta {
                        partial_json: slot.arguments.clone(),
                    },
                });
            }
        } else if let Some(new_args) = fragment {
            if slot.started && !slot.completed {
                events.push(StreamEvent::ContentBlockDelta {
                    index: slot.block_index,
                    delta: BlockDelta::InputJsonDelta {
                        partial_json: new_args.to_string(),
                    },
                });
            }
        }
    }

    /// Terminal events after the upstream stream ends: block stops in
    /// thinking → text → tools(ascending) order, then `message_delta`, then
    /// `message_stop`.
    #[must_use]
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        let mut events = Vec::new();

        if let Some(index) = self.thinking_index {
            events.push(StreamEvent::ContentBlockStop { index });
        }
        if let Some(index) = self.text_index {
            events.push(StreamEvent::ContentBlockStop { index });
        }
        for slot in self.slots.values() {
            if slot.started {
                events.push(StreamEvent::ContentBlockStop {
                    index: slot.block_index,
                });
            }
        }

        let output_tokens = self
            .usage
            .filter(|u| u.completion_tokens > 0)
            .map_or(self.text_chars as u64 / 4, |u| u.completion_tokens);

        events.push(StreamEvent::MessageDelta {
            delta: MessageDeltaBody {
                stop_reason: Some(self.stop_reason().to_string()),
                stop_sequence: None,
            },
            usage: OutputUsage { output_tokens },
        });
        events.push(StreamEvent::MessageStop);
        events
    }

    /// Map the remembered upstream finish reason to an Anthropic stop reason.
    #[must_use]
    pub fn stop_reason(&self) -> &'static str {
        if self.slots.values().any(|s| s.started) {
            return "tool_use";
        }
        match self.finish_reason.as_deref() {
            Some("length") => "max_tokens",
            Some("tool_calls") => "tool_use",
            _ => "end_turn",
        }
    }

    fn allocate_block(&mut self) -> usize {
        let index = self.next_block_index;
        self.next_block_index += 1;
        index
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
