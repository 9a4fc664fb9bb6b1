//! Anthropic → legacy chat request transcoding.
//!
//! The hard part is user messages with mixed content: `tool_result` blocks
//! must become standalone `{role: "tool"}` messages while the surrounding
//! text/image blocks stay user messages, in source order. Blocks are
//! buffered into a pending user message and flushed whenever a `tool_result`
//! is hit; losing that interleaving corrupts multi-tool conversations.

use serde_json::Value;
use tracing::debug;

use relay_core::{GatewayError, denormalize_tool_call_id};

use crate::anthropic::{
    ContentBlock, MediaSource, Message, MessageContent, MessagesRequest, Role, SystemPrompt,
    ToolChoice, ToolDefinition, ToolResultContent,
};
use crate::estimate::estimate_chat_tokens;
use crate::legacy::{
    ChatContent, ChatFunction, ChatMessage, ChatPart, ChatRequest, ChatTool, ChatToolCall,
    ChatToolFunction, ImageUrl,
};
use crate::rewrite::{sanitize_moderation, strip_reserved_headers};
use crate::schema::clean_tool_schema;

/// Assumed output budget when the caller did not send `max_tokens`; matches
/// the common client default.
const DEFAULT_REQUESTED_OUTPUT: u32 = 32_000;
/// Minimum leftover output budget below which the request is rejected.
const MIN_OUTPUT_BUDGET: u64 = 100;

/// Knobs for the request build.
#[derive(Clone, Copy, Debug)]
pub struct TranscodeOptions {
    /// Model context window in tokens.
    pub context_window: u64,
    /// Optional hard cap on requested output tokens (None = uncapped).
    pub max_output_tokens: Option<u32>,
}

impl Default for TranscodeOptions {
    fn default() -> Self {
        Self {
            context_window: 200_000,
            max_output_tokens: None,
        }
    }
}

/// Build the legacy chat request for an Anthropic Messages request.
///
/// `model` is the already-mapped upstream model name. Applies the reserved-
/// header strip and the moderation table, converts tools and tool_choice,
/// maps the thinking config, and enforces the context-window budget.
pub fn build_chat_request(
    request: &MessagesRequest,
    model: &str,
    options: &TranscodeOptions,
) -> Result<ChatRequest, GatewayError> {
    let converted = convert_messages(&request.messages);
    if converted.has_images {
        debug!("request contains image content");
    }

    let mut messages = Vec::with_capacity(converted.messages.len() + 1);

    let system = normalize_system(request.system.as_ref()).or(converted.system);
    if let Some(system) = system {
        let system = sanitize_moderation(&strip_reserved_headers(&system));
        messages.push(ChatMessage::text("system", system));
    }
    messages.extend(converted.messages);

    for msg in &mut messages {
        sanitize_message(msg);
    }

    let mut chat = ChatRequest {
        model: model.to_string(),
        messages,
        // The legacy upstream requires streaming; non-stream callers are
        // served by collecting this stream.
        stream: true,
        max_tokens: request.max_tokens,
        temperature: request.temperature,
        top_p: request.top_p,
        stop: request.stop_sequences.clone(),
        tools: None,
        tool_choice: None,
        reasoning_effort: None,
        reasoning_summary: None,
    };

    if let Some(cap) = options.max_output_tokens {
        if let Some(requested) = chat.max_tokens {
            if requested > cap {
                debug!(requested, cap, "capping max_tokens");
                chat.max_tokens = Some(cap);
            }
        }
    }

    if let Some(tools) = &request.tools {
        let converted = convert_tools(tools);
        if !converted.is_empty() {
            chat.tools = Some(converted);
        }
    }

    if let Some(choice) = &request.tool_choice {
        chat.tool_choice = convert_tool_choice(choice);
    }

    if let Some(thinking) = &request.thinking {
        if thinking.config_type == "enabled" {
            chat.reasoning_effort = Some("high".to_string());
            chat.reasoning_summary = Some("auto".to_string());
        }
    }

    enforce_context_budget(&mut chat, options)?;

    Ok(chat)
}

/// Check the context budget: clip `max_tokens` to the remaining window, or
/// reject outright when the input leaves no meaningful room for output.
fn enforce_context_budget(
    chat: &mut ChatRequest,
    options: &TranscodeOptions,
) -> Result<(), GatewayError> {
    let estimated_input = estimate_chat_tokens(&chat.messages);
    let requested_output = u64::from(chat.max_tokens.unwrap_or(DEFAULT_REQUESTED_OUTPUT));

    if estimated_input + requested_output > options.context_window {
        let available = options.context_window.saturating_sub(estimated_input);
        if available < MIN_OUTPUT_BUDGET {
            return Err(GatewayError::ContextTooLong(format!(
                "Input too long: estimated {estimated_input} tokens, max context is {} tokens. \
                 Please reduce the input length.",
                options.context_window
            )));
        }
        debug!(
            estimated_input,
            requested_output, available, "clipping max_tokens to remaining context"
        );
        chat.max_tokens = Some(requested_output.min(available) as u32);
    }
    Ok(())
}

/// Result of converting the Anthropic message list.
struct ConvertedMessages {
    /// System text found inside `messages` (some clients put it there).
    system: Option<String>,
    /// The flat chat message list.
    messages: Vec<ChatMessage>,
    /// Whether any image blocks were converted.
    has_images: bool,
}

/// Concatenate a typed system prompt into one string.
fn normalize_system(system: Option<&SystemPrompt>) -> Option<String> {
    match system? {
        SystemPrompt::Text(text) => Some(text.clone()),
        SystemPrompt::Blocks(blocks) => {
            let parts: Vec<&str> = blocks
                .iter()
                .filter(|b| b.block_type == "text")
                .map(|b| b.text.as_str())
                .collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join("\n"))
            }
        }
    }
}

/// Apply moderation sanitisation to every text carried by a chat message.
fn sanitize_message(msg: &mut ChatMessage) {
    match &mut msg.content {
        ChatContent::Text(text) => *text = sanitize_moderation(text),
        ChatContent::Parts(parts) => {
            for part in parts {
                if let ChatPart::Text { text } = part {
                    *text = sanitize_moderation(text);
                }
            }
        }
    }
}

/// Convert the ordered Anthropic message list into the flat chat list.
fn convert_messages(messages: &[Message]) -> ConvertedMessages {
    let mut system: Option<String> = None;
    let mut out: Vec<ChatMessage> = Vec::new();
    let mut has_images = false;

    for msg in messages {
        match msg.role {
            Role::System => {
                system = system_text(&msg.content).or(system);
            }
            Role::Assistant => out.push(convert_assistant(&msg.content)),
            Role::User => convert_user(&msg.content, &mut out, &mut has_images),
        }
    }

    ConvertedMessages {
        system,
        messages: out,
        has_images,
    }
}

/// Extract system text from a message smuggled into the `messages` list.
fn system_text(content: &MessageContent) -> Option<String> {
    match content {
        MessageContent::Text(text) => Some(text.clone()),
        MessageContent::Blocks(blocks) => {
            let parts: Vec<&str> = blocks
                .iter()
                .filter_map(|b| match b {
                    ContentBlock::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join("\n"))
            }
        }
    }
}

/// Convert one assistant message.
///
/// Thinking blocks collapse into a single `<thinking>`-wrapped prefix before
/// the text; `redacted_thinking` carries nothing forwardable and is dropped;
/// `tool_use` blocks become `tool_calls[]` entries.
fn convert_assistant(content: &MessageContent) -> ChatMessage {
    let mut text_parts: Vec<String> = Vec::new();
    let mut thinking_parts: Vec<String> = Vec::new();
    let mut tool_calls: Vec<ChatToolCall> = Vec::new();

    match content {
        MessageContent::Text(text) => text_parts.push(text.clone()),
        MessageContent::Blocks(blocks) => {
            for block in blocks {
                match block {
                    ContentBlock::Text { text } => text_parts.push(text.clone()),
                    ContentBlock::Thinking { thinking, .. } => {
                        if !thinking.is_empty() {
                            thinking_parts.push(thinking.clone());
                        }
                    }
                    ContentBlock::RedactedThinking { .. } => {}
                    ContentBlock::ToolUse { id, name, input } => {
                        tool_calls.push(ChatToolCall {
                            id: denormalize_tool_call_id(id),
                            call_type: "function".to_string(),
                            function: ChatFunction {
                                name: name.clone(),
                                arguments: serde_json::to_string(input)
                                    .unwrap_or_else(|_| "{}".to_string()),
                            },
                        });
                    }
                    _ => {}
                }
            }
        }
    }

    let mut all_parts: Vec<String> = Vec::new();
    if !thinking_parts.is_empty() {
        all_parts.push(format!("<thinking>\n{}\n</thinking>", thinking_parts.join("\n")));
    }
    all_parts.extend(text_parts);

    ChatMessage {
        role: "assistant".to_string(),
        content: ChatContent::Text(all_parts.join("\n")),
        tool_calls: if tool_calls.is_empty() {
            None
        } else {
            Some(tool_calls)
        },
        tool_call_id: None,
    }
}

/// Convert one user message, preserving tool_result interleaving.
fn convert_user(content: &MessageContent, out: &mut Vec<ChatMessage>, has_images: &mut bool) {
    match content {
        MessageContent::Text(text) => out.push(ChatMessage::text("user", text.clone())),
        MessageContent::Blocks(blocks) => {
            let mut pending: Vec<ChatPart> = Vec::new();

            for block in blocks {
                match block {
                    ContentBlock::Text { text } => {
                        pending.push(ChatPart::Text { text: text.clone() });
                    }
                    ContentBlock::Image { source } => {
                        pending.push(ChatPart::ImageUrl {
                            image_url: ImageUrl {
                                url: image_url(source),
                            },
                        });
                        *has_images = true;
                    }
                    ContentBlock::Document { source } => {
                        // The legacy upstream does not accept binary docs.
                        if let MediaSource::Base64 { media_type, .. } = source {
                            pending.push(ChatPart::Text {
                                text: format!("[Document: {media_type}]"),
                            });
                        }
                    }
                    ContentBlock::ToolResult {
                        tool_use_id,
                        content,
                        ..
                    } => {
                        flush_pending(&mut pending, out);
                        out.push(ChatMessage {
                            role: "tool".to_string(),
                            content: ChatContent::Text(tool_result_text(content)),
                            tool_calls: None,
                            tool_call_id: Some(denormalize_tool_call_id(tool_use_id)),
                        });
                    }
                    _ => {}
                }
            }

            flush_pending(&mut pending, out);
        }
    }
}

/// Flush buffered user parts as one user message.
///
/// A single text part collapses to string content; mixed parts stay an array.
fn flush_pending(pending: &mut Vec<ChatPart>, out: &mut Vec<ChatMessage>) {
    if pending.is_empty() {
        return;
    }
    let parts = std::mem::take(pending);
    let content = if let [ChatPart::Text { text }] = parts.as_slice() {
        ChatContent::Text(text.clone())
    } else {
        ChatContent::Parts(parts)
    };
    out.push(ChatMessage {
        role: "user".to_string(),
        content,
        tool_calls: None,
        tool_call_id: None,
    });
}

/// Tool result content as one string (list parts joined with `\n`).
fn tool_result_text(content: &ToolResultContent) -> String {
    match content {
        ToolResultContent::Text(text) => text.clone(),
        ToolResultContent::Blocks(blocks) => blocks
            .iter()
            .filter_map(|b| match b {
                crate::anthropic::ToolResultBlock::Text { text } => Some(text.as_str()),
                crate::anthropic::ToolResultBlock::Unknown => None,
            })
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

/// Data-URI (or passthrough URL) for an image source.
fn image_url(source: &MediaSource) -> String {
    match source {
        MediaSource::Base64 { media_type, data } => {
            format!("data:{media_type};base64,{data}")
        }
        MediaSource::Url { url } => url.clone(),
    }
}

/// Convert Anthropic tool definitions to chat format with cleaned schemas.
#[must_use]
pub fn convert_tools(tools: &[ToolDefinition]) -> Vec<ChatTool> {
    tools
        .iter()
        .map(|tool| ChatTool {
            tool_type: "function".to_string(),
            function: ChatToolFunction {
                name: tool.name.clone(),
                description: tool.description.clone(),
                parameters: clean_tool_schema(&tool.input_schema),
            },
        })
        .collect()
}

/// Map the Anthropic tool_choice to the chat equivalent.
///
/// `"any"` deliberately downgrades to `"auto"` — upstream `"required"`
/// support is unreliable.
#[must_use]
pub fn convert_tool_choice(choice: &ToolChoice) -> Option<Value> {
    match choice {
        ToolChoice::Mode(mode) => match mode.as_str() {
            "any" => Some(Value::String("auto".to_string())),
            other => Some(Value::String(other.to_string())),
        },
        ToolChoice::Typed { choice_type, name } => match choice_type.as_str() {
            "tool" => Some(serde_json::json!({
                "type": "function",
                "function": {"name": name.clone().unwrap_or_default()},
            })),
            "any" | "auto" => Some(Value::String("auto".to_string())),
            "none" => Some(Value::String("none".to_string())),
            _ => None,
        },
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
