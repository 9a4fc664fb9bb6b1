//! Anthropic Messages API wire types.
//!
//! The request side mirrors what Anthropic-speaking clients send to
//! `/v1/messages`: `system` is a string or a list of text blocks, and each
//! message's `content` is a string or an ordered list of typed blocks. The
//! block list is a tagged sum type decoded in one step so source order is
//! preserved — ordering governs tool-message interleaving downstream.
//!
//! The response side covers both the single-object response and the SSE event
//! sequence (`message_start` … `message_stop`) emitted to streaming callers.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ─────────────────────────────────────────────────────────────────────────────
// Request
// ─────────────────────────────────────────────────────────────────────────────

/// Inbound `/v1/messages` request body.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct MessagesRequest {
    /// Caller-supplied model name (mapped per upstream before forwarding).
    pub model: String,
    /// Conversation messages in order.
    pub messages: Vec<Message>,
    /// System prompt, string or text-block list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<SystemPrompt>,
    /// Requested output token budget.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Sampling temperature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Nucleus sampling parameter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    /// Stop sequences.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,
    /// Tool definitions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDefinition>>,
    /// Tool choice directive.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,
    /// Extended thinking configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking: Option<ThinkingConfig>,
    /// Whether the caller wants an SSE stream.
    #[serde(default)]
    pub stream: bool,
}

/// One conversation message.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Message {
    /// Message role.
    pub role: Role,
    /// String or ordered block-list content.
    #[serde(default)]
    pub content: MessageContent,
}

/// Message role.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions (some clients smuggle these into `messages`).
    System,
    /// End-user turn.
    User,
    /// Assistant turn.
    Assistant,
}

/// System prompt: plain string or ordered list of text blocks.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum SystemPrompt {
    /// Plain string form.
    Text(String),
    /// Block-list form.
    Blocks(Vec<SystemBlock>),
}

/// One system-prompt block. Extra fields (e.g. `cache_control`) are preserved.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SystemBlock {
    /// Block type (only `"text"` blocks carry prompt content).
    #[serde(rename = "type")]
    pub block_type: String,
    /// Text content.
    #[serde(default)]
    pub text: String,
    /// Passthrough for fields this gateway does not interpret.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Message content: plain string or ordered typed blocks.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    /// Plain string form.
    Text(String),
    /// Typed block list, source order preserved.
    Blocks(Vec<ContentBlock>),
}

impl Default for MessageContent {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

/// One typed content block.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Plain text.
    Text {
        /// Text content.
        #[serde(default)]
        text: String,
    },
    /// Image, base64 or URL sourced.
    Image {
        /// Image source.
        source: MediaSource,
    },
    /// Binary document (PDF etc.).
    Document {
        /// Document source.
        source: MediaSource,
    },
    /// Assistant tool invocation.
    ToolUse {
        /// Tool call id.
        id: String,
        /// Tool name.
        name: String,
        /// Tool arguments.
        #[serde(default)]
        input: Value,
    },
    /// Tool output returned on a user turn.
    ToolResult {
        /// Id of the tool call this answers.
        tool_use_id: String,
        /// Result content, string or text-part list.
        #[serde(default)]
        content: ToolResultContent,
        /// Whether the tool errored.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
    },
    /// Extended thinking.
    Thinking {
        /// Thinking text.
        #[serde(default)]
        thinking: String,
        /// Integrity signature.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        signature: Option<String>,
    },
    /// Encrypted thinking; carries no forwardable content.
    RedactedThinking {
        /// Opaque ciphertext.
        #[serde(default)]
        data: String,
    },
    /// Unrecognized block type, tolerated and skipped.
    #[serde(other)]
    Unknown,
}

/// Image/document source.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MediaSource {
    /// Inline base64 payload.
    Base64 {
        /// MIME type.
        media_type: String,
        /// Base64 data.
        data: String,
    },
    /// Remote URL.
    Url {
        /// The URL.
        url: String,
    },
}

/// Tool result content: string or text-part list.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ToolResultContent {
    /// Plain string form.
    Text(String),
    /// Part-list form.
    Blocks(Vec<ToolResultBlock>),
}

impl Default for ToolResultContent {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

/// One tool-result part.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolResultBlock {
    /// Text part.
    Text {
        /// Text content.
        #[serde(default)]
        text: String,
    },
    /// Unrecognized part type, skipped.
    #[serde(other)]
    Unknown,
}

/// One tool definition.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ToolDefinition {
    /// Tool name.
    pub name: String,
    /// Tool description.
    #[serde(default)]
    pub description: String,
    /// JSON Schema of the tool input.
    #[serde(default)]
    pub input_schema: Value,
}

/// Tool choice directive: `"auto"`/`"any"`/`"none"` or a named tool.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ToolChoice {
    /// String form.
    Mode(String),
    /// Object form: `{"type": "tool", "name": ...}` or `{"type": "auto"}`.
    Typed {
        /// Choice type.
        #[serde(rename = "type")]
        choice_type: String,
        /// Tool name when `choice_type == "tool"`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
}

/// Extended thinking configuration.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ThinkingConfig {
    /// `"enabled"` or `"disabled"`.
    #[serde(rename = "type")]
    pub config_type: String,
    /// Token budget for thinking.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget_tokens: Option<u64>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Response
// ─────────────────────────────────────────────────────────────────────────────

/// Single (non-streaming) Messages response.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct MessagesResponse {
    /// Message id (`msg_…`).
    pub id: String,
    /// Always `"message"`.
    #[serde(rename = "type")]
    pub response_type: String,
    /// Always `"assistant"`.
    pub role: String,
    /// Response content blocks.
    pub content: Vec<ResponseBlock>,
    /// Model name echoed back to the caller.
    pub model: String,
    /// Terminal stop reason.
    pub stop_reason: Option<String>,
    /// Matched stop sequence, if any.
    pub stop_sequence: Option<String>,
    /// Token usage.
    pub usage: Usage,
}

/// One response content block.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseBlock {
    /// Text block.
    Text {
        /// Text content.
        text: String,
    },
    /// Thinking block.
    Thinking {
        /// Thinking content.
        thinking: String,
    },
    /// Tool invocation block.
    ToolUse {
        /// Tool call id (`toolu_…`).
        id: String,
        /// Tool name.
        name: String,
        /// Parsed arguments.
        input: Value,
    },
}

/// Token usage counters.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize)]
pub struct Usage {
    /// Input tokens.
    pub input_tokens: u64,
    /// Output tokens.
    pub output_tokens: u64,
}

// ─────────────────────────────────────────────────────────────────────────────
// SSE events
// ─────────────────────────────────────────────────────────────────────────────

/// One event in the Anthropic SSE sequence sent to streaming callers.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Opening envelope.
    MessageStart {
        /// Message envelope with empty content.
        message: MessagesResponse,
    },
    /// A content block opens at `index`.
    ContentBlockStart {
        /// Block slot.
        index: usize,
        /// The opening (empty) block.
        content_block: ResponseBlock,
    },
    /// Incremental content for an open block.
    ContentBlockDelta {
        /// Block slot.
        index: usize,
        /// The delta payload.
        delta: BlockDelta,
    },
    /// A content block closes.
    ContentBlockStop {
        /// Block slot.
        index: usize,
    },
    /// Terminal metadata before `message_stop`.
    MessageDelta {
        /// Stop reason / sequence.
        delta: MessageDeltaBody,
        /// Output token usage.
        usage: OutputUsage,
    },
    /// End of message.
    MessageStop,
    /// Terminal error event.
    Error {
        /// Error payload.
        error: StreamError,
    },
}

/// Delta payload inside `content_block_delta`.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockDelta {
    /// Text fragment.
    TextDelta {
        /// The fragment.
        text: String,
    },
    /// Thinking fragment.
    ThinkingDelta {
        /// The fragment.
        thinking: String,
    },
    /// Partial tool-arguments JSON.
    InputJsonDelta {
        /// The JSON fragment.
        partial_json: String,
    },
}

/// Body of `message_delta`.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct MessageDeltaBody {
    /// Terminal stop reason.
    pub stop_reason: Option<String>,
    /// Matched stop sequence.
    pub stop_sequence: Option<String>,
}

/// Usage fragment carried by `message_delta`.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct OutputUsage {
    /// Output tokens.
    pub output_tokens: u64,
}

/// Error payload of a terminal `error` event.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct StreamError {
    /// Anthropic error type string.
    #[serde(rename = "type")]
    pub error_type: String,
    /// Human-readable message.
    pub message: String,
}

impl StreamEvent {
    /// SSE `event:` field name for this event.
    #[must_use]
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::MessageStart { .. } => "message_start",
            Self::ContentBlockStart { .. } => "content_block_start",
            Self::ContentBlockDelta { .. } => "content_block_delta",
            Self::ContentBlockStop { .. } => "content_block_stop",
            Self::MessageDelta { .. } => "message_delta",
            Self::MessageStop => "message_stop",
            Self::Error { .. } => "error",
        }
    }

    /// Serialize into one SSE record (`event:` line, `data:` line, blank line).
    #[must_use]
    pub fn to_sse(&self) -> String {
        let data = serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string());
        format!("event: {}\ndata: {}\n\n", self.event_name(), data)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
