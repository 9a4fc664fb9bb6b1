//! OpenAI-style chat-completions wire types for the legacy upstream.
//!
//! Outbound: a flat message list with roles system/user/assistant/tool,
//! assistant `tool_calls[]` carrying stringified arguments, and data-URI
//! images. Inbound: streaming chunk/delta frames, including the vendor's
//! `reasoning_content` field for thinking output and index-keyed incremental
//! `tool_calls` deltas.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ─────────────────────────────────────────────────────────────────────────────
// Outbound request
// ─────────────────────────────────────────────────────────────────────────────

/// Chat-completions request body.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ChatRequest {
    /// Upstream model name.
    pub model: String,
    /// Flat message list, leading system message included.
    pub messages: Vec<ChatMessage>,
    /// The upstream requires streaming unconditionally.
    pub stream: bool,
    /// Output token cap.
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
    pub stop: Option<Vec<String>>,
    /// Tool definitions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ChatTool>>,
    /// Tool choice directive.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<Value>,
    /// Reasoning effort (thinking enablement).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_effort: Option<String>,
    /// Reasoning summary mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_summary: Option<String>,
}

/// One chat message.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ChatMessage {
    /// `system`, `user`, `assistant`, or `tool`.
    pub role: String,
    /// String or part-list content.
    pub content: ChatContent,
    /// Assistant tool invocations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ChatToolCall>>,
    /// Tool-call id answered by a `tool` message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    /// Plain-text message with the given role.
    #[must_use]
    pub fn text(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: ChatContent::Text(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }
}

/// Chat message content: string or multimodal part list.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ChatContent {
    /// Plain string form.
    Text(String),
    /// Multimodal part list.
    Parts(Vec<ChatPart>),
}

/// One multimodal content part.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatPart {
    /// Text part.
    Text {
        /// Text content.
        text: String,
    },
    /// Image part with a data-URI or remote URL.
    ImageUrl {
        /// URL wrapper.
        image_url: ImageUrl,
    },
}

/// Image URL wrapper.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ImageUrl {
    /// `data:<mime>;base64,<b64>` or a remote URL.
    pub url: String,
}

/// One assistant tool invocation.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ChatToolCall {
    /// Tool call id.
    pub id: String,
    /// Always `"function"`.
    #[serde(rename = "type")]
    pub call_type: String,
    /// Function name + stringified arguments.
    pub function: ChatFunction,
}

/// Function payload of a tool call.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ChatFunction {
    /// Function name.
    pub name: String,
    /// JSON-stringified arguments.
    pub arguments: String,
}

/// One tool definition in chat format.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ChatTool {
    /// Always `"function"`.
    #[serde(rename = "type")]
    pub tool_type: String,
    /// Function schema.
    pub function: ChatToolFunction,
}

/// Function schema of a tool definition.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ChatToolFunction {
    /// Tool name.
    pub name: String,
    /// Tool description.
    pub description: String,
    /// Cleaned JSON Schema.
    pub parameters: Value,
}

// ─────────────────────────────────────────────────────────────────────────────
// Inbound stream frames
// ─────────────────────────────────────────────────────────────────────────────

/// One streaming chunk (`data:` frame payload).
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ChatChunk {
    /// Choice list; only the first entry is meaningful.
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
    /// Usage counters, usually on the final chunk.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<ChunkUsage>,
}

/// One streamed choice.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ChunkChoice {
    /// Incremental delta.
    #[serde(default)]
    pub delta: ChunkDelta,
    /// Terminal finish reason, when present.
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Incremental assistant delta.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ChunkDelta {
    /// Text fragment.
    #[serde(default)]
    pub content: Option<String>,
    /// Thinking fragment (vendor field).
    #[serde(default)]
    pub reasoning_content: Option<String>,
    /// Thinking fragment (alternate field name).
    #[serde(default)]
    pub thinking: Option<String>,
    /// Incremental tool calls, keyed by `index`.
    #[serde(default)]
    pub tool_calls: Vec<ToolCallDelta>,
}

impl ChunkDelta {
    /// Thinking fragment, whichever field the upstream used.
    #[must_use]
    pub fn thinking_fragment(&self) -> Option<&str> {
        self.reasoning_content
            .as_deref()
            .filter(|s| !s.is_empty())
            .or_else(|| self.thinking.as_deref().filter(|s| !s.is_empty()))
    }
}

/// One incremental tool-call fragment.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ToolCallDelta {
    /// Stable slot index (missing means 0).
    #[serde(default)]
    pub index: Option<usize>,
    /// Tool call id, usually on the first fragment only.
    #[serde(default)]
    pub id: Option<String>,
    /// Function name / arguments fragments.
    #[serde(default)]
    pub function: Option<FunctionDelta>,
}

/// Incremental function fields.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct FunctionDelta {
    /// Function name fragment.
    #[serde(default)]
    pub name: Option<String>,
    /// Arguments JSON fragment.
    #[serde(default)]
    pub arguments: Option<String>,
}

/// Usage counters from the upstream.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize)]
pub struct ChunkUsage {
    /// Prompt tokens.
    #[serde(default)]
    pub prompt_tokens: u64,
    /// Completion tokens.
    #[serde(default)]
    pub completion_tokens: u64,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
