//! # relay-wire
//!
//! Wire formats and the bidirectional protocol adapter:
//! - [`anthropic`]: Anthropic Messages API request/response/SSE types
//! - [`legacy`]: OpenAI-style chat-completions types consumed upstream
//! - [`transcode`]: Anthropic → chat request build, and the streaming /
//!   collected response transcoders back into Anthropic shape
//! - [`rewrite`]: reserved-header strip and moderation-trigger sanitisation
//! - [`models`]: per-upstream model-name mapping and the static catalogue
//! - [`schema`]: tool input-schema cleanup for strict upstreams
//! - [`estimate`]: char-based token heuristics

#![deny(unsafe_code)]

pub mod anthropic;
pub mod estimate;
pub mod legacy;
pub mod models;
pub mod rewrite;
pub mod schema;
pub mod transcode;

pub use models::Upstream;
