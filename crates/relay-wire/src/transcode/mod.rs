//! The bidirectional protocol adapter.
//!
//! [`request`] turns an Anthropic Messages request into the legacy chat
//! format; [`stream`] turns the legacy streaming response back into a
//! well-formed Anthropic SSE event sequence; [`collect`] buffers the same
//! stream into one Anthropic response object for non-streaming callers.

pub mod collect;
pub mod request;
pub mod stream;

pub use collect::ResponseCollector;
pub use request::{TranscodeOptions, build_chat_request};
pub use stream::StreamTranscoder;
