//! # relay-core
//!
//! Shared building blocks for the relay gateway: message/tool id minting,
//! the gateway error taxonomy, and the SSE line parser used to consume
//! upstream streams.

#![deny(unsafe_code)]

pub mod error;
pub mod ids;
pub mod sse;

pub use error::GatewayError;
pub use ids::{denormalize_tool_call_id, new_message_id, new_tool_call_id, normalize_tool_call_id};
