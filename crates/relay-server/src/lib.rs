//! # relay-server
//!
//! The gateway's HTTP surface: an axum server exposing the Anthropic
//! Messages API, routing each request to the native upstream (passthrough)
//! or the legacy chat-completions upstream (full transcoding), with
//! quota-driven failover in hybrid mode.

#![deny(unsafe_code)]

pub mod config;
pub mod handlers;
pub mod logging;
pub mod routes;
pub mod state;
pub mod upstream;

pub use config::{GatewayConfig, ProviderMode};
pub use routes::router;
pub use state::AppState;
