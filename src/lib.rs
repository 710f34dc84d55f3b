//! promptgate: a rate-limited, cached gateway in front of an LLM chat
//! provider.
//!
//! Requests pass a [`limiter::TokenBucket`] admission check, then a
//! [`cache::ResponseCache`] keyed by the exact prompt text; only misses reach
//! the upstream [`providers::LLMProvider`]. [`gateway::ChatGateway`] wires the
//! three together and is shared by the HTTP API and the CLI.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod gateway;
pub mod history;
pub mod limiter;
pub mod providers;
pub mod utils;

pub use error::{GateError, Result};
pub use gateway::ChatGateway;
