//! HTTP surface: chat, history export, health and cache diagnostics.

pub mod routes;
pub mod server;

pub use server::{build_router, start_server, AppState};
