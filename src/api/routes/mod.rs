//! Route handlers, one module per resource.

pub mod cache;
pub mod chat;
pub mod export;
pub mod health;
pub mod history;
