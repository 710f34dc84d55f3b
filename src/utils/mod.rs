//! Shared helpers.

pub mod clock;
pub mod text;
