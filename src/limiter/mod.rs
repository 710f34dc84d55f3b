//! Admission control for the upstream model call.

pub mod token_bucket;

pub use token_bucket::TokenBucket;
