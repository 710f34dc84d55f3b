//! LLM response caching with TTL expiry, LRU eviction and hit/miss statistics.

pub mod response_cache;
pub mod stats;

pub use response_cache::{Lookup, ResponseCache};
pub use stats::CacheStats;
