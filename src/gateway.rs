//! Admission + cache front door for upstream chat calls.
//!
//! A [`ChatGateway`] owns one [`TokenBucket`], one [`ResponseCache`] and the
//! provider stack. It is built once per process and shared as
//! `Arc<ChatGateway>` by the HTTP server and the CLI.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::cache::{Lookup, ResponseCache};
use crate::config::Config;
use crate::error::{GateError, Result};
use crate::limiter::TokenBucket;
use crate::providers::{build_provider, LLMProvider};

/// Message attached to [`GateError::RateLimited`] on rejection.
pub const RATE_LIMIT_MESSAGE: &str = "Rate limit exceeded. Please wait.";

pub struct ChatGateway {
    bucket: TokenBucket,
    cache: ResponseCache,
    provider: Arc<dyn LLMProvider>,
}

impl ChatGateway {
    pub fn new(bucket: TokenBucket, cache: ResponseCache, provider: Arc<dyn LLMProvider>) -> Self {
        Self {
            bucket,
            cache,
            provider,
        }
    }

    /// Build the bucket, cache and provider stack from `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let bucket = TokenBucket::from_config(&config.limiter)?;
        let cache = ResponseCache::from_config(&config.cache)?;
        let provider = build_provider(&config.provider)?;
        info!(
            provider = provider.name(),
            model = provider.default_model(),
            cache_capacity = cache.capacity(),
            cache_ttl_secs = cache.ttl().as_secs(),
            rate = bucket.capacity(),
            per_secs = bucket.per().as_secs_f64(),
            "Chat gateway ready"
        );
        Ok(Self::new(bucket, cache, provider))
    }

    /// Take one token from the bucket or fail with [`GateError::RateLimited`].
    pub fn admit(&self) -> Result<()> {
        if self.bucket.consume(1.0) {
            Ok(())
        } else {
            warn!(available = self.bucket.available(), "Request throttled");
            Err(GateError::RateLimited(RATE_LIMIT_MESSAGE.to_string()))
        }
    }

    /// Answer `prompt` from the cache, calling the provider on a miss.
    ///
    /// Does not consume a token; callers that already ran [`admit`](Self::admit)
    /// use this directly.
    pub async fn fetch(&self, prompt: &str) -> Result<Lookup> {
        let provider = Arc::clone(&self.provider);
        let lookup = self
            .cache
            .get_or_compute(prompt, |p| async move { provider.chat(&p).await })
            .await?;
        debug!(
            prompt_len = prompt.len(),
            cached = lookup.cached,
            elapsed_ms = lookup.elapsed_ms,
            "Prompt answered"
        );
        Ok(lookup)
    }

    /// [`admit`](Self::admit) then [`fetch`](Self::fetch).
    pub async fn ask(&self, prompt: &str) -> Result<Lookup> {
        self.admit()?;
        self.fetch(prompt).await
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub fn bucket(&self) -> &TokenBucket {
        &self.bucket
    }

    pub fn provider(&self) -> &dyn LLMProvider {
        self.provider.as_ref()
    }
}
