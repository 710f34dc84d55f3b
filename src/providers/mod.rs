//! Upstream language-model providers.
//!
//! The cache and limiter only ever see [`LLMProvider::chat`]; everything
//! about credentials, HTTP and conversation memory lives behind it.

pub mod gemini;
pub mod memory;
pub mod offline;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::config::ProviderConfig;
use crate::error::{GateError, Result};

pub use gemini::{GeminiAuth, GeminiProvider};
pub use memory::MemoryProvider;
pub use offline::OfflineProvider;

/// A chat-completion backend: one prompt in, one answer out.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Short provider identifier used in logs.
    fn name(&self) -> &str;

    /// Model used when the caller does not pick one.
    fn default_model(&self) -> &str;

    /// Send `prompt` upstream and return the answer text.
    async fn chat(&self, prompt: &str) -> Result<String>;
}

/// Map an upstream HTTP failure onto a [`GateError`].
///
/// Auth failures make the provider unusable until reconfigured; everything
/// else (quota, overload, bad request) is reported as a provider error.
pub fn parse_provider_error(status: u16, message: &str) -> GateError {
    match status {
        401 | 403 => GateError::ProviderUnavailable(format!(
            "authentication rejected ({}): {}",
            status, message
        )),
        429 => GateError::Provider(format!("upstream quota exhausted (429): {}", message)),
        _ => GateError::Provider(format!("HTTP {}: {}", status, message)),
    }
}

/// Build the configured provider stack.
///
/// Without an API key the service still starts, backed by
/// [`OfflineProvider`], so history and export keep working.
pub fn build_provider(config: &ProviderConfig) -> Result<Arc<dyn LLMProvider>> {
    // Environment keys are already folded into `api_key` by config loading.
    let inner: Box<dyn LLMProvider> = match GeminiAuth::resolve(config.api_key.as_deref(), None) {
        Some(auth) => {
            info!(model = %config.model, "Using Gemini provider");
            Box::new(GeminiProvider::new(
                auth,
                &config.model,
                std::time::Duration::from_secs(config.timeout_secs),
            )?)
        }
        None => {
            warn!("GOOGLE_API_KEY not found. Chat functionality will be limited.");
            Box::new(OfflineProvider::new(
                "GOOGLE_API_KEY / GEMINI_API_KEY is not configured",
            ))
        }
    };
    Ok(Arc::new(MemoryProvider::new(inner, config.memory_turns)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_provider_error_auth() {
        let err = parse_provider_error(401, "bad key");
        assert!(matches!(err, GateError::ProviderUnavailable(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_parse_provider_error_quota() {
        let err = parse_provider_error(429, "slow down");
        match &err {
            GateError::Provider(msg) => assert!(msg.contains("429"), "{msg}"),
            other => panic!("expected Provider, got {other:?}"),
        }
        assert!(err.is_retryable());
    }

    #[test]
    fn test_parse_provider_error_server() {
        let err = parse_provider_error(503, "overloaded");
        assert!(err.to_string().contains("HTTP 503: overloaded"));
    }

    #[tokio::test]
    async fn test_build_provider_without_key_is_offline() {
        let cfg = ProviderConfig::default();
        let provider = build_provider(&cfg).unwrap();
        assert_eq!(provider.name(), "offline");
        let err = provider.chat("hello").await.unwrap_err();
        assert!(matches!(err, GateError::ProviderUnavailable(_)));
    }

    #[test]
    fn test_build_provider_with_key_is_gemini() {
        let cfg = ProviderConfig {
            api_key: Some("test-key".into()),
            ..Default::default()
        };
        let provider = build_provider(&cfg).unwrap();
        assert_eq!(provider.name(), "gemini-native");
        assert_eq!(provider.default_model(), "gemini-2.0-flash");
    }
}
