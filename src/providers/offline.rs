//! Placeholder provider used when no upstream credentials are configured.

use async_trait::async_trait;

use super::LLMProvider;
use crate::error::{GateError, Result};

/// Provider that fails every call with [`GateError::ProviderUnavailable`].
#[derive(Debug, Clone)]
pub struct OfflineProvider {
    reason: String,
}

impl OfflineProvider {
    pub fn new(reason: &str) -> Self {
        Self {
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
impl LLMProvider for OfflineProvider {
    fn name(&self) -> &str {
        "offline"
    }

    fn default_model(&self) -> &str {
        "none"
    }

    async fn chat(&self, _prompt: &str) -> Result<String> {
        Err(GateError::ProviderUnavailable(self.reason.clone()))
    }
}
