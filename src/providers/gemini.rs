//! Gemini `generateContent` provider.
//!
//! Auth priority: config key → GEMINI_API_KEY → GOOGLE_API_KEY.
//!
//! Gemini 2.5 thinking models return parts tagged `thought: true`; only the
//! final non-thought text is handed back to the gateway.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use crate::error::{GateError, Result};

use super::{parse_provider_error, LLMProvider};

/// Gemini v1beta REST API base.
const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default model when none is configured.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

// ── Auth ─────────────────────────────────────────────────────────────────────

/// API key sent as the `?key=` query parameter.
#[derive(Clone)]
pub struct GeminiAuth(String);

impl std::fmt::Debug for GeminiAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("GeminiAuth([REDACTED])")
    }
}

impl GeminiAuth {
    /// Pick the first non-empty key: explicit config value, then environment.
    pub fn resolve(explicit_key: Option<&str>, env_key: Option<&str>) -> Option<Self> {
        explicit_key
            .into_iter()
            .chain(env_key)
            .find(|k| !k.is_empty())
            .map(|k| Self(k.to_string()))
    }
}

// ── Provider ──────────────────────────────────────────────────────────────────

/// Provider that speaks the Gemini REST API directly.
pub struct GeminiProvider {
    auth: GeminiAuth,
    model: String,
    base_url: String,
    client: Client,
}

impl std::fmt::Debug for GeminiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiProvider")
            .field("auth", &self.auth)
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl GeminiProvider {
    /// Build a provider that authenticates with an API key.
    pub fn new_with_key(api_key: &str, model: &str, timeout: Duration) -> Result<Self> {
        Self::new(GeminiAuth(api_key.to_string()), model, timeout)
    }

    pub fn new(auth: GeminiAuth, model: &str, timeout: Duration) -> Result<Self> {
        let model = if model.is_empty() {
            DEFAULT_GEMINI_MODEL
        } else {
            model
        };
        Ok(Self {
            auth,
            model: model.to_string(),
            base_url: GEMINI_API_BASE.to_string(),
            client: Self::build_client(timeout)?,
        })
    }

    /// Point the provider at a different API root (proxies, local fakes).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn build_client(timeout: Duration) -> Result<Client> {
        Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GateError::Config(format!("failed to build HTTP client: {}", e)))
    }

    /// Build the `generateContent` request body for a single user turn.
    pub fn build_request_body(&self, text: &str) -> Value {
        json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": text }]
            }],
            "generationConfig": {
                "temperature": 0.7,
                "maxOutputTokens": 4096
            }
        })
    }

    /// Extract final answer text from a Gemini API response.
    ///
    /// Thought parts are dropped. If the candidate only carries thoughts the
    /// thought text is returned instead, so the caller always gets something.
    pub fn extract_text(response: &Value) -> Option<String> {
        let parts = response["candidates"][0]["content"]["parts"].as_array()?;

        let final_parts: Vec<&str> = parts
            .iter()
            .filter(|p| !p["thought"].as_bool().unwrap_or(false))
            .filter_map(|p| p["text"].as_str())
            .collect();
        if !final_parts.is_empty() {
            return Some(final_parts.join(""));
        }

        let thought_parts: Vec<&str> = parts.iter().filter_map(|p| p["text"].as_str()).collect();
        if thought_parts.is_empty() {
            None
        } else {
            Some(thought_parts.join(""))
        }
    }

    /// Pull a readable message out of a Gemini error body.
    fn error_message(body: &str) -> String {
        serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|v| v["error"]["message"].as_str().map(String::from))
            .map(|m| format!("Gemini API error: {}", m))
            .unwrap_or_else(|| format!("Gemini API error: {}", body))
    }

    fn api_url(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

#[async_trait]
impl LLMProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini-native"
    }

    fn default_model(&self) -> &str {
        &self.model
    }

    async fn chat(&self, prompt: &str) -> Result<String> {
        debug!(model = %self.model, chars = prompt.len(), "Gemini request");

        let response = self
            .client
            .post(self.api_url())
            .query(&[("key", self.auth.0.as_str())])
            .json(&self.build_request_body(prompt))
            .send()
            .await
            .map_err(|e| GateError::Provider(format!("Gemini request failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            let json: Value = response.json().await.map_err(|e| {
                GateError::Provider(format!("Failed to parse Gemini response: {}", e))
            })?;
            return Self::extract_text(&json).ok_or_else(|| {
                GateError::Provider("Gemini response contained no text".to_string())
            });
        }

        let error_text = response.text().await.unwrap_or_default();
        Err(parse_provider_error(
            status.as_u16(),
            &Self::error_message(&error_text),
        ))
    }
}
