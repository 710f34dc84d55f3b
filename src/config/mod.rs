//! Configuration for promptgate.
//!
//! Resolution order: built-in defaults, then the JSON config file
//! (`~/.promptgate/config.json` unless overridden), then `PROMPTGATE_*`
//! environment variables. The provider API key is read from
//! `GEMINI_API_KEY` / `GOOGLE_API_KEY` when the file does not set one.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{GateError, Result};

/// Response cache settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of live entries.
    pub capacity: usize,
    /// Seconds an entry stays readable after insertion.
    pub ttl_secs: u64,
    /// Cap on retained latency samples (`None` keeps all of them).
    pub max_latency_samples: Option<usize>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 50,
            ttl_secs: 300,
            max_latency_samples: None,
        }
    }
}

/// Token bucket settings: `rate` requests per `per_secs` seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimiterConfig {
    pub rate: f64,
    pub per_secs: f64,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            rate: 10.0,
            per_secs: 60.0,
        }
    }
}

/// Upstream model settings.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Gemini API key. Falls back to the environment when unset.
    pub api_key: Option<String>,
    pub model: String,
    /// HTTP timeout for a single upstream call.
    pub timeout_secs: u64,
    /// Number of previous exchanges replayed into each prompt.
    pub memory_turns: usize,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gemini-2.0-flash".to_string(),
            timeout_secs: 120,
            memory_turns: 4,
        }
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .field("memory_turns", &self.memory_turns)
            .finish()
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

/// Chat history store settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Directory holding `chat_history.json` and text exports.
    pub dir: PathBuf,
    /// Number of turns returned by history and export endpoints.
    pub limit: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            dir: Config::dir().join("data"),
            limit: 20,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub cache: CacheConfig,
    pub limiter: LimiterConfig,
    pub provider: ProviderConfig,
    pub server: ServerConfig,
    pub history: HistoryConfig,
}

impl Config {
    /// Base directory: `~/.promptgate`.
    pub fn dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".promptgate")
    }

    /// Default config file path.
    pub fn path() -> PathBuf {
        Self::dir().join("config.json")
    }

    /// Load defaults, the config file (if present) and environment overrides.
    ///
    /// An explicit `path` must exist; the default path is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::load_from_path(p)?,
            None => {
                let default_path = Self::path();
                if default_path.exists() {
                    Self::load_from_path(&default_path)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse a JSON config file without applying overrides.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path).map_err(|e| {
            GateError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        let config: Config = serde_json::from_str(&data).map_err(|e| {
            GateError::Config(format!("invalid config {}: {}", path.display(), e))
        })?;
        debug!(path = %path.display(), "Loaded config file");
        Ok(config)
    }

    /// Apply `PROMPTGATE_*` overrides read through `lookup`.
    ///
    /// Unparseable numeric values are ignored so a typo in the environment
    /// never replaces a valid file setting with garbage.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let parsed = |key: &str| lookup(key).map(|v| v.trim().to_string());

        if let Some(v) = parsed("PROMPTGATE_CACHE_CAPACITY").and_then(|v| v.parse().ok()) {
            self.cache.capacity = v;
        }
        if let Some(v) = parsed("PROMPTGATE_CACHE_TTL_SECS").and_then(|v| v.parse().ok()) {
            self.cache.ttl_secs = v;
        }
        if let Some(v) = parsed("PROMPTGATE_LIMITER_RATE").and_then(|v| v.parse().ok()) {
            self.limiter.rate = v;
        }
        if let Some(v) = parsed("PROMPTGATE_LIMITER_PER_SECS").and_then(|v| v.parse().ok()) {
            self.limiter.per_secs = v;
        }
        if let Some(v) = parsed("PROMPTGATE_PROVIDER_MODEL").filter(|v| !v.is_empty()) {
            self.provider.model = v;
        }
        if let Some(v) = parsed("PROMPTGATE_SERVER_BIND").filter(|v| !v.is_empty()) {
            self.server.bind = v;
        }
        if let Some(v) = parsed("PROMPTGATE_SERVER_PORT").and_then(|v| v.parse().ok()) {
            self.server.port = v;
        }
        if let Some(v) = parsed("PROMPTGATE_HISTORY_DIR").filter(|v| !v.is_empty()) {
            self.history.dir = PathBuf::from(v);
        }
        if self.provider.api_key.as_deref().map_or(true, str::is_empty) {
            self.provider.api_key = ["GEMINI_API_KEY", "GOOGLE_API_KEY"]
                .into_iter()
                .filter_map(|key| parsed(key))
                .find(|k| !k.is_empty());
        }
    }

    /// Reject settings the cache and limiter cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.cache.capacity == 0 {
            return Err(GateError::Config("cache.capacity must be at least 1".into()));
        }
        if !self.limiter.rate.is_finite() || self.limiter.rate <= 0.0 {
            return Err(GateError::Config(format!(
                "limiter.rate must be positive, got {}",
                self.limiter.rate
            )));
        }
        let window = Duration::try_from_secs_f64(self.limiter.per_secs);
        if !matches!(window, Ok(d) if !d.is_zero()) {
            return Err(GateError::Config(format!(
                "limiter.per_secs must be a positive, representable duration, got {}",
                self.limiter.per_secs
            )));
        }
        if self.server.port == 0 {
            return Err(GateError::Config("server.port must be non-zero".into()));
        }
        if self.history.limit == 0 {
            return Err(GateError::Config("history.limit must be at least 1".into()));
        }
        Ok(())
    }
}
