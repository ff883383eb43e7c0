//! Configuration for Boardroom.
//!
//! Load order: defaults, then an optional TOML file, then environment
//! overrides. Every field carries a serde default so partial files are valid.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::Error;
use crate::result::{Result, ResultExt};

/// Environment variable overriding `backend.model`.
pub const ENV_MODEL: &str = "BOARDROOM_MODEL";
/// Environment variable overriding `backend.base_url`.
pub const ENV_BASE_URL: &str = "BOARDROOM_BASE_URL";
/// Environment variable overriding `backend.max_tokens`.
pub const ENV_MAX_TOKENS: &str = "BOARDROOM_MAX_TOKENS";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoardroomConfig {
    #[serde(default)]
    pub backend: BackendSettings,

    /// Default policy for every worker without an override.
    #[serde(default)]
    pub resilience: ResilienceSettings,

    #[serde(default)]
    pub mail: MailSettings,

    #[serde(default)]
    pub memory: MemorySettings,

    #[serde(default)]
    pub usage: UsageSettings,
}

/// Chat-completion backend settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendSettings {
    /// Root of the chat-completions API, e.g. `https://api.openai.com/v1`.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(
        rename = "request_timeout_secs",
        with = "duration_secs",
        default = "default_request_timeout"
    )]
    pub request_timeout: Duration,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            api_key_env: default_api_key_env(),
            request_timeout: default_request_timeout(),
        }
    }
}

/// Retry, delay, jitter and timeout for one invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResilienceSettings {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(rename = "delay_ms", with = "duration_millis", default = "default_delay")]
    pub delay: Duration,

    #[serde(rename = "jitter_ms", with = "duration_millis", default = "default_jitter")]
    pub jitter: Duration,

    #[serde(rename = "timeout_secs", with = "duration_secs", default = "default_timeout")]
    pub timeout: Duration,
}

impl Default for ResilienceSettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            delay: default_delay(),
            jitter: default_jitter(),
            timeout: default_timeout(),
        }
    }
}

/// Email flow settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailSettings {
    /// Rewrite the body through the model before sending.
    #[serde(default = "default_true")]
    pub rewrite_body: bool,

    /// System message used for the rewrite.
    #[serde(default = "default_rewrite_instruction")]
    pub rewrite_instruction: String,

    #[serde(default)]
    pub resilience: ResilienceSettings,
}

impl Default for MailSettings {
    fn default() -> Self {
        Self {
            rewrite_body: true,
            rewrite_instruction: default_rewrite_instruction(),
            resilience: ResilienceSettings::default(),
        }
    }
}

/// Chat memory retention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemorySettings {
    /// Maximum turns kept per session.
    #[serde(default = "default_memory_capacity")]
    pub capacity: usize,

    #[serde(default = "default_memory_max_sessions")]
    pub max_sessions: u64,

    #[serde(rename = "idle_ttl_secs", with = "duration_secs", default = "default_memory_idle_ttl")]
    pub idle_ttl: Duration,
}

impl Default for MemorySettings {
    fn default() -> Self {
        Self {
            capacity: default_memory_capacity(),
            max_sessions: default_memory_max_sessions(),
            idle_ttl: default_memory_idle_ttl(),
        }
    }
}

/// Usage ledger retention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageSettings {
    #[serde(default = "default_usage_max_sessions")]
    pub max_sessions: u64,

    #[serde(rename = "idle_ttl_secs", with = "duration_secs", default = "default_usage_idle_ttl")]
    pub idle_ttl: Duration,
}

impl Default for UsageSettings {
    fn default() -> Self {
        Self {
            max_sessions: default_usage_max_sessions(),
            idle_ttl: default_usage_idle_ttl(),
        }
    }
}

impl BoardroomConfig {
    /// Load configuration from an optional file, then apply environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if the
    /// resulting configuration fails validation.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        let config = config.with_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigReadFailed` or `Error::TomlParseFailed`.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::config_read_failed(path, e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns `Error::TomlParseFailed` if the text is not valid configuration.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::toml_parse_failed(e.to_string()))
    }

    /// Apply overrides from a key lookup (normally the process environment).
    ///
    /// Unparseable values are logged and ignored.
    #[must_use]
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(model) = lookup(ENV_MODEL) {
            self.backend.model = model;
        }

        if let Some(url) = lookup(ENV_BASE_URL)
            .and_then(|raw| Url::parse(&raw).map(|_| raw).into_option_logged())
        {
            self.backend.base_url = url;
        }

        if let Some(raw) = lookup(ENV_MAX_TOKENS) {
            self.backend.max_tokens = raw.parse().or_default_logged(self.backend.max_tokens);
        }

        self
    }

    /// Check cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfig` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.backend.model.trim().is_empty() {
            return Err(Error::invalid_config("backend.model must not be empty"));
        }
        Url::parse(&self.backend.base_url).map_err(|e| {
            Error::invalid_config(format!(
                "backend.base_url '{}' is not a URL: {e}",
                self.backend.base_url
            ))
        })?;
        if self.backend.max_tokens == 0 {
            return Err(Error::invalid_config("backend.max_tokens must be at least 1"));
        }
        if self.memory.capacity == 0 {
            return Err(Error::invalid_config("memory.capacity must be at least 1"));
        }
        if self.resilience.timeout.is_zero() {
            return Err(Error::invalid_config("resilience.timeout_secs must be positive"));
        }
        if self.mail.resilience.timeout.is_zero() {
            return Err(Error::invalid_config("mail.resilience.timeout_secs must be positive"));
        }
        Ok(())
    }
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4.1-nano".to_string()
}

const fn default_max_tokens() -> u32 {
    300
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

const fn default_request_timeout() -> Duration {
    Duration::from_secs(60)
}

const fn default_max_retries() -> u32 {
    2
}

const fn default_delay() -> Duration {
    Duration::from_millis(100)
}

const fn default_jitter() -> Duration {
    Duration::from_millis(50)
}

const fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

const fn default_true() -> bool {
    true
}

fn default_rewrite_instruction() -> String {
    "You are a professional clown and turn everything into a joke. Rewrite this email to be funnier."
        .to_string()
}

const fn default_memory_capacity() -> usize {
    10
}

const fn default_memory_max_sessions() -> u64 {
    10_000
}

const fn default_memory_idle_ttl() -> Duration {
    Duration::from_secs(60 * 60)
}

const fn default_usage_max_sessions() -> u64 {
    100_000
}

const fn default_usage_idle_ttl() -> Duration {
    Duration::from_secs(24 * 60 * 60)
}

/// Serialization helper for Duration as seconds.
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

/// Serialization helper for Duration as milliseconds.
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        u64::try_from(duration.as_millis())
            .unwrap_or(u64::MAX)
            .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
