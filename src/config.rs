//! Configuration loading.
//!
//! Configuration is loaded from TOML files with the following resolution order:
//! 1. explicit path (CLI flag)
//! 2. `~/.mealgate/config.toml` (user)
//! 3. `/etc/mealgate/config.toml` (system)
//!
//! Secrets are loaded separately with mandatory permission checks:
//! 1. `~/.mealgate/secrets.toml` (user, must be 0600)
//! 2. `/etc/mealgate/secrets.toml` (system, must be 0600)
//!
//! Every section and field is optional.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::analyzer::MealAnalyzer;
use crate::backend::{BackendClient, EndpointTimeouts, TokenManager};
use crate::cache::{CacheConfig, DEFAULT_PREFIX_CHARS};
use crate::gateway::RetryConfig;
use crate::providers::OpenAiClient;
use crate::providers::openai::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use crate::{Language, MealgateError, Result};

/// Environment variable consulted when no secrets file holds the API key.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub retry: RetrySection,
    #[serde(default)]
    pub cache: CacheSection,
}

/// Upstream model settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    /// Per-attempt timeout (default: 30).
    pub timeout_secs: u64,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Default result language code (default: "en").
    pub language: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout_secs: 30,
            max_tokens: crate::analyzer::DEFAULT_MAX_TOKENS,
            temperature: crate::analyzer::DEFAULT_TEMPERATURE,
            language: "en".to_string(),
        }
    }
}

impl LlmConfig {
    pub fn language(&self) -> Language {
        Language::from_code(&self.language)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BackendConfig {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub timeouts: TimeoutsSection,
}

/// `[backend.timeouts]`, in seconds.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimeoutsSection {
    pub default_secs: u64,
    pub auth_secs: u64,
    pub meals_secs: u64,
    pub chat_secs: u64,
}

impl Default for TimeoutsSection {
    fn default() -> Self {
        Self {
            default_secs: 15,
            auth_secs: 10,
            meals_secs: 30,
            chat_secs: 60,
        }
    }
}

impl From<&TimeoutsSection> for EndpointTimeouts {
    fn from(s: &TimeoutsSection) -> Self {
        Self {
            default: Duration::from_secs(s.default_secs),
            auth: Duration::from_secs(s.auth_secs),
            meals: Duration::from_secs(s.meals_secs),
            chat: Duration::from_secs(s.chat_secs),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrySection {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 500,
            max_delay_ms: 30_000,
        }
    }
}

impl From<&RetrySection> for RetryConfig {
    fn from(s: &RetrySection) -> Self {
        RetryConfig::new()
            .max_attempts(s.max_attempts)
            .initial_delay(Duration::from_millis(s.initial_delay_ms))
            .max_delay(Duration::from_millis(s.max_delay_ms))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    pub ttl_secs: u64,
    pub max_entries: usize,
    pub grace_ms: u64,
    /// Payload characters that feed the fingerprint (default: 100).
    pub fingerprint_prefix: usize,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            ttl_secs: 300,
            max_entries: 100,
            grace_ms: 100,
            fingerprint_prefix: DEFAULT_PREFIX_CHARS,
        }
    }
}

impl From<&CacheSection> for CacheConfig {
    fn from(s: &CacheSection) -> Self {
        CacheConfig::new()
            .ttl(Duration::from_secs(s.ttl_secs))
            .max_entries(s.max_entries)
            .in_flight_grace(Duration::from_millis(s.grace_ms))
    }
}

impl Config {
    /// Load configuration from the standard locations.
    ///
    /// An explicit path must exist. Without one, a missing file yields the
    /// defaults.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        match Self::resolve_config_path(explicit_path)? {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            MealgateError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            MealgateError::Configuration(format!("Failed to parse config file {path:?}: {e}"))
        })
    }

    fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(Some(path.to_path_buf()));
            }
            return Err(MealgateError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".mealgate").join("config.toml");
            if user_config.exists() {
                return Ok(Some(user_config));
            }
        }

        let system_config = PathBuf::from("/etc/mealgate/config.toml");
        if system_config.exists() {
            return Ok(Some(system_config));
        }

        Ok(None)
    }

    pub fn retry_config(&self) -> RetryConfig {
        (&self.retry).into()
    }

    pub fn cache_config(&self) -> CacheConfig {
        (&self.cache).into()
    }

    pub fn endpoint_timeouts(&self) -> EndpointTimeouts {
        (&self.backend.timeouts).into()
    }

    /// Build an analyzer backed by the configured OpenAI-compatible endpoint.
    pub fn analyzer(&self, api_key: impl Into<String>) -> Result<MealAnalyzer> {
        let client = OpenAiClient::with_base_url(api_key, &self.llm.base_url)?
            .model(&self.llm.model);
        Ok(MealAnalyzer::builder(Arc::new(client))
            .retry(self.retry_config())
            .timeout(Duration::from_secs(self.llm.timeout_secs))
            .cache(self.cache_config())
            .fingerprint_prefix(self.cache.fingerprint_prefix)
            .max_tokens(self.llm.max_tokens)
            .temperature(self.llm.temperature)
            .build())
    }

    /// Backend client for `[backend] base_url` with the configured retry
    /// policy and endpoint timeouts.
    pub fn backend_client(&self, tokens: TokenManager) -> Result<BackendClient> {
        let base_url = self.backend.base_url.as_deref().ok_or_else(|| {
            MealgateError::Configuration("[backend] base_url is not set".to_string())
        })?;
        BackendClient::with_config(
            base_url,
            tokens,
            self.retry_config(),
            self.endpoint_timeouts(),
        )
    }
}

/// Secrets (API keys).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Secrets {
    #[serde(default)]
    pub openai: Option<ApiKeySecret>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiKeySecret {
    pub api_key: String,
}

impl Secrets {
    /// Load secrets from the standard locations with permission checks.
    ///
    /// Returns empty secrets if no file exists.
    pub fn load() -> Result<Self> {
        if let Some(home) = dirs::home_dir() {
            let user_secrets = home.join(".mealgate").join("secrets.toml");
            if user_secrets.exists() {
                return Self::load_from(&user_secrets);
            }
        }

        let system_secrets = PathBuf::from("/etc/mealgate/secrets.toml");
        if system_secrets.exists() {
            return Self::load_from(&system_secrets);
        }

        Ok(Secrets::default())
    }

    /// Load one secrets file, rejecting group- or world-readable files.
    pub fn load_from(path: &Path) -> Result<Self> {
        Self::check_permissions(path)?;
        let content = fs::read_to_string(path).map_err(|e| {
            MealgateError::Configuration(format!("Failed to read secrets file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            MealgateError::Configuration(format!("Failed to parse secrets file {path:?}: {e}"))
        })
    }

    #[cfg(unix)]
    fn check_permissions(path: &Path) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let metadata = fs::metadata(path).map_err(|e| {
            MealgateError::Configuration(format!("Failed to stat secrets file {path:?}: {e}"))
        })?;

        let mode = metadata.permissions().mode();
        if mode & 0o077 != 0 {
            return Err(MealgateError::Configuration(format!(
                "Secrets file {path:?} has insecure permissions {:o}. Must be 0600 or 0400.",
                mode & 0o777
            )));
        }

        Ok(())
    }

    #[cfg(not(unix))]
    fn check_permissions(_path: &Path) -> Result<()> {
        Ok(())
    }

    /// API key from the secrets file, else `OPENAI_API_KEY`.
    pub fn api_key(&self) -> Option<String> {
        self.openai
            .as_ref()
            .map(|s| s.api_key.clone())
            .or_else(|| std::env::var(API_KEY_ENV).ok())
            .filter(|key| !key.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.retry_config(), RetryConfig::default());
        let cache = config.cache_config();
        assert_eq!(cache.ttl, Duration::from_secs(300));
        assert_eq!(cache.max_entries, 100);
        assert_eq!(cache.in_flight_grace, Duration::from_millis(100));
        assert_eq!(config.endpoint_timeouts(), EndpointTimeouts::default());
        assert_eq!(config.llm.model, DEFAULT_MODEL);
    }

    #[test]
    fn parse_partial_config() {
        let toml = r#"
            [llm]
            model = "gpt-4o"
            language = "ko"

            [retry]
            max_attempts = 5
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.llm.model, "gpt-4o");
        assert_eq!(config.llm.language(), Language::Korean);
        assert_eq!(config.llm.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.initial_delay_ms, 500);
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
            [llm]
            base_url = "http://localhost:8000/v1"
            timeout_secs = 45

            [backend]
            base_url = "https://api.example.com"

            [backend.timeouts]
            chat_secs = 90

            [retry]
            max_attempts = 2
            initial_delay_ms = 100
            max_delay_ms = 1000

            [cache]
            ttl_secs = 60
            max_entries = 10
            grace_ms = 0
            fingerprint_prefix = 40
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(
            config.backend.base_url.as_deref(),
            Some("https://api.example.com")
        );
        let timeouts = config.endpoint_timeouts();
        assert_eq!(timeouts.chat, Duration::from_secs(90));
        assert_eq!(timeouts.auth, Duration::from_secs(10));
        assert_eq!(
            config.retry_config(),
            RetryConfig::new()
                .max_attempts(2)
                .initial_delay(Duration::from_millis(100))
                .max_delay(Duration::from_secs(1))
        );
        let cache = config.cache_config();
        assert_eq!(cache.max_entries, 10);
        assert_eq!(cache.in_flight_grace, Duration::ZERO);
        assert_eq!(config.cache.fingerprint_prefix, 40);
    }

    #[test]
    fn explicit_missing_config_is_an_error() {
        let err = Config::load(Some(Path::new("/nonexistent/config.toml"))).unwrap_err();
        assert!(err.to_string().contains("Config file not found"));
    }

    #[test]
    fn api_key_from_secrets() {
        let secrets = Secrets {
            openai: Some(ApiKeySecret {
                api_key: "from-file".to_string(),
            }),
        };
        assert_eq!(secrets.api_key(), Some("from-file".to_string()));
    }
}
