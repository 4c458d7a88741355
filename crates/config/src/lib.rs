//! Configuration loading, validation, and management for PocketMed.
//!
//! Loads configuration from `~/.pocketmed/config.toml` with environment
//! variable overrides. Validates all settings at startup; missing credentials
//! are reported by [`AppConfig::require_credentials`] before anything serves.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.pocketmed/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Language-model API key (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default LLM provider
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Default model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Sampling temperature for answers
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Max tokens per generated answer
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// Upper bound on one language-model call, in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    /// Telegram bot settings
    #[serde(default)]
    pub telegram: TelegramSettings,

    /// Chat keywords recognized as profile commands
    #[serde(default)]
    pub keywords: KeywordConfig,

    /// Assistant behavior
    #[serde(default)]
    pub assistant: AssistantConfig,
}

fn default_provider() -> String {
    "openai".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_max_tokens() -> u32 {
    300
}
fn default_request_timeout() -> u64 {
    60
}
fn default_true() -> bool {
    true
}

fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("providers", &self.providers)
            .field("telegram", &self.telegram)
            .field("keywords", &self.keywords)
            .field("assistant", &self.assistant)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct TelegramSettings {
    /// Bot token from @BotFather
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_token: Option<String>,

    /// Allowlist of sender IDs. Empty = deny all. ["*"] = allow all.
    #[serde(default = "default_allowed_users")]
    pub allowed_users: Vec<String>,

    /// Long-poll timeout passed to getUpdates, in seconds
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,

    /// Thread replies under the user's message
    #[serde(default = "default_true")]
    pub reply_to_message: bool,
}

fn default_allowed_users() -> Vec<String> {
    vec!["*".into()]
}
fn default_poll_timeout() -> u64 {
    30
}

impl Default for TelegramSettings {
    fn default() -> Self {
        Self {
            bot_token: None,
            allowed_users: default_allowed_users(),
            poll_timeout_secs: default_poll_timeout(),
            reply_to_message: true,
        }
    }
}

impl std::fmt::Debug for TelegramSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramSettings")
            .field("bot_token", &redact(&self.bot_token))
            .field("allowed_users", &self.allowed_users)
            .field("poll_timeout_secs", &self.poll_timeout_secs)
            .field("reply_to_message", &self.reply_to_message)
            .finish()
    }
}

/// Keywords that turn a chat message into a profile command.
///
/// The four update keywords are prefixes; `summary` must match the whole
/// message (case-insensitive). The optional prefixes are unset by default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordConfig {
    #[serde(default = "default_age_keyword")]
    pub age: String,

    #[serde(default = "default_gender_keyword")]
    pub gender: String,

    #[serde(default = "default_diabetes_type_keyword")]
    pub diabetes_type: String,

    #[serde(default = "default_medications_keyword")]
    pub medications: String,

    #[serde(default = "default_summary_keyword")]
    pub summary: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_years: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub other_conditions: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_hba1c: Option<String>,
}

fn default_age_keyword() -> String {
    "سن".into()
}
fn default_gender_keyword() -> String {
    "جنس".into()
}
fn default_diabetes_type_keyword() -> String {
    "دیابت".into()
}
fn default_medications_keyword() -> String {
    "دارو".into()
}
fn default_summary_keyword() -> String {
    "summary".into()
}

impl Default for KeywordConfig {
    fn default() -> Self {
        Self {
            age: default_age_keyword(),
            gender: default_gender_keyword(),
            diabetes_type: default_diabetes_type_keyword(),
            medications: default_medications_keyword(),
            summary: default_summary_keyword(),
            duration_years: None,
            other_conditions: None,
            latest_hba1c: None,
        }
    }
}

impl KeywordConfig {
    /// All configured prefix keywords, in priority order.
    pub fn prefixes(&self) -> Vec<(&'static str, &str)> {
        let mut prefixes = vec![
            ("age", self.age.as_str()),
            ("gender", self.gender.as_str()),
            ("diabetes_type", self.diabetes_type.as_str()),
            ("medications", self.medications.as_str()),
        ];
        if let Some(k) = &self.duration_years {
            prefixes.push(("duration_years", k.as_str()));
        }
        if let Some(k) = &self.other_conditions {
            prefixes.push(("other_conditions", k.as_str()));
        }
        if let Some(k) = &self.latest_hba1c {
            prefixes.push(("latest_hba1c", k.as_str()));
        }
        prefixes
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let prefixes = self.prefixes();

        for (name, keyword) in &prefixes {
            if keyword.trim().is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "keywords.{name} must not be empty"
                )));
            }
        }
        if self.summary.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "keywords.summary must not be empty".into(),
            ));
        }

        // A keyword that starts another keyword would shadow it.
        for (i, (a_name, a)) in prefixes.iter().enumerate() {
            for (b_name, b) in prefixes.iter().skip(i + 1) {
                if a.starts_with(b) || b.starts_with(a) {
                    return Err(ConfigError::ValidationError(format!(
                        "keywords.{a_name} ({a}) and keywords.{b_name} ({b}) overlap"
                    )));
                }
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssistantConfig {
    /// Replace the built-in system instructions entirely
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

impl AppConfig {
    /// Load configuration from the default path (~/.pocketmed/config.toml).
    ///
    /// Also checks environment variables:
    /// - `POCKETMED_API_KEY` (highest priority), `OPENAI_API_KEY`, `OPENROUTER_API_KEY`
    /// - `TELEGRAM_BOT_TOKEN`
    /// - `POCKETMED_PROVIDER`, `POCKETMED_MODEL`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides. Config-file credentials win over the
    /// generic env vars; provider/model env vars win over the file.
    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if self.api_key.is_none() {
            self.api_key = var("POCKETMED_API_KEY")
                .or_else(|| var("OPENAI_API_KEY"))
                .or_else(|| var("OPENROUTER_API_KEY"));
        }

        if self.telegram.bot_token.is_none() {
            self.telegram.bot_token = var("TELEGRAM_BOT_TOKEN");
        }

        if let Some(provider) = var("POCKETMED_PROVIDER") {
            self.default_provider = provider;
        }

        if let Some(model) = var("POCKETMED_MODEL") {
            self.default_model = model;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".pocketmed")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.default_temperature < 0.0 || self.default_temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.default_max_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "default_max_tokens must be > 0".into(),
            ));
        }

        if self.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "request_timeout_secs must be > 0".into(),
            ));
        }

        self.keywords.validate()
    }

    /// The API key for the default provider, from its own section or the
    /// top-level key.
    pub fn provider_api_key(&self) -> Option<&str> {
        self.providers
            .get(&self.default_provider)
            .and_then(|p| p.api_key.as_deref())
            .or(self.api_key.as_deref())
            .filter(|k| !k.is_empty())
    }

    /// Fail unless every credential needed to serve is present.
    ///
    /// The language-model key is always required; the Telegram token only
    /// when `needs_telegram` is set. Ollama runs without a key.
    pub fn require_credentials(&self, needs_telegram: bool) -> Result<(), ConfigError> {
        if self.default_provider != "ollama" && self.provider_api_key().is_none() {
            return Err(ConfigError::MissingCredential {
                name: "api_key",
                hint: "set OPENAI_API_KEY or api_key in config.toml",
            });
        }

        let has_token = self
            .telegram
            .bot_token
            .as_deref()
            .is_some_and(|t| !t.is_empty());
        if needs_telegram && !has_token {
            return Err(ConfigError::MissingCredential {
                name: "telegram.bot_token",
                hint: "set TELEGRAM_BOT_TOKEN or telegram.bot_token in config.toml",
            });
        }

        Ok(())
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            default_model: default_model(),
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
            request_timeout_secs: default_request_timeout(),
            providers: HashMap::new(),
            telegram: TelegramSettings::default(),
            keywords: KeywordConfig::default(),
            assistant: AssistantConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    #[error("Missing credential `{name}`: {hint}")]
    MissingCredential {
        name: &'static str,
        hint: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn env_from<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |key| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert_eq!(config.default_provider, "openai");
        assert_eq!(config.default_model, "gpt-4o-mini");
        assert_eq!(config.default_max_tokens, 300);
        assert!((config.default_temperature - 0.2).abs() < f32::EPSILON);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.default_model, config.default_model);
        assert_eq!(parsed.keywords.age, "سن");
    }

    #[test]
    fn invalid_temperature_rejected() {
        let config = AppConfig {
            default_temperature: 5.0,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.toml"));
        let config = result.unwrap();
        assert_eq!(config.default_provider, "openai");
    }

    #[test]
    fn load_from_file_with_optional_keywords() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
default_model = "gpt-4o"

[telegram]
bot_token = "123:abc"
allowed_users = ["42"]

[keywords]
other_conditions = "بیماری"
latest_hba1c = "HbA1c"
"#
        )
        .unwrap();

        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.default_model, "gpt-4o");
        assert_eq!(config.telegram.allowed_users, vec!["42".to_string()]);
        assert_eq!(config.keywords.medications, "دارو");
        assert_eq!(config.keywords.prefixes().len(), 6);
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "default_max_tokens = \"lots\"").unwrap();
        let err = AppConfig::load_from(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn overlapping_keywords_rejected() {
        let config = AppConfig {
            keywords: KeywordConfig {
                duration_years: Some("دیابت مدت".into()),
                ..KeywordConfig::default()
            },
            ..AppConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("overlap"));
    }

    #[test]
    fn env_fills_missing_credentials() {
        let mut config = AppConfig::default();
        config.apply_env(env_from(&[
            ("OPENAI_API_KEY", "sk-env"),
            ("TELEGRAM_BOT_TOKEN", "123:env"),
            ("POCKETMED_MODEL", "gpt-4o"),
        ]));
        assert_eq!(config.api_key.as_deref(), Some("sk-env"));
        assert_eq!(config.telegram.bot_token.as_deref(), Some("123:env"));
        assert_eq!(config.default_model, "gpt-4o");
    }

    #[test]
    fn file_credentials_win_over_env() {
        let mut config = AppConfig {
            api_key: Some("sk-file".into()),
            ..AppConfig::default()
        };
        config.apply_env(env_from(&[("POCKETMED_API_KEY", "sk-env")]));
        assert_eq!(config.api_key.as_deref(), Some("sk-file"));
    }

    #[test]
    fn missing_credentials_are_reported() {
        let config = AppConfig::default();
        let err = config.require_credentials(false).unwrap_err();
        assert!(matches!(err, ConfigError::MissingCredential { name: "api_key", .. }));

        let config = AppConfig {
            api_key: Some("sk-test".into()),
            ..AppConfig::default()
        };
        assert!(config.require_credentials(false).is_ok());
        let err = config.require_credentials(true).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingCredential { name: "telegram.bot_token", .. }
        ));
    }

    #[test]
    fn per_provider_key_is_used() {
        let mut providers = HashMap::new();
        providers.insert(
            "openai".to_string(),
            ProviderConfig {
                api_key: Some("sk-provider".into()),
                api_url: None,
            },
        );
        let config = AppConfig {
            providers,
            ..AppConfig::default()
        };
        assert_eq!(config.provider_api_key(), Some("sk-provider"));
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let config = AppConfig {
            api_key: Some("sk-secret".into()),
            telegram: TelegramSettings {
                bot_token: Some("123:secret".into()),
                ..TelegramSettings::default()
            },
            ..AppConfig::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(!debug.contains("123:secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
