//! Configuration management
//!
//! This module handles loading, validation, and management of the Wizzy configuration.
//! Configuration is stored in TOML format at ~/.wizzy/config.toml and overlaid with
//! environment variables so the bot can run from a plain container environment.
//!
//! # Configuration Sections
//!
//! - **core**: Log level and format
//! - **server**: Listen address, public webhook URL, webhook secret
//! - **telegram**: Bot API base URL and polling settings
//! - **llm**: Which provider handles generation and transcription, per-provider settings
//! - **memory**: History cap per conversation
//! - **documents**: Upload limits and prompt excerpt size
//! - **sessions**: Idle eviction policy
//! - **storage**: Optional durable session backend
//! - **persona**: Bot name and personality directive
//!
//! # Environment Overrides
//!
//! | Variable | Field |
//! |---|---|
//! | `TELEGRAM_BOT_TOKEN` | `credentials.telegram_bot_token` |
//! | `GOOGLE_API_KEY` | `credentials.google_api_key` |
//! | `GROQ_API_KEY` | `credentials.groq_api_key` |
//! | `OPENAI_API_KEY` | `credentials.openai_api_key` |
//! | `DATABASE_URL` | `storage.database_url` |
//! | `WEBHOOK_URL` | `server.public_url` |
//! | `WEBHOOK_SECRET` | `server.webhook_secret` |
//! | `PORT` | `server.port` |
//! | `LOG_LEVEL` | `core.log_level` |
//!
//! Credentials only ever come from the environment and are never written to disk.
//!
//! # Examples
//!
//! ```no_run
//! use wizzy_engine::config::Config;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load_or_create()?;
//! println!("Listening on port {}", config.server.port);
//! println!("History cap: {}", config.memory.max_turns);
//! # Ok(())
//! # }
//! ```

use crate::secrets::SecretString;
use sdk::errors::BotError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Core settings
    #[serde(default)]
    pub core: CoreConfig,

    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Telegram Bot API settings
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// AI collaborator settings
    #[serde(default)]
    pub llm: LLMConfig,

    /// Conversation memory settings
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Document upload settings
    #[serde(default)]
    pub documents: DocumentsConfig,

    /// Session lifecycle settings
    #[serde(default)]
    pub sessions: SessionsConfig,

    /// Durable storage settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// Personality settings
    #[serde(default)]
    pub persona: PersonaConfig,

    /// API credentials, populated from the environment only
    #[serde(skip)]
    pub credentials: Credentials,
}

/// Core configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log output format
    #[serde(default)]
    pub log_format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON in release builds, pretty otherwise
    #[default]
    Auto,
    Pretty,
    Json,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address
    #[serde(default = "default_host")]
    pub host: String,

    /// Listen port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Public base URL the platform should call (webhook registration)
    #[serde(default)]
    pub public_url: Option<String>,

    /// Secret the platform echoes in `X-Telegram-Bot-Api-Secret-Token`
    #[serde(default)]
    pub webhook_secret: Option<String>,
}

/// Telegram Bot API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot API base URL
    #[serde(default = "default_telegram_api_url")]
    pub api_base_url: String,

    /// Long-polling timeout in seconds
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,

    /// Maximum characters per outgoing text message
    #[serde(default = "default_max_reply_chars")]
    pub max_reply_chars: usize,
}

/// AI collaborator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMConfig {
    /// Text generation provider (gemini, openai)
    #[serde(default = "default_generation_provider")]
    pub generation_provider: String,

    /// Speech-to-text provider (gemini, groq)
    #[serde(default = "default_transcription_provider")]
    pub transcription_provider: String,

    /// Gemini provider settings
    #[serde(default)]
    pub gemini: GeminiConfig,

    /// OpenAI provider settings
    #[serde(default)]
    pub openai: OpenAIConfig,

    /// Groq provider settings
    #[serde(default)]
    pub groq: GroqConfig,
}

/// Gemini provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    /// Base URL for Gemini API
    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,

    /// Model name
    #[serde(default = "default_gemini_model")]
    pub model: String,
}

/// OpenAI provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIConfig {
    /// Base URL for an OpenAI-compatible API
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,

    /// Model name
    #[serde(default = "default_openai_model")]
    pub model: String,
}

/// Groq provider configuration (speech synthesis and Whisper)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroqConfig {
    /// Base URL for Groq's OpenAI-compatible API
    #[serde(default = "default_groq_base_url")]
    pub base_url: String,

    /// Text-to-speech model
    #[serde(default = "default_groq_tts_model")]
    pub tts_model: String,

    /// Text-to-speech voice
    #[serde(default = "default_groq_voice")]
    pub voice: String,

    /// Whisper model used when Groq handles transcription
    #[serde(default = "default_groq_whisper_model")]
    pub whisper_model: String,
}

/// Conversation memory configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Maximum turns kept per conversation (oldest dropped first)
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,
}

/// Document upload configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentsConfig {
    /// Largest accepted upload in bytes (inclusive)
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: usize,

    /// Extracted text is clipped to this many characters
    #[serde(default = "default_max_extracted_chars")]
    pub max_extracted_chars: usize,

    /// Characters of document text included in each prompt
    #[serde(default = "default_excerpt_chars")]
    pub excerpt_chars: usize,

    /// Ask the generator for a short summary after each upload
    #[serde(default = "default_true")]
    pub summarize_uploads: bool,
}

/// Session lifecycle configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    /// Sessions idle longer than this are evicted
    #[serde(default = "default_idle_ttl")]
    pub idle_ttl_secs: u64,

    /// How often the eviction sweep runs
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

/// Durable storage configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite URL (`sqlite:///path/to/wizzy.db`). Sessions live in memory only when unset.
    #[serde(default)]
    pub database_url: Option<String>,
}

/// Personality configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaConfig {
    /// Bot name
    #[serde(default = "default_persona_name")]
    pub name: String,

    /// Personality directive. `{name}`, `{user_name}` and `{time}` are substituted per turn.
    #[serde(default = "default_persona_directive")]
    pub directive: String,
}

/// API credentials
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub telegram_bot_token: Option<SecretString>,
    pub google_api_key: Option<SecretString>,
    pub groq_api_key: Option<SecretString>,
    pub openai_api_key: Option<SecretString>,
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_telegram_api_url() -> String {
    "https://api.telegram.org".to_string()
}

fn default_poll_timeout() -> u64 {
    30
}

fn default_max_reply_chars() -> usize {
    4000
}

fn default_generation_provider() -> String {
    "gemini".to_string()
}

fn default_transcription_provider() -> String {
    "gemini".to_string()
}

fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_gemini_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_groq_base_url() -> String {
    "https://api.groq.com/openai/v1".to_string()
}

fn default_groq_tts_model() -> String {
    "playai-tts".to_string()
}

fn default_groq_voice() -> String {
    "Celeste-PlayAI".to_string()
}

fn default_groq_whisper_model() -> String {
    "whisper-large-v3-turbo".to_string()
}

fn default_max_turns() -> usize {
    20
}

fn default_max_file_bytes() -> usize {
    20 * 1024 * 1024
}

fn default_max_extracted_chars() -> usize {
    200_000
}

fn default_excerpt_chars() -> usize {
    8_000
}

fn default_idle_ttl() -> u64 {
    24 * 60 * 60
}

fn default_sweep_interval() -> u64 {
    10 * 60
}

fn default_persona_name() -> String {
    "Wizzy".to_string()
}

fn default_persona_directive() -> String {
    "You are a helpful assistant called {name}. Respond in a natural funny tone. \
     Be sarcastic when required. Don't give very long messages.\n\n\
     You are currently talking to {user_name}.\n\n\
     The current date and time is {time}"
        .to_string()
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_url: None,
            webhook_secret: None,
        }
    }
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_telegram_api_url(),
            poll_timeout_secs: default_poll_timeout(),
            max_reply_chars: default_max_reply_chars(),
        }
    }
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            generation_provider: default_generation_provider(),
            transcription_provider: default_transcription_provider(),
            gemini: GeminiConfig::default(),
            openai: OpenAIConfig::default(),
            groq: GroqConfig::default(),
        }
    }
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            base_url: default_gemini_base_url(),
            model: default_gemini_model(),
        }
    }
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            base_url: default_openai_base_url(),
            model: default_openai_model(),
        }
    }
}

impl Default for GroqConfig {
    fn default() -> Self {
        Self {
            base_url: default_groq_base_url(),
            tts_model: default_groq_tts_model(),
            voice: default_groq_voice(),
            whisper_model: default_groq_whisper_model(),
        }
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
        }
    }
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            max_file_bytes: default_max_file_bytes(),
            max_extracted_chars: default_max_extracted_chars(),
            excerpt_chars: default_excerpt_chars(),
            summarize_uploads: true,
        }
    }
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            idle_ttl_secs: default_idle_ttl(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            name: default_persona_name(),
            directive: default_persona_directive(),
        }
    }
}

impl Config {
    /// Load configuration from the default location (~/.wizzy/config.toml)
    ///
    /// If the configuration file doesn't exist, writes a default one first.
    /// Environment overrides are applied before validation.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration file cannot be read or written
    /// - TOML parsing fails
    /// - Validation fails
    pub fn load_or_create() -> Result<Self, BotError> {
        let config_path = Self::default_config_path()?;

        if !config_path.exists() {
            Self::write_default(&config_path)?;
        }

        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path, then apply environment overrides
    pub fn load_from_path(path: &Path) -> Result<Self, BotError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| BotError::Config(format!("Failed to read config file: {}", e)))?;

        Self::from_toml_with_env(&contents, |key| std::env::var(key).ok())
    }

    /// Parse TOML, overlay values from `env`, and validate
    ///
    /// `env` is a lookup function so callers (and tests) control where
    /// overrides come from.
    pub fn from_toml_with_env<F>(contents: &str, env: F) -> Result<Self, BotError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config: Config = toml::from_str(contents)
            .map_err(|e| BotError::Config(format!("Failed to parse config: {}", e)))?;

        config.apply_env(env)?;
        config.validate()?;

        Ok(config)
    }

    /// Write the default configuration to `path`
    fn write_default(path: &Path) -> Result<(), BotError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                BotError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let toml_string = toml::to_string_pretty(&Self::default())
            .map_err(|e| BotError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)
            .map_err(|e| BotError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Get the default configuration file path (~/.wizzy/config.toml)
    fn default_config_path() -> Result<PathBuf, BotError> {
        let home = dirs::home_dir()
            .ok_or_else(|| BotError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(".wizzy").join("config.toml"))
    }

    /// Overlay environment values. Empty values are treated as unset.
    fn apply_env<F>(&mut self, env: F) -> Result<(), BotError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        if let Some(token) = get("TELEGRAM_BOT_TOKEN") {
            self.credentials.telegram_bot_token = Some(SecretString::new(token));
        }
        if let Some(key) = get("GOOGLE_API_KEY") {
            self.credentials.google_api_key = Some(SecretString::new(key));
        }
        if let Some(key) = get("GROQ_API_KEY") {
            self.credentials.groq_api_key = Some(SecretString::new(key));
        }
        if let Some(key) = get("OPENAI_API_KEY") {
            self.credentials.openai_api_key = Some(SecretString::new(key));
        }
        if let Some(url) = get("DATABASE_URL") {
            self.storage.database_url = Some(url);
        }
        if let Some(url) = get("WEBHOOK_URL") {
            self.server.public_url = Some(url);
        }
        if let Some(secret) = get("WEBHOOK_SECRET") {
            self.server.webhook_secret = Some(secret);
        }
        if let Some(port) = get("PORT") {
            self.server.port = port
                .trim()
                .parse()
                .map_err(|_| BotError::Config(format!("Invalid PORT '{}'", port)))?;
        }
        if let Some(level) = get("LOG_LEVEL") {
            self.core.log_level = level.to_lowercase();
        }

        Ok(())
    }

    /// Validate configuration
    ///
    /// This method:
    /// - Validates log level and provider names
    /// - Validates memory and document limits
    /// - Rejects database URLs other than `sqlite:`
    fn validate(&self) -> Result<(), BotError> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.core.log_level.as_str()) {
            return Err(BotError::Config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.core.log_level,
                valid_log_levels.join(", ")
            )));
        }

        let generation_providers = ["gemini", "openai"];
        if !generation_providers.contains(&self.llm.generation_provider.as_str()) {
            return Err(BotError::Config(format!(
                "Invalid generation provider '{}'. Must be one of: {}",
                self.llm.generation_provider,
                generation_providers.join(", ")
            )));
        }

        let transcription_providers = ["gemini", "groq"];
        if !transcription_providers.contains(&self.llm.transcription_provider.as_str()) {
            return Err(BotError::Config(format!(
                "Invalid transcription provider '{}'. Must be one of: {}",
                self.llm.transcription_provider,
                transcription_providers.join(", ")
            )));
        }

        // A user turn and its reply must both fit in the window
        if self.memory.max_turns < 2 {
            return Err(BotError::Config(
                "memory.max_turns must be at least 2".to_string(),
            ));
        }

        if self.documents.max_file_bytes == 0 {
            return Err(BotError::Config(
                "documents.max_file_bytes must be greater than 0".to_string(),
            ));
        }

        if self.documents.excerpt_chars > self.documents.max_extracted_chars {
            return Err(BotError::Config(
                "documents.excerpt_chars must not exceed documents.max_extracted_chars"
                    .to_string(),
            ));
        }

        if let Some(url) = &self.storage.database_url {
            if !url.starts_with("sqlite:") {
                return Err(BotError::Config(format!(
                    "Unsupported database URL scheme in '{}'. Only sqlite: is supported",
                    url.split(':').next().unwrap_or_default()
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = Config::from_toml_with_env("", no_env).unwrap();

        assert_eq!(config.core.log_level, "info");
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.memory.max_turns, 20);
        assert_eq!(config.documents.max_file_bytes, 20 * 1024 * 1024);
        assert_eq!(config.llm.generation_provider, "gemini");
        assert!(config.storage.database_url.is_none());
        assert!(config.credentials.telegram_bot_token.is_none());
    }

    #[test]
    fn test_config_serialization_skips_credentials() {
        let mut config = Config::default();
        config.credentials.google_api_key = Some(SecretString::new("AIza-should-not-leak"));

        let toml_string = toml::to_string(&config).unwrap();
        assert!(!toml_string.contains("AIza"));

        let deserialized: Config = toml::from_str(&toml_string).unwrap();
        assert_eq!(config.memory.max_turns, deserialized.memory.max_turns);
        assert_eq!(config.persona.directive, deserialized.persona.directive);
    }

    #[test]
    fn test_rejects_unknown_provider() {
        let result = Config::from_toml_with_env(
            "[llm]\ngeneration_provider = \"ollama\"\n",
            no_env,
        );
        assert!(matches!(result, Err(BotError::Config(_))));
    }

    #[test]
    fn test_rejects_excerpt_larger_than_extraction_cap() {
        let result = Config::from_toml_with_env(
            "[documents]\nmax_extracted_chars = 100\nexcerpt_chars = 200\n",
            no_env,
        );
        assert!(matches!(result, Err(BotError::Config(_))));
    }

    #[test]
    fn test_rejects_non_sqlite_database_url() {
        let result = Config::from_toml_with_env("", |key| {
            (key == "DATABASE_URL").then(|| "redis://localhost:6379".to_string())
        });
        assert!(matches!(result, Err(BotError::Config(_))));
    }
}
