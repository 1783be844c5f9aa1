//! Integration tests for configuration management
//!
//! These tests verify that configuration files load with environment
//! overrides applied, and that invalid settings are rejected.

use sdk::errors::BotError;
use std::collections::HashMap;
use std::fs;
use tempfile::TempDir;
use wizzy_engine::config::{Config, LogFormat};

fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

const FULL_CONFIG: &str = r#"
[core]
log_level = "debug"
log_format = "json"

[server]
host = "127.0.0.1"
port = 9000
public_url = "https://bot.example.com"

[telegram]
poll_timeout_secs = 10
max_reply_chars = 3000

[llm]
generation_provider = "openai"
transcription_provider = "groq"

[llm.openai]
model = "gpt-4o"

[llm.groq]
voice = "Fritz-PlayAI"

[memory]
max_turns = 40

[documents]
max_file_bytes = 1048576
max_extracted_chars = 50000
excerpt_chars = 4000
summarize_uploads = false

[sessions]
idle_ttl_secs = 3600
sweep_interval_secs = 60

[storage]
database_url = "sqlite:///var/lib/wizzy/sessions.db"

[persona]
name = "Wiz"
directive = "You are {name}. Talking to {user_name} at {time}."
"#;

#[test]
fn test_full_config_parsing() {
    let config = Config::from_toml_with_env(FULL_CONFIG, |_| None).unwrap();

    assert_eq!(config.core.log_level, "debug");
    assert_eq!(config.core.log_format, LogFormat::Json);
    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.server.port, 9000);
    assert_eq!(
        config.server.public_url.as_deref(),
        Some("https://bot.example.com")
    );
    assert!(config.server.webhook_secret.is_none());
    assert_eq!(config.telegram.api_base_url, "https://api.telegram.org");
    assert_eq!(config.telegram.poll_timeout_secs, 10);
    assert_eq!(config.telegram.max_reply_chars, 3000);
    assert_eq!(config.llm.generation_provider, "openai");
    assert_eq!(config.llm.transcription_provider, "groq");
    assert_eq!(config.llm.openai.model, "gpt-4o");
    assert_eq!(config.llm.groq.voice, "Fritz-PlayAI");
    assert_eq!(config.llm.groq.tts_model, "playai-tts");
    assert_eq!(config.memory.max_turns, 40);
    assert_eq!(config.documents.max_file_bytes, 1_048_576);
    assert_eq!(config.documents.excerpt_chars, 4000);
    assert!(!config.documents.summarize_uploads);
    assert_eq!(config.sessions.idle_ttl_secs, 3600);
    assert_eq!(config.persona.name, "Wiz");
    assert!(config.credentials.telegram_bot_token.is_none());
}

#[test]
fn test_environment_overrides_file_values() {
    let env = env_from(&[
        ("TELEGRAM_BOT_TOKEN", "123456:TEST"),
        ("GOOGLE_API_KEY", "google-key"),
        ("GROQ_API_KEY", "gsk_key"),
        ("OPENAI_API_KEY", "sk-key"),
        ("DATABASE_URL", "sqlite://wizzy.db"),
        ("WEBHOOK_URL", "https://other.example.com"),
        ("WEBHOOK_SECRET", "s3cret"),
        ("PORT", " 8443 "),
        ("LOG_LEVEL", "WARN"),
    ]);
    let config = Config::from_toml_with_env(FULL_CONFIG, env).unwrap();

    let credentials = &config.credentials;
    assert_eq!(
        credentials.telegram_bot_token.as_ref().map(|s| s.unsecure()),
        Some("123456:TEST")
    );
    assert_eq!(
        credentials.google_api_key.as_ref().map(|s| s.unsecure()),
        Some("google-key")
    );
    assert_eq!(
        credentials.groq_api_key.as_ref().map(|s| s.unsecure()),
        Some("gsk_key")
    );
    assert_eq!(
        credentials.openai_api_key.as_ref().map(|s| s.unsecure()),
        Some("sk-key")
    );
    assert_eq!(
        config.storage.database_url.as_deref(),
        Some("sqlite://wizzy.db")
    );
    assert_eq!(
        config.server.public_url.as_deref(),
        Some("https://other.example.com")
    );
    assert_eq!(config.server.webhook_secret.as_deref(), Some("s3cret"));
    assert_eq!(config.server.port, 8443);
    assert_eq!(config.core.log_level, "warn");
}

#[test]
fn test_blank_environment_values_are_ignored() {
    let env = env_from(&[("PORT", ""), ("TELEGRAM_BOT_TOKEN", "   ")]);
    let config = Config::from_toml_with_env(FULL_CONFIG, env).unwrap();

    assert_eq!(config.server.port, 9000);
    assert!(config.credentials.telegram_bot_token.is_none());
}

#[test]
fn test_invalid_port_is_rejected() {
    let env = env_from(&[("PORT", "eighty")]);
    let result = Config::from_toml_with_env("", env);

    match result {
        Err(BotError::Config(message)) => assert!(message.contains("eighty")),
        other => panic!("expected config error, got {:?}", other),
    }
}

#[test]
fn test_invalid_values_are_rejected() {
    let cases = [
        "[core]\nlog_level = \"verbose\"",
        "[core]\nlog_format = \"xml\"",
        "[llm]\ngeneration_provider = \"ollama\"",
        "[llm]\ntranscription_provider = \"openai\"",
        "[memory]\nmax_turns = 1",
        "[documents]\nmax_file_bytes = 0",
        "[storage]\ndatabase_url = \"redis://localhost:6379\"",
        "[server]\nport = \"not a number\"",
    ];

    for contents in cases {
        let result = Config::from_toml_with_env(contents, |_| None);
        assert!(
            matches!(result, Err(BotError::Config(_))),
            "expected rejection for {:?}",
            contents
        );
    }
}

#[test]
fn test_database_url_from_environment_is_validated() {
    let env = env_from(&[("DATABASE_URL", "postgres://db/wizzy")]);
    let result = Config::from_toml_with_env("", env);

    match result {
        Err(BotError::Config(message)) => {
            assert!(message.contains("postgres"));
            // Credentials in the URL never reach the message
            assert!(!message.contains("db/wizzy"));
        }
        other => panic!("expected config error, got {:?}", other),
    }
}

#[test]
fn test_load_from_path() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    fs::write(&path, "[memory]\nmax_turns = 8\n").unwrap();

    let config = Config::load_from_path(&path).unwrap();
    assert_eq!(config.memory.max_turns, 8);
    assert_eq!(config.persona.name, "Wizzy");
}

#[test]
fn test_load_from_missing_path_fails() {
    let temp_dir = TempDir::new().unwrap();
    let result = Config::load_from_path(&temp_dir.path().join("missing.toml"));
    assert!(matches!(result, Err(BotError::Config(_))));
}

#[test]
fn test_serialized_defaults_reload() {
    let serialized = toml::to_string_pretty(&Config::default()).unwrap();
    let config = Config::from_toml_with_env(&serialized, |_| None).unwrap();

    assert_eq!(config.server.port, 8000);
    assert_eq!(config.core.log_format, LogFormat::Auto);
    assert_eq!(config.memory.max_turns, 20);
    assert_eq!(config.llm.generation_provider, "gemini");
    assert!(config.documents.summarize_uploads);
}
