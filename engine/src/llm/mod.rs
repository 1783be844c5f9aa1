//! AI Collaborator Abstraction Layer
//!
//! This module provides common interfaces for the external AI services the
//! orchestrator calls: text generation, speech-to-text, image description and
//! speech synthesis. Each is an async trait so providers can be swapped by
//! configuration and replaced by mocks in tests.
//!
//! Providers:
//! - [`gemini::GeminiProvider`]: generation, transcription, vision
//! - [`openai::OpenAIProvider`]: generation
//! - [`groq::GroqProvider`]: speech synthesis, Whisper transcription

use crate::config::Config;
use async_trait::async_trait;
use sdk::errors::BotError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

pub mod gemini;
pub mod groq;
pub mod openai;

pub use gemini::GeminiProvider;
pub use groq::GroqProvider;
pub use openai::OpenAIProvider;

/// Result type for LLM operations
pub type Result<T> = std::result::Result<T, LLMError>;

/// Errors that can occur during collaborator calls
#[derive(Debug, thiserror::Error)]
pub enum LLMError {
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Empty response")]
    EmptyResponse,
}

/// Map an HTTP error status to an `LLMError`
pub(crate) fn error_for_status(provider: &str, status: reqwest::StatusCode, body: String) -> LLMError {
    match status.as_u16() {
        400 | 404 | 422 => LLMError::InvalidRequest(body),
        401 | 403 => LLMError::AuthenticationFailed(body),
        429 => LLMError::RateLimitExceeded,
        _ => LLMError::ProviderUnavailable(format!("{} API error ({}): {}", provider, status, body)),
    }
}

/// Reject blank collaborator output
pub(crate) fn non_empty(text: String) -> Result<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        Err(LLMError::EmptyResponse)
    } else {
        Ok(trimmed.to_string())
    }
}

/// Message in a prompt
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    /// Role of the message sender
    pub role: MessageRole,

    /// Content of the message
    pub content: String,
}

impl Message {
    /// Create a new user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    /// Create a new assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }

    /// Create a new system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }
}

/// Role of a message sender
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
            MessageRole::System => write!(f, "system"),
        }
    }
}

/// Text generation collaborator
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Returns the name of the provider (e.g., "gemini", "openai")
    fn name(&self) -> &str;

    /// Generate a reply for the given prompt
    ///
    /// # Arguments
    /// * `messages` - System directive, history window, and the new user input
    ///
    /// # Returns
    /// * `Ok(String)` - Non-empty reply text
    /// * `Err(LLMError)` - If the request fails or the reply is empty
    async fn generate(&self, messages: &[Message]) -> Result<String>;
}

/// Speech-to-text collaborator
#[async_trait]
pub trait Transcriber: Send + Sync {
    fn name(&self) -> &str;

    /// Transcribe audio bytes of the given MIME type
    async fn transcribe(&self, audio: &[u8], mime_type: &str) -> Result<String>;
}

/// Image description collaborator
#[async_trait]
pub trait VisionProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Describe an image, guided by `prompt`
    async fn describe_image(&self, image: &[u8], mime_type: &str, prompt: &str) -> Result<String>;
}

/// Text-to-speech collaborator
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    fn name(&self) -> &str;

    /// Synthesize speech, returning mp3 bytes
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>>;
}

/// The set of collaborators the orchestrator calls
#[derive(Clone)]
pub struct Collaborators {
    pub generator: Arc<dyn LLMProvider>,
    pub transcriber: Arc<dyn Transcriber>,
    pub vision: Arc<dyn VisionProvider>,

    /// Voice replies fall back to text when no synthesizer is configured
    pub synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators")
            .field("generator", &self.generator.name())
            .field("transcriber", &self.transcriber.name())
            .field("vision", &self.vision.name())
            .field(
                "synthesizer",
                &self.synthesizer.as_ref().map(|s| s.name().to_string()),
            )
            .finish()
    }
}

impl Collaborators {
    /// Build collaborators from configuration and environment credentials
    ///
    /// # Errors
    ///
    /// Returns `BotError::Config` when a selected provider has no API key.
    pub fn from_config(config: &Config) -> std::result::Result<Self, BotError> {
        let creds = &config.credentials;
        let missing = |var: &str| BotError::Config(format!("{} is not set", var));

        // Gemini is always needed for vision
        let google_key = creds
            .google_api_key
            .clone()
            .ok_or_else(|| missing("GOOGLE_API_KEY"))?;
        let gemini = Arc::new(GeminiProvider::new(config.llm.gemini.clone(), google_key));

        let groq = creds
            .groq_api_key
            .clone()
            .map(|key| Arc::new(GroqProvider::new(config.llm.groq.clone(), key)));

        let generator: Arc<dyn LLMProvider> = match config.llm.generation_provider.as_str() {
            "openai" => {
                let key = creds
                    .openai_api_key
                    .clone()
                    .ok_or_else(|| missing("OPENAI_API_KEY"))?;
                Arc::new(OpenAIProvider::new(config.llm.openai.clone(), key))
            }
            _ => Arc::clone(&gemini) as Arc<dyn LLMProvider>,
        };

        let transcriber: Arc<dyn Transcriber> = match config.llm.transcription_provider.as_str() {
            "groq" => {
                let groq = groq.clone().ok_or_else(|| missing("GROQ_API_KEY"))?;
                groq as Arc<dyn Transcriber>
            }
            _ => Arc::clone(&gemini) as Arc<dyn Transcriber>,
        };

        if groq.is_none() {
            tracing::warn!("GROQ_API_KEY not set, voice messages will be answered with text");
        }

        Ok(Self {
            generator,
            transcriber,
            vision: gemini,
            synthesizer: groq.map(|g| g as Arc<dyn SpeechSynthesizer>),
        })
    }
}
