//! Error types and handling
//!
//! This module provides the error taxonomy shared by every Wizzy component.
//! All errors implement the `BotErrorExt` trait which provides the reply a
//! user sees when a request ends in that error, and whether the failure is
//! transient.
//!
//! # Security
//!
//! User hints are static strings. They never include:
//! - Secrets (bot tokens, API keys)
//! - Collaborator response bodies
//! - Internal file names or URLs

use thiserror::Error;

/// Trait for Wizzy error extensions
///
/// Every terminal failure of an inbound event is answered with exactly one
/// reply, and that reply is the error's `user_hint`.
pub trait BotErrorExt {
    /// Returns the user-visible reply for the error
    fn user_hint(&self) -> &str;

    /// Returns whether retrying the same request later may succeed
    fn is_recoverable(&self) -> bool;
}

/// Main error type for the session and context layer
///
/// # Error Categories
///
/// - **Validation**: `UnsupportedMediaKind`, `UnsupportedFileType`, `FileTooLarge`
/// - **Collaborators**: `ExtractionFailed`, `TranscriptionFailed`, `VisionFailed`,
///   `GenerationFailed`, `SynthesisFailed`
/// - **Storage**: `StoreUnavailable`
/// - **Ambient**: `Config`, `Transport`, `Io`
///
/// # Examples
///
/// ```
/// use sdk::errors::{BotError, BotErrorExt};
///
/// let error = BotError::FileTooLarge { size: 30, limit: 20 };
/// assert!(!error.is_recoverable());
///
/// let transient = BotError::GenerationFailed("503".to_string());
/// assert!(transient.is_recoverable());
/// ```
#[derive(Debug, Error)]
pub enum BotError {
    // Validation errors
    #[error("Unsupported media kind: {0}")]
    UnsupportedMediaKind(String),

    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("File too large: {size} bytes > {limit} bytes")]
    FileTooLarge { size: usize, limit: usize },

    // Collaborator errors
    #[error("Text extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("Transcription failed: {0}")]
    TranscriptionFailed(String),

    #[error("Image description failed: {0}")]
    VisionFailed(String),

    #[error("Text generation failed: {0}")]
    GenerationFailed(String),

    #[error("Speech synthesis failed: {0}")]
    SynthesisFailed(String),

    // Storage errors
    #[error("Session store unavailable: {0}")]
    StoreUnavailable(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Transport errors
    #[error("Transport error: {0}")]
    Transport(String),

    // Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BotErrorExt for BotError {
    fn user_hint(&self) -> &str {
        match self {
            // Validation errors
            Self::UnsupportedMediaKind(_) => {
                "Sorry, I can't handle that kind of message. Send me text, a voice note, a photo or a document."
            }
            Self::UnsupportedFileType(_) => {
                "Unsupported document format. I support PDF, DOCX, and TXT files."
            }
            Self::FileTooLarge { .. } => {
                "Sorry, the document is too large. Please upload a smaller file."
            }

            // Collaborator errors
            Self::ExtractionFailed(_) => {
                "Sorry, I couldn't extract any text from that document. It might be empty or corrupted."
            }
            Self::TranscriptionFailed(_) => "Sorry, I couldn't process your voice message.",
            Self::VisionFailed(_) => "Sorry, I couldn't process your image.",
            Self::GenerationFailed(_) => {
                "Sorry, I encountered an error processing your message. Please try again."
            }
            Self::SynthesisFailed(_) => "Sorry, I couldn't record a voice reply.",

            // Storage errors
            Self::StoreUnavailable(_) => {
                "Sorry, I'm having trouble remembering things right now. Please try again in a moment."
            }

            // Ambient errors
            Self::Config(_) => "Sorry, I'm not configured correctly.",
            Self::Transport(_) => "Sorry, I couldn't download your file. Please try again.",
            Self::Io(_) => "Sorry, I encountered an error.",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            // Retrying the same input gives the same answer
            Self::UnsupportedMediaKind(_)
            | Self::UnsupportedFileType(_)
            | Self::FileTooLarge { .. }
            | Self::ExtractionFailed(_)
            | Self::Config(_) => false,

            // Collaborator and storage outages are transient
            _ => true,
        }
    }
}
