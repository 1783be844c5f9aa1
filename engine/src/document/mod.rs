//! Document Context Manager
//!
//! Validates uploads, runs extraction off the async runtime, and binds the
//! result to the owning session. A session has at most one document; a new
//! upload replaces the old one.

use crate::config::DocumentsConfig;
use crate::session::{DocumentContext, DocumentKind, Session};
use chrono::Utc;
use sdk::errors::BotError;
use std::sync::Arc;
use tracing::{info, warn};

pub mod extract;

pub use extract::{DefaultExtractor, ExtractError, TextExtractor};

/// An uploaded file awaiting validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub bytes: Vec<u8>,
    pub file_name: Option<String>,

    /// Declared MIME type, without parameters
    pub declared_type: String,

    pub caption: Option<String>,
}

impl Upload {
    /// File name shown to the user
    pub fn display_name(&self) -> &str {
        self.file_name.as_deref().unwrap_or("unknown_document")
    }
}

/// Longest prefix of `text` with at most `max_chars` characters
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Binds extracted document text to sessions
pub struct DocumentContextManager {
    extractor: Arc<dyn TextExtractor>,
    max_file_bytes: usize,
    max_extracted_chars: usize,
    excerpt_chars: usize,
}

impl DocumentContextManager {
    pub fn new(config: &DocumentsConfig, extractor: Arc<dyn TextExtractor>) -> Self {
        Self {
            extractor,
            max_file_bytes: config.max_file_bytes,
            max_extracted_chars: config.max_extracted_chars,
            excerpt_chars: config.excerpt_chars,
        }
    }

    pub fn max_file_bytes(&self) -> usize {
        self.max_file_bytes
    }

    /// Validate, extract and attach an upload to `session`
    ///
    /// On success the session's previous document is replaced and the
    /// session is touched. On any error the session is left unchanged.
    ///
    /// # Errors
    ///
    /// - `UnsupportedFileType` unless the upload is PDF, DOCX or TXT
    /// - `FileTooLarge` if it is larger than the configured maximum
    ///   (exactly the maximum is accepted)
    /// - `ExtractionFailed` if the extractor errors, panics, or finds no text
    pub async fn attach<'s>(
        &self,
        session: &'s mut Session,
        upload: Upload,
    ) -> Result<&'s DocumentContext, BotError> {
        let kind = DocumentKind::detect(upload.file_name.as_deref(), &upload.declared_type)
            .ok_or_else(|| {
                BotError::UnsupportedFileType(format!(
                    "{} ({})",
                    upload.display_name(),
                    upload.declared_type
                ))
            })?;

        let size = upload.bytes.len();
        if size > self.max_file_bytes {
            return Err(BotError::FileTooLarge {
                size,
                limit: self.max_file_bytes,
            });
        }

        let file_name = upload.display_name().to_string();
        let extractor = Arc::clone(&self.extractor);
        let bytes = upload.bytes;

        let extracted = tokio::task::spawn_blocking(move || extractor.extract(kind, &bytes))
            .await
            .map_err(|e| {
                warn!("Extractor panicked on {}: {}", file_name, e);
                BotError::ExtractionFailed(format!("extractor panicked on {}", file_name))
            })?
            .map_err(|e| BotError::ExtractionFailed(e.to_string()))?;

        let extracted_text = truncate_chars(&extracted, self.max_extracted_chars).to_string();

        info!(
            conversation_id = %session.id(),
            file_name = %file_name,
            kind = kind.as_str(),
            chars = extracted_text.chars().count(),
            "document attached"
        );

        let document = DocumentContext {
            source_type: kind,
            extracted_text,
            owner_session_id: session.id().to_string(),
            file_name,
            size_bytes: size,
            uploaded_at: Utc::now(),
            summary: None,
        };

        session.touch();
        Ok(session.document.insert(document))
    }

    /// Document text to include in a prompt
    ///
    /// Without relevance scoring this is the head of the document, up to the
    /// excerpt budget. `None` when the session has no document.
    pub fn query<'s>(&self, session: &'s Session, _question: &str) -> Option<&'s str> {
        session
            .document()
            .map(|doc| truncate_chars(&doc.extracted_text, self.excerpt_chars))
    }

    /// Record a summary on the session's current document
    pub fn set_summary(&self, session: &mut Session, summary: String) {
        if let Some(doc) = session.document.as_mut() {
            doc.summary = Some(summary);
        }
    }
}
