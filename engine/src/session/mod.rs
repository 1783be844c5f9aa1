//! Per-conversation state
//!
//! A [`Session`] holds the ordered turn history and the single active
//! document of one conversation. Sessions are owned by the
//! [`SessionStore`]; other components borrow them through a
//! [`SessionGuard`] for the duration of one request and never keep them
//! across requests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod store;

pub use store::{spawn_eviction_task, SessionGuard, SessionStore};

/// Who produced a turn
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Original input kind of an event, kept after normalization to text
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Text,
    Voice,
    Image,
    Document,
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Modality::Text => "text",
            Modality::Voice => "voice",
            Modality::Image => "image",
            Modality::Document => "document",
        };
        f.write_str(name)
    }
}

/// One role-tagged message in a conversation's history
///
/// Turns are immutable once appended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    pub modality: Modality,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    pub fn user(content: impl Into<String>, modality: Modality) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            modality,
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>, modality: Modality) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            modality,
            timestamp: Utc::now(),
        }
    }
}

/// Supported document formats
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Pdf,
    Docx,
    Txt,
}

impl DocumentKind {
    /// Detect the format from the file extension, falling back to the declared MIME type
    pub fn detect(file_name: Option<&str>, declared_type: &str) -> Option<Self> {
        let by_extension = file_name
            .and_then(|name| name.rsplit_once('.'))
            .and_then(|(_, ext)| match ext.to_ascii_lowercase().as_str() {
                "pdf" => Some(Self::Pdf),
                "docx" => Some(Self::Docx),
                "txt" => Some(Self::Txt),
                _ => None,
            });

        by_extension.or_else(|| {
            let mime = declared_type
                .split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase();
            match mime.as_str() {
                "application/pdf" => Some(Self::Pdf),
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
                    Some(Self::Docx)
                }
                "text/plain" => Some(Self::Txt),
                _ => None,
            }
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Txt => "txt",
        }
    }
}

/// Extracted text and metadata of the document bound to a session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentContext {
    pub source_type: DocumentKind,
    pub extracted_text: String,

    /// Back-reference only; the session owns the document
    pub owner_session_id: String,

    pub file_name: String,
    pub size_bytes: usize,
    pub uploaded_at: DateTime<Utc>,
    pub summary: Option<String>,
}

impl DocumentContext {
    pub fn word_count(&self) -> usize {
        self.extracted_text.split_whitespace().count()
    }
}

/// History and document as they were before a change
///
/// Taken before mutating a session so the change can be undone when it
/// cannot be persisted.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    history: Vec<Turn>,
    document: Option<DocumentContext>,
}

/// Conversation state for one conversation identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    id: String,
    pub(crate) history: Vec<Turn>,
    pub(crate) document: Option<DocumentContext>,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            history: Vec::new(),
            document: None,
            created_at: now,
            last_active_at: now,
        }
    }

    /// Rebuild a session from persisted parts
    pub(crate) fn restore(
        id: String,
        history: Vec<Turn>,
        document: Option<DocumentContext>,
        created_at: DateTime<Utc>,
        last_active_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            history,
            document,
            created_at,
            last_active_at,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Turns in chronological order
    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    pub fn document(&self) -> Option<&DocumentContext> {
        self.document.as_ref()
    }

    pub fn touch(&mut self) {
        self.last_active_at = Utc::now();
    }

    pub fn is_idle_since(&self, cutoff: DateTime<Utc>) -> bool {
        self.last_active_at < cutoff
    }

    /// Drop the active document, returning it
    pub fn clear_document(&mut self) -> Option<DocumentContext> {
        self.document.take()
    }

    /// Drop history and document
    pub fn reset(&mut self) {
        self.history.clear();
        self.document = None;
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            history: self.history.clone(),
            document: self.document.clone(),
        }
    }

    /// Put history and document back as they were at `snapshot`
    pub fn rollback(&mut self, snapshot: SessionSnapshot) {
        self.history = snapshot.history;
        self.document = snapshot.document;
    }
}
