//! Inbound event and reply types
//!
//! These are the platform-neutral shapes a transport hands to the engine and
//! gets back from it. A transport converts its own wire format (e.g. a
//! Telegram `Update`) into an `InboundEvent` and renders the `Reply`.

use serde::{Deserialize, Serialize};

/// Declared content type for plain chat text
pub const TEXT_PLAIN: &str = "text/plain";

/// Who sent an inbound event
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sender {
    /// Platform user identifier
    pub id: String,

    /// First name used to address the user, if the platform supplies one
    pub first_name: Option<String>,
}

impl Sender {
    /// Create a sender
    pub fn new(id: impl Into<String>, first_name: Option<String>) -> Self {
        Self {
            id: id.into(),
            first_name,
        }
    }

    /// Name used when addressing the user
    pub fn display_name(&self) -> &str {
        self.first_name
            .as_deref()
            .and_then(|name| name.split_whitespace().next())
            .unwrap_or("there")
    }
}

/// Payload of an inbound event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventBody {
    /// Plain text
    Text(String),

    /// A downloaded file (voice note, photo, document)
    File {
        bytes: Vec<u8>,
        file_name: Option<String>,
        caption: Option<String>,
    },

    /// The platform delivered something without a usable payload
    /// (sticker, location, video, ...)
    Empty,
}

/// One inbound chat event, delivered at-least-once by a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    /// Conversation key (chat ID); stable for the conversation's lifetime
    pub conversation_id: String,

    /// Sender of the event
    pub sender: Sender,

    /// Declared MIME type of the payload
    pub content_type: String,

    /// The payload
    pub body: EventBody,
}

impl InboundEvent {
    /// Create a plain text event
    pub fn text(
        conversation_id: impl Into<String>,
        sender: Sender,
        text: impl Into<String>,
    ) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            sender,
            content_type: TEXT_PLAIN.to_string(),
            body: EventBody::Text(text.into()),
        }
    }

    /// Create a file event
    pub fn file(
        conversation_id: impl Into<String>,
        sender: Sender,
        content_type: impl Into<String>,
        bytes: Vec<u8>,
        file_name: Option<String>,
        caption: Option<String>,
    ) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            sender,
            content_type: content_type.into(),
            body: EventBody::File {
                bytes,
                file_name,
                caption,
            },
        }
    }
}

/// The single reply produced for an inbound event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Text message
    Text(String),

    /// Voice reply; `text` is what was spoken
    Audio { audio: Vec<u8>, text: String },
}

impl Reply {
    /// Create a text reply
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// The textual content of the reply
    pub fn as_text(&self) -> &str {
        match self {
            Self::Text(text) => text,
            Self::Audio { text, .. } => text,
        }
    }

    /// Whether the reply carries audio
    pub fn is_audio(&self) -> bool {
        matches!(self, Self::Audio { .. })
    }
}
