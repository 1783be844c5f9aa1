//! Input Classifier
//!
//! Tags an inbound event with exactly one variant. Pure: no I/O, no session
//! access.

use crate::document::Upload;
use crate::session::Modality;
use sdk::errors::BotError;
use sdk::types::{EventBody, InboundEvent};

/// An inbound payload tagged by kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassifiedInput {
    Text(String),
    Voice {
        audio: Vec<u8>,
        mime_type: String,
    },
    Image {
        image: Vec<u8>,
        mime_type: String,
        caption: Option<String>,
    },
    Document(Upload),
}

impl ClassifiedInput {
    pub fn modality(&self) -> Modality {
        match self {
            Self::Text(_) => Modality::Text,
            Self::Voice { .. } => Modality::Voice,
            Self::Image { .. } => Modality::Image,
            Self::Document(_) => Modality::Document,
        }
    }
}

/// Bare, lowercase MIME type without parameters
fn essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Classify an inbound event
///
/// | Content type | Body | Variant |
/// |---|---|---|
/// | `text/plain` | text | `Text` |
/// | `audio/*` | file | `Voice` |
/// | `image/*` | file | `Image` |
/// | `application/*`, `text/*` | file | `Document` |
///
/// # Errors
///
/// `UnsupportedMediaKind` for anything else, including empty bodies.
pub fn classify(content_type: &str, body: EventBody) -> Result<ClassifiedInput, BotError> {
    let mime = essence(content_type);
    let top_level = mime.split('/').next().unwrap_or_default().to_string();

    match body {
        EventBody::Text(text) if mime == "text/plain" => Ok(ClassifiedInput::Text(text)),

        EventBody::File {
            bytes,
            file_name,
            caption,
        } => match top_level.as_str() {
            "audio" => Ok(ClassifiedInput::Voice {
                audio: bytes,
                mime_type: mime,
            }),
            "image" => Ok(ClassifiedInput::Image {
                image: bytes,
                mime_type: mime,
                caption,
            }),
            "application" | "text" => Ok(ClassifiedInput::Document(Upload {
                bytes,
                file_name,
                declared_type: mime,
                caption,
            })),
            _ => Err(BotError::UnsupportedMediaKind(mime)),
        },

        _ => Err(BotError::UnsupportedMediaKind(if mime.is_empty() {
            "empty".to_string()
        } else {
            mime
        })),
    }
}

/// Classify a whole event, keeping nothing but the payload
pub fn classify_event(event: InboundEvent) -> Result<ClassifiedInput, BotError> {
    classify(&event.content_type, event.body)
}
