//! Prompt assembly
//!
//! Pure functions that turn the persona directive, the memory window, the
//! optional document excerpt and the new input into collaborator messages.

use crate::config::PersonaConfig;
use crate::document::truncate_chars;
use crate::llm::Message;
use crate::session::{DocumentContext, Role, Turn};
use chrono::{DateTime, Utc};

/// Vision prompt used when an image arrives without a caption
pub const DEFAULT_IMAGE_CAPTION: &str = "Describe this image in detail.";

/// Characters of a document sent to the generator for its summary
pub const SUMMARY_SOURCE_CHARS: usize = 2000;

/// Render the persona directive for one turn
pub fn render_directive(persona: &PersonaConfig, user_name: &str, now: DateTime<Utc>) -> String {
    persona
        .directive
        .replace("{name}", &persona.name)
        .replace("{user_name}", user_name)
        .replace("{time}", &now.format("%Y-%m-%d %H:%M:%S UTC").to_string())
}

/// Directive section describing the session's document
pub fn document_section(document: &DocumentContext, excerpt: &str) -> String {
    let mut section = format!(
        "\n\n## Document Context Available:\nThe user has uploaded a document: {}\n",
        document.file_name
    );
    if let Some(summary) = &document.summary {
        section.push_str(&format!("Summary: {}\n", summary));
    }
    section.push_str(&format!(
        "\nDocument content (excerpt):\n{}\n\nUse this document context to answer questions when relevant.",
        excerpt
    ));
    section
}

/// System message, then the window oldest first, then the new input
pub fn build_prompt(system: String, window: &[Turn], input: &str) -> Vec<Message> {
    let mut messages = Vec::with_capacity(window.len() + 2);
    messages.push(Message::system(system));
    messages.extend(window.iter().map(|turn| match turn.role {
        Role::User => Message::user(turn.content.clone()),
        Role::Assistant => Message::assistant(turn.content.clone()),
    }));
    messages.push(Message::user(input));
    messages
}

/// Normalized text of an image turn
pub fn image_input(description: &str, caption: &str) -> String {
    format!(
        "# The user provided the following image and text.\n\n## Image Description:\n{}\n\n## User Message:\n{}",
        description, caption
    )
}

/// Generator request for a short document summary
pub fn summary_request(extracted_text: &str) -> Vec<Message> {
    let head = truncate_chars(extracted_text, SUMMARY_SOURCE_CHARS);
    let ellipsis = if head.len() < extracted_text.len() {
        "..."
    } else {
        ""
    };
    vec![Message::user(format!(
        "Please provide a brief summary (2-3 sentences) of this document:\n\n{}{}",
        head, ellipsis
    ))]
}

/// Summary used when the generator can't provide one
pub fn fallback_summary(document: &DocumentContext) -> String {
    format!("Document with {} words uploaded.", document.word_count())
}

/// Reply confirming an upload
pub fn upload_confirmation(document: &DocumentContext) -> String {
    let mut reply = format!(
        "📄 Document uploaded successfully!\n\nFile: {}\nType: {}",
        document.file_name,
        document.source_type.as_str().to_uppercase()
    );
    if let Some(summary) = &document.summary {
        reply.push_str(&format!("\n\nSummary: {}", summary));
    }
    reply.push_str("\n\nYou can now ask me questions about this document!");
    reply
}
