//! Chat commands
//!
//! Commands are answered without collaborator calls and never become turns.

/// A slash command sent as a text message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    /// Clear history and document
    Reset,
    /// Clear only the document
    Forget,
    Unknown(String),
}

impl Command {
    /// Parse `text` as a command; `None` for ordinary messages
    ///
    /// Accepts a trailing `@botname` and ignores arguments. Names are
    /// letters, digits and underscores, so a message opening with a path
    /// such as `/etc/hosts` is not a command.
    pub fn parse(text: &str) -> Option<Self> {
        let word = text.trim().split_whitespace().next()?;
        let name = word.strip_prefix('/')?;
        let name = name.split('@').next().unwrap_or_default();
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return None;
        }

        Some(match name.to_ascii_lowercase().as_str() {
            "start" => Self::Start,
            "help" => Self::Help,
            "reset" => Self::Reset,
            "forget" => Self::Forget,
            _ => Self::Unknown(name.to_string()),
        })
    }
}

pub fn greeting(bot_name: &str, user_name: &str) -> String {
    format!(
        "Hi {}! I'm {}. Send me a message, a voice note, a photo, or a PDF/DOCX/TXT \
         document and ask me about it. Type /help to see what I can do.",
        user_name, bot_name
    )
}

pub fn help(bot_name: &str) -> String {
    format!(
        "{} understands:\n\
         • Text messages\n\
         • Voice notes (I'll answer with a voice note)\n\
         • Photos, with an optional caption as your question\n\
         • Documents (PDF, DOCX, TXT) to ask questions about\n\n\
         Commands:\n\
         /reset - forget our conversation and your document\n\
         /forget - forget only your document\n\
         /help - show this message",
        bot_name
    )
}

pub const RESET_REPLY: &str = "Done! I've forgotten our conversation and any document you shared.";

pub const FORGET_REPLY: &str = "Done! I've forgotten your document.";

pub const NO_DOCUMENT_REPLY: &str = "You haven't shared a document with me yet.";

pub fn unknown(name: &str) -> String {
    format!("I don't know the /{} command. Type /help to see what I can do.", name)
}
