//! Secret handling
//!
//! Credentials are read from the environment at startup and wrapped in
//! [`SecretString`] so they cannot end up in `Debug` output by accident.
//! [`scrub`] removes anything that looks like a credential from text before
//! it is logged or sent back to a chat. Telegram file URLs embed the bot
//! token, so every collaborator and transport error passes through it.

use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

/// A wrapper for sensitive string data that prevents accidental logging.
///
/// It implements `Debug` and `Display` to always print `[REDACTED]`.
/// To access the actual secret value, use the `unsecure()` method.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretString(String);

impl SecretString {
    /// Create a new SecretString
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Access the raw underlying string
    pub fn unsecure(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretString([REDACTED])")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Regex patterns for detecting common secret formats.
/// These are compiled once and reused.
static SECRET_PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();

/// Patterns match:
/// - OpenAI API keys: sk-...
/// - Groq API keys: gsk_...
/// - Google API keys: AIza + 35 chars
/// - Telegram bot tokens: digits:35 chars (also inside `/bot<token>/` URLs)
/// - Bearer tokens
fn get_secret_patterns() -> &'static [Regex] {
    SECRET_PATTERNS.get_or_init(|| {
        [
            r"gsk_[a-zA-Z0-9]{20,}",
            r"sk-[a-zA-Z0-9\-_]{20,}",
            r"AIza[0-9A-Za-z\-_]{35}",
            r"[0-9]{8,10}:[a-zA-Z0-9\-_]{35}",
            r"Bearer\s+[^\s]{20,}",
            r"key=[^&\s]{20,}",
        ]
        .iter()
        .filter_map(|pattern| Regex::new(pattern).ok())
        .collect()
    })
}

/// Replace anything that looks like a credential with `[REDACTED]`
pub fn scrub(text: &str) -> String {
    let mut result = text.to_string();

    for pattern in get_secret_patterns() {
        result = pattern.replace_all(&result, "[REDACTED]").into_owned();
    }

    result
}
