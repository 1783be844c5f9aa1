//! Wizzy SDK
//!
//! Shared error taxonomy and platform-neutral event types.
//! This crate is used by the engine and by transport adapters.

/// Error types and handling
pub mod errors;

/// Inbound event and reply types
pub mod types;

// Re-export commonly used types
pub use errors::{BotError, BotErrorExt};
pub use types::{EventBody, InboundEvent, Reply, Sender};
