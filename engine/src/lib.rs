//! Wizzy Engine Library
//!
//! This library provides the session and context layer of the Wizzy bot.
//! It is used by both the main binary and integration tests.

/// Configuration management module
pub mod config;

/// Secret management module
pub mod secrets;

/// Telemetry and Observability
pub mod telemetry;

/// AI collaborator abstraction layer
pub mod llm;

/// Input classification module
pub mod classifier;

/// Per-conversation sessions and the session store
pub mod session;

/// Bounded conversation memory
pub mod memory;

/// Document upload, extraction and context
pub mod document;

/// Database persistence module
pub mod db;

/// Per-event response orchestration
pub mod orchestrator;

/// Telegram bot module
pub mod bot;

/// Webhook and health HTTP server
pub mod server;

/// CLI interface module
pub mod cli;

/// Command handlers module
pub mod handlers;
