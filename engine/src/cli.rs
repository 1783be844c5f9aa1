//! CLI interface for Wizzy
//!
//! This module provides the command-line interface using clap's derive API.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Wizzy Telegram assistant
///
/// Answers text, voice, photo and document messages with per-chat memory.
#[derive(Parser, Debug)]
#[command(name = "wizzy")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log: Option<String>,

    /// Specify alternate configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the webhook server (registers the webhook when server.public_url is set)
    Serve,

    /// Receive updates by long polling instead of a webhook
    Poll,

    /// Register the Telegram webhook and exit
    SetWebhook {
        /// Public HTTPS URL of the /webhook endpoint
        url: String,
    },
}
