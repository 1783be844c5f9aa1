//! Command handlers for CLI operations
//!
//! This module implements the handlers for all CLI commands:
//! - serve: Run the webhook server
//! - poll: Receive updates by long polling
//! - set-webhook: Register the webhook URL with Telegram

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::bot::TelegramBot;
use crate::config::Config;
use crate::db::Database;
use crate::document::DefaultExtractor;
use crate::llm::Collaborators;
use crate::orchestrator::Orchestrator;
use crate::server::{self, AppState};
use crate::session::{spawn_eviction_task, SessionStore};

/// Long-lived components shared by the serve and poll handlers
struct Runtime {
    bot: TelegramBot,
    orchestrator: Arc<Orchestrator>,
    database: Option<Database>,
    eviction: JoinHandle<()>,
}

impl Runtime {
    async fn build(config: &Config) -> Result<Self> {
        let bot = telegram_bot(config)?;

        let database = match &config.storage.database_url {
            Some(url) => Some(
                Database::connect(url)
                    .await
                    .context("Failed to open session database")?,
            ),
            None => None,
        };

        let store = Arc::new(match &database {
            Some(db) => {
                info!("Persisting sessions to SQLite");
                SessionStore::with_backend(Arc::new(db.sessions()))
            }
            None => {
                info!("Keeping sessions in memory");
                SessionStore::in_memory()
            }
        });

        let collaborators = Collaborators::from_config(config)?;
        info!(
            generator = collaborators.generator.name(),
            transcriber = collaborators.transcriber.name(),
            vision = collaborators.vision.name(),
            "collaborators ready"
        );

        let orchestrator = Arc::new(Orchestrator::new(
            config,
            Arc::clone(&store),
            collaborators,
            Arc::new(DefaultExtractor::new(config.documents.max_extracted_chars)),
        ));

        let eviction = spawn_eviction_task(
            store,
            Duration::from_secs(config.sessions.idle_ttl_secs),
            Duration::from_secs(config.sessions.sweep_interval_secs.max(1)),
        );

        Ok(Self {
            bot,
            orchestrator,
            database,
            eviction,
        })
    }

    async fn shutdown(self) {
        self.eviction.abort();
        if let Some(database) = self.database {
            if let Err(e) = database.close().await {
                warn!("Failed to close session database: {:#}", e);
            }
        }
        info!("Shutdown complete");
    }
}

fn telegram_bot(config: &Config) -> Result<TelegramBot> {
    let token = config
        .credentials
        .telegram_bot_token
        .clone()
        .context("TELEGRAM_BOT_TOKEN is not set")?;
    Ok(TelegramBot::new(
        &config.telegram,
        token,
        config.documents.max_file_bytes,
    ))
}

fn webhook_url(public_url: &str) -> String {
    let base = public_url.trim_end_matches('/');
    if base.ends_with("/webhook") {
        base.to_string()
    } else {
        format!("{}/webhook", base)
    }
}

/// Run the webhook server until Ctrl-C
pub async fn handle_serve(config: &Config) -> Result<()> {
    let runtime = Runtime::build(config).await?;

    match &config.server.public_url {
        Some(public_url) => {
            let url = webhook_url(public_url);
            if let Err(e) = runtime
                .bot
                .set_webhook(&url, config.server.webhook_secret.as_deref())
                .await
            {
                warn!("Failed to register webhook {}: {}", url, e);
            }
        }
        None => info!("server.public_url not set, leaving the webhook registration unchanged"),
    }

    let state = AppState {
        bot: runtime.bot.clone(),
        orchestrator: Arc::clone(&runtime.orchestrator),
        webhook_secret: config.server.webhook_secret.clone(),
    };

    let result = server::serve(&config.server, state).await;
    runtime.shutdown().await;
    result
}

/// Long-poll for updates until Ctrl-C
pub async fn handle_poll(config: &Config) -> Result<()> {
    let runtime = Runtime::build(config).await?;

    // getUpdates is refused while a webhook is registered
    runtime
        .bot
        .delete_webhook()
        .await
        .context("Failed to delete webhook")?;

    let result = tokio::select! {
        result = runtime.bot.start_polling(Arc::clone(&runtime.orchestrator)) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl-C, stopping");
            Ok(())
        }
    };

    runtime.shutdown().await;
    result
}

/// Register `url` as the webhook and exit
pub async fn handle_set_webhook(url: String, config: &Config) -> Result<()> {
    let bot = telegram_bot(config)?;
    let url = webhook_url(&url);
    bot.set_webhook(&url, config.server.webhook_secret.as_deref())
        .await?;
    println!("Webhook set to {}", url);
    Ok(())
}
