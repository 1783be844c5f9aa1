//! Telegram Bot Integration
//!
//! Converts Bot API updates into inbound events, hands them to the
//! orchestrator and delivers the reply. Updates arrive either through the
//! webhook server or through long polling.
//!
//! Telegram delivers updates at least once, so recently seen `update_id`s are
//! remembered and redeliveries are ignored. Every processed update gets
//! exactly one reply message.

use anyhow::{Context, Result};
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::TelegramConfig;
use crate::document::truncate_chars;
use crate::orchestrator::Orchestrator;
use crate::secrets::{scrub, SecretString};
use sdk::errors::{BotError, BotErrorExt};
use sdk::types::{EventBody, InboundEvent, Reply, Sender};

/// Number of update ids remembered for redelivery detection
const RECENT_UPDATES: usize = 1024;

/// Voice notes are OGG/Opus unless Telegram says otherwise
const DEFAULT_VOICE_MIME: &str = "audio/ogg";

/// Telegram re-encodes all photos as JPEG
const PHOTO_MIME: &str = "image/jpeg";

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Message {
    pub chat: Chat,
    pub from: Option<User>,
    pub text: Option<String>,
    pub caption: Option<String>,
    pub voice: Option<Voice>,
    pub photo: Option<Vec<PhotoSize>>,
    pub document: Option<Document>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Chat {
    pub id: i64,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct User {
    pub id: i64,
    pub first_name: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Voice {
    pub file_id: String,
    pub mime_type: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct PhotoSize {
    pub file_id: String,
    pub width: u32,
    pub height: u32,
    pub file_size: Option<u64>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Document {
    pub file_id: String,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
    pub file_size: Option<u64>,
}

#[derive(Deserialize, Debug)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

impl<T> ApiResponse<T> {
    fn into_result(self, method: &str) -> Result<T> {
        match (self.ok, self.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(anyhow::anyhow!(
                "Telegram {} failed: {}",
                method,
                self.description.unwrap_or_else(|| "ok=false".to_string())
            )),
        }
    }
}

#[derive(Deserialize, Debug)]
struct FileInfo {
    file_path: Option<String>,
}

/// Bounded set of recently seen update ids
#[derive(Debug)]
struct RecentUpdates {
    order: VecDeque<i64>,
    ids: HashSet<i64>,
    capacity: usize,
}

impl RecentUpdates {
    fn new(capacity: usize) -> Self {
        Self {
            order: VecDeque::with_capacity(capacity),
            ids: HashSet::with_capacity(capacity),
            capacity,
        }
    }

    /// Record `id`; false if it was already seen
    fn insert(&mut self, id: i64) -> bool {
        if !self.ids.insert(id) {
            return false;
        }
        self.order.push_back(id);
        if self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.ids.remove(&oldest);
            }
        }
        true
    }

    fn remove(&mut self, id: i64) {
        if self.ids.remove(&id) {
            self.order.retain(|&seen| seen != id);
        }
    }
}

/// Largest photo variant, by file size then resolution
fn largest_photo(photos: &[PhotoSize]) -> Option<&PhotoSize> {
    photos
        .iter()
        .max_by_key(|p| (p.file_size.unwrap_or(0), u64::from(p.width) * u64::from(p.height)))
}

fn transport_error(err: reqwest::Error) -> BotError {
    BotError::Transport(scrub(&err.without_url().to_string()))
}

#[derive(Clone)]
pub struct TelegramBot {
    token: SecretString,
    api_base: String,
    client: Client,
    poll_timeout_secs: u64,
    max_reply_chars: usize,
    max_file_bytes: usize,
    seen: Arc<Mutex<RecentUpdates>>,
}

impl std::fmt::Debug for TelegramBot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramBot")
            .field("api_base", &self.api_base)
            .field("max_reply_chars", &self.max_reply_chars)
            .field("max_file_bytes", &self.max_file_bytes)
            .finish()
    }
}

impl TelegramBot {
    pub fn new(config: &TelegramConfig, token: SecretString, max_file_bytes: usize) -> Self {
        Self {
            token,
            api_base: config.api_base_url.trim_end_matches('/').to_string(),
            client: Client::builder()
                .timeout(Duration::from_secs(config.poll_timeout_secs + 30))
                .build()
                .unwrap_or_default(),
            poll_timeout_secs: config.poll_timeout_secs,
            max_reply_chars: config.max_reply_chars,
            max_file_bytes,
            seen: Arc::new(Mutex::new(RecentUpdates::new(RECENT_UPDATES))),
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token.unsecure(), method)
    }

    fn file_url(&self, file_path: &str) -> String {
        format!(
            "{}/file/bot{}/{}",
            self.api_base,
            self.token.unsecure(),
            file_path
        )
    }

    /// Process one update end to end
    ///
    /// Redelivered updates and updates without a message are ignored.
    pub async fn process_update(&self, orchestrator: &Orchestrator, update: Update) {
        if !self.seen.lock().await.insert(update.update_id) {
            debug!(update_id = update.update_id, "Ignoring redelivered update");
            return;
        }

        let Some(message) = update.message else {
            debug!(update_id = update.update_id, "Update has no message");
            return;
        };
        let chat_id = message.chat.id;

        let reply = match self.to_event(&message).await {
            Ok(event) => orchestrator.handle(event).await,
            Err(e) => {
                warn!(chat_id, "Failed to read message: {}", e);
                Reply::text(e.user_hint())
            }
        };

        if let Err(e) = self.send_reply(chat_id, &reply).await {
            error!(chat_id, "Failed to send reply: {}", scrub(&format!("{:#}", e)));
        }
    }

    /// Let a redelivery of `update_id` through again
    ///
    /// Called when processing the update failed before a reply was sent.
    pub async fn forget_update(&self, update_id: i64) {
        self.seen.lock().await.remove(update_id);
    }

    /// Build the inbound event for a message, downloading any file payload
    ///
    /// Messages with no supported payload become events with an empty body.
    pub async fn to_event(&self, message: &Message) -> Result<InboundEvent, BotError> {
        let conversation_id = message.chat.id.to_string();
        let sender = match &message.from {
            Some(user) => Sender::new(user.id.to_string(), user.first_name.clone()),
            None => Sender::new(conversation_id.clone(), None),
        };

        if let Some(voice) = &message.voice {
            let audio = self.download(&voice.file_id).await?;
            let mime = voice
                .mime_type
                .clone()
                .unwrap_or_else(|| DEFAULT_VOICE_MIME.to_string());
            return Ok(InboundEvent::file(
                conversation_id,
                sender,
                mime,
                audio,
                None,
                None,
            ));
        }

        if let Some(photo) = message.photo.as_deref().and_then(largest_photo) {
            let image = self.download(&photo.file_id).await?;
            return Ok(InboundEvent::file(
                conversation_id,
                sender,
                PHOTO_MIME,
                image,
                None,
                message.caption.clone(),
            ));
        }

        if let Some(document) = &message.document {
            // Reject before downloading when Telegram reports the size
            if let Some(size) = document.file_size {
                let size = usize::try_from(size).unwrap_or(usize::MAX);
                if size > self.max_file_bytes {
                    return Err(BotError::FileTooLarge {
                        size,
                        limit: self.max_file_bytes,
                    });
                }
            }

            let bytes = self.download(&document.file_id).await?;
            let mime = document
                .mime_type
                .clone()
                .unwrap_or_else(|| "application/octet-stream".to_string());
            return Ok(InboundEvent::file(
                conversation_id,
                sender,
                mime,
                bytes,
                document.file_name.clone(),
                message.caption.clone(),
            ));
        }

        if let Some(text) = &message.text {
            return Ok(InboundEvent::text(conversation_id, sender, text.clone()));
        }

        Ok(InboundEvent {
            conversation_id,
            sender,
            content_type: String::new(),
            body: EventBody::Empty,
        })
    }

    /// Download a file by id via `getFile`
    async fn download(&self, file_id: &str) -> Result<Vec<u8>, BotError> {
        let info: ApiResponse<FileInfo> = self
            .client
            .get(self.method_url("getFile"))
            .query(&[("file_id", file_id)])
            .send()
            .await
            .map_err(transport_error)?
            .json()
            .await
            .map_err(transport_error)?;

        let file_path = info
            .into_result("getFile")
            .map_err(|e| BotError::Transport(scrub(&e.to_string())))?
            .file_path
            .ok_or_else(|| BotError::Transport("getFile returned no file_path".to_string()))?;

        let bytes = self
            .client
            .get(self.file_url(&file_path))
            .send()
            .await
            .map_err(transport_error)?
            .error_for_status()
            .map_err(transport_error)?
            .bytes()
            .await
            .map_err(transport_error)?;

        debug!(bytes = bytes.len(), "downloaded file");
        Ok(bytes.to_vec())
    }

    /// Deliver a reply; audio that fails to send falls back to its text
    pub async fn send_reply(&self, chat_id: i64, reply: &Reply) -> Result<()> {
        match reply {
            Reply::Text(text) => self.send_message(chat_id, text).await,
            Reply::Audio { audio, text } => match self.send_audio(chat_id, audio.clone()).await {
                Ok(()) => Ok(()),
                Err(e) => {
                    warn!(chat_id, "sendAudio failed, sending text: {:#}", e);
                    self.send_message(chat_id, text).await
                }
            },
        }
    }

    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        // Scrub secrets from outgoing messages
        let scrubbed = scrub(truncate_chars(text, self.max_reply_chars));

        #[derive(Serialize)]
        struct SendMsgReq<'a> {
            chat_id: i64,
            text: &'a str,
        }

        let req = SendMsgReq {
            chat_id,
            text: &scrubbed,
        };

        self.client
            .post(self.method_url("sendMessage"))
            .json(&req)
            .send()
            .await
            .map_err(|e| e.without_url())?
            .json::<ApiResponse<serde_json::Value>>()
            .await
            .map_err(|e| e.without_url())?
            .into_result("sendMessage")?;
        Ok(())
    }

    pub async fn send_audio(&self, chat_id: i64, audio: Vec<u8>) -> Result<()> {
        let part = Part::bytes(audio)
            .file_name("response.mp3")
            .mime_str("audio/mpeg")?;
        let form = Form::new()
            .text("chat_id", chat_id.to_string())
            .part("audio", part);

        self.client
            .post(self.method_url("sendAudio"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| e.without_url())?
            .json::<ApiResponse<serde_json::Value>>()
            .await
            .map_err(|e| e.without_url())?
            .into_result("sendAudio")?;
        Ok(())
    }

    /// Register `url` as the webhook, optionally with a secret token
    pub async fn set_webhook(&self, url: &str, secret: Option<&str>) -> Result<()> {
        let mut body = serde_json::json!({
            "url": url,
            "allowed_updates": ["message"],
        });
        if let Some(secret) = secret {
            body["secret_token"] = serde_json::Value::String(secret.to_string());
        }

        self.client
            .post(self.method_url("setWebhook"))
            .json(&body)
            .send()
            .await
            .map_err(|e| e.without_url())?
            .json::<ApiResponse<serde_json::Value>>()
            .await
            .map_err(|e| e.without_url())?
            .into_result("setWebhook")?;

        info!("Webhook set to: {}", url);
        Ok(())
    }

    pub async fn delete_webhook(&self) -> Result<()> {
        self.client
            .post(self.method_url("deleteWebhook"))
            .send()
            .await
            .map_err(|e| e.without_url())?
            .json::<ApiResponse<serde_json::Value>>()
            .await
            .map_err(|e| e.without_url())?
            .into_result("deleteWebhook")?;
        Ok(())
    }

    pub async fn get_updates(&self, offset: i64) -> Result<Vec<Update>> {
        let updates = self
            .client
            .get(self.method_url("getUpdates"))
            .query(&[
                ("offset", offset.to_string()),
                ("timeout", self.poll_timeout_secs.to_string()),
            ])
            .send()
            .await
            .map_err(|e| e.without_url())?
            .json::<ApiResponse<Vec<Update>>>()
            .await
            .map_err(|e| e.without_url())
            .context("Invalid getUpdates response")?
            .into_result("getUpdates")?;
        Ok(updates)
    }

    /// Start the long-polling loop
    ///
    /// Each update is processed in its own task. Runs until the task is
    /// cancelled.
    pub async fn start_polling(&self, orchestrator: Arc<Orchestrator>) -> Result<()> {
        info!("Starting Telegram long-polling loop...");
        let mut offset = 0;

        loop {
            match self.get_updates(offset).await {
                Ok(updates) => {
                    for update in updates {
                        offset = offset.max(update.update_id + 1);
                        let bot = self.clone();
                        let orchestrator = Arc::clone(&orchestrator);
                        tokio::spawn(async move {
                            bot.process_update(&orchestrator, update).await;
                        });
                    }
                }
                Err(e) => {
                    error!(
                        "Failed to fetch Telegram updates: {}",
                        scrub(&format!("{:#}", e))
                    );
                    tokio::time::sleep(Duration::from_secs(5)).await;
                }
            }
        }
    }
}
