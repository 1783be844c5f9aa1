//! Response Orchestrator
//!
//! Drives one inbound event to exactly one reply:
//!
//! 1. Classify the event (unsupported kinds are rejected)
//! 2. Resolve and touch the session, taking the per-conversation lock
//! 3. Normalize the payload: transcribe voice, describe images, attach documents
//! 4. Build the prompt from directive, document excerpt, memory window and input
//! 5. Generate the answer
//! 6. Append the user and assistant turns, then persist
//! 7. Synthesize speech for voice input, falling back to text
//!
//! The orchestrator keeps no state between events; everything lives in the
//! session.

use crate::classifier::{classify, ClassifiedInput};
use crate::config::{Config, PersonaConfig};
use crate::document::{DocumentContextManager, TextExtractor, Upload};
use crate::llm::Collaborators;
use crate::memory::MemoryManager;
use crate::secrets::scrub;
use crate::session::{Modality, Session, SessionGuard, SessionSnapshot, SessionStore, Turn};
use chrono::Utc;
use sdk::errors::{BotError, BotErrorExt};
use sdk::types::{InboundEvent, Reply};
use std::sync::Arc;
use tracing::{debug, info, info_span, warn, Instrument};

pub mod commands;
pub mod prompt;

use commands::Command;

/// Turns inbound events into replies
pub struct Orchestrator {
    store: Arc<SessionStore>,
    memory: MemoryManager,
    documents: DocumentContextManager,
    collaborators: Collaborators,
    persona: PersonaConfig,
    summarize_uploads: bool,
}

impl Orchestrator {
    pub fn new(
        config: &Config,
        store: Arc<SessionStore>,
        collaborators: Collaborators,
        extractor: Arc<dyn TextExtractor>,
    ) -> Self {
        Self {
            store,
            memory: MemoryManager::new(config.memory.max_turns),
            documents: DocumentContextManager::new(&config.documents, extractor),
            collaborators,
            persona: config.persona.clone(),
            summarize_uploads: config.documents.summarize_uploads,
        }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Largest accepted document upload in bytes
    pub fn max_file_bytes(&self) -> usize {
        self.documents.max_file_bytes()
    }

    /// Handle one event; always yields exactly one reply
    pub async fn handle(&self, event: InboundEvent) -> Reply {
        let span = info_span!(
            "event",
            conversation_id = %event.conversation_id,
            content_type = %event.content_type
        );

        async move {
            match self.process(event).await {
                Ok(reply) => reply,
                Err(e) => {
                    if e.is_recoverable() {
                        warn!("Event failed: {}", e);
                    } else {
                        info!("Event rejected: {}", e);
                    }
                    Reply::text(e.user_hint())
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn process(&self, event: InboundEvent) -> Result<Reply, BotError> {
        let InboundEvent {
            conversation_id,
            sender,
            content_type,
            body,
        } = event;
        let user_name = sender.display_name().to_string();

        let input = classify(&content_type, body)?;
        let modality = input.modality();
        debug!(%modality, "classified event");

        if let ClassifiedInput::Text(text) = &input {
            if let Some(command) = Command::parse(text) {
                return self.run_command(&conversation_id, &user_name, command).await;
            }
        }

        let mut session = self.store.get_or_create(&conversation_id).await?;
        session.touch();
        let before = session.snapshot();

        let normalized = match input {
            ClassifiedInput::Text(text) => text,
            ClassifiedInput::Voice { audio, mime_type } => self
                .collaborators
                .transcriber
                .transcribe(&audio, &mime_type)
                .await
                .map_err(|e| BotError::TranscriptionFailed(scrub(&e.to_string())))?,
            ClassifiedInput::Image {
                image,
                mime_type,
                caption,
            } => {
                let caption = caption
                    .filter(|c| !c.trim().is_empty())
                    .unwrap_or_else(|| prompt::DEFAULT_IMAGE_CAPTION.to_string());
                let description = self
                    .collaborators
                    .vision
                    .describe_image(&image, &mime_type, &caption)
                    .await
                    .map_err(|e| BotError::VisionFailed(scrub(&e.to_string())))?;
                prompt::image_input(&description, &caption)
            }
            ClassifiedInput::Document(upload) => return self.upload(session, before, upload).await,
        };

        let system = self.system_prompt(&session, &user_name, &normalized);
        let messages =
            prompt::build_prompt(system, self.memory.window_for(&session), &normalized);
        let generated = self.collaborators.generator.generate(&messages).await;

        // The user spoke whether or not generation succeeds
        self.memory
            .append(&mut session, Turn::user(normalized, modality));

        let answer = match generated {
            Ok(answer) => answer,
            Err(e) => {
                if let Err(store_err) = session.persist().await {
                    warn!("Failed to persist user turn: {}", store_err);
                }
                return Err(BotError::GenerationFailed(scrub(&e.to_string())));
            }
        };

        self.memory
            .append(&mut session, Turn::assistant(answer.clone(), modality));
        // Both turns are undone if they cannot be stored
        session.persist_or_rollback(before).await?;
        info!(turns = session.history().len(), "turn committed");

        if modality == Modality::Voice {
            if let Some(synthesizer) = &self.collaborators.synthesizer {
                match synthesizer.synthesize(&answer).await {
                    Ok(audio) => return Ok(Reply::Audio { audio, text: answer }),
                    Err(e) => warn!(
                        "Replying with text instead: {}",
                        BotError::SynthesisFailed(scrub(&e.to_string()))
                    ),
                }
            }
        }

        Ok(Reply::Text(answer))
    }

    fn system_prompt(&self, session: &Session, user_name: &str, input: &str) -> String {
        let mut system = prompt::render_directive(&self.persona, user_name, Utc::now());
        if let (Some(document), Some(excerpt)) =
            (session.document(), self.documents.query(session, input))
        {
            system.push_str(&prompt::document_section(document, excerpt));
        }
        system
    }

    /// Attach a document and confirm; upload-only events make no turns
    async fn upload(
        &self,
        mut session: SessionGuard,
        before: SessionSnapshot,
        upload: Upload,
    ) -> Result<Reply, BotError> {
        let document = self.documents.attach(&mut session, upload).await?.clone();

        if self.summarize_uploads {
            let summary = match self
                .collaborators
                .generator
                .generate(&prompt::summary_request(&document.extracted_text))
                .await
            {
                Ok(summary) => summary.trim().to_string(),
                Err(e) => {
                    warn!("Document summary failed: {}", scrub(&e.to_string()));
                    prompt::fallback_summary(&document)
                }
            };
            self.documents.set_summary(&mut session, summary);
        }

        session.persist_or_rollback(before).await?;

        Ok(Reply::Text(match session.document() {
            Some(document) => prompt::upload_confirmation(document),
            None => prompt::upload_confirmation(&document),
        }))
    }

    async fn run_command(
        &self,
        conversation_id: &str,
        user_name: &str,
        command: Command,
    ) -> Result<Reply, BotError> {
        debug!(?command, "running command");

        let reply = match command {
            Command::Start => commands::greeting(&self.persona.name, user_name),
            Command::Help => commands::help(&self.persona.name),
            Command::Reset => {
                let mut session = self.store.get_or_create(conversation_id).await?;
                let before = session.snapshot();
                session.reset();
                session.touch();
                session.persist_or_rollback(before).await?;
                commands::RESET_REPLY.to_string()
            }
            Command::Forget => {
                let mut session = self.store.get_or_create(conversation_id).await?;
                session.touch();
                let before = session.snapshot();
                if session.clear_document().is_some() {
                    session.persist_or_rollback(before).await?;
                    commands::FORGET_REPLY.to_string()
                } else {
                    commands::NO_DOCUMENT_REPLY.to_string()
                }
            }
            Command::Unknown(name) => commands::unknown(&name),
        };

        Ok(Reply::Text(reply))
    }
}
