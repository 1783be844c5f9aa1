//! Mock collaborators shared by the integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use sdk::types::Sender;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use wizzy_engine::config::Config;
use wizzy_engine::document::DefaultExtractor;
use wizzy_engine::llm::{
    Collaborators, LLMError, LLMProvider, Message, Result, SpeechSynthesizer, Transcriber,
    VisionProvider,
};
use wizzy_engine::orchestrator::Orchestrator;
use wizzy_engine::session::SessionStore;

/// Generator that records every prompt and answers "reply to: <last message>"
#[derive(Default)]
pub struct MockGenerator {
    prompts: Mutex<Vec<Vec<Message>>>,
    fail: AtomicBool,
    panic: AtomicBool,
    delay: Option<Duration>,
}

impl MockGenerator {
    pub fn failing() -> Self {
        let generator = Self::default();
        generator.set_failing(true);
        generator
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn set_panicking(&self, panic: bool) {
        self.panic.store(panic, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn last_prompt(&self) -> Vec<Message> {
        self.prompts.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl LLMProvider for MockGenerator {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate(&self, messages: &[Message]) -> Result<String> {
        self.prompts.lock().unwrap().push(messages.to_vec());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.panic.load(Ordering::SeqCst) {
            panic!("generator crashed");
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(LLMError::ProviderUnavailable("mock outage".into()));
        }

        let last = messages.last().map(|m| m.content.as_str()).unwrap_or_default();
        Ok(format!("reply to: {}", last))
    }
}

/// Transcriber returning a fixed transcript, or failing when it has none
pub struct MockTranscriber(pub Option<String>);

#[async_trait]
impl Transcriber for MockTranscriber {
    fn name(&self) -> &str {
        "mock"
    }

    async fn transcribe(&self, _audio: &[u8], _mime_type: &str) -> Result<String> {
        self.0
            .clone()
            .ok_or_else(|| LLMError::NetworkError("connection reset".into()))
    }
}

/// Vision provider returning a fixed description, or failing when it has none
pub struct MockVision(pub Option<String>);

#[async_trait]
impl VisionProvider for MockVision {
    fn name(&self) -> &str {
        "mock"
    }

    async fn describe_image(&self, _image: &[u8], _mime_type: &str, _prompt: &str) -> Result<String> {
        self.0.clone().ok_or(LLMError::EmptyResponse)
    }
}

#[derive(Default)]
pub struct MockSynthesizer {
    pub fail: bool,
    pub calls: AtomicUsize,
}

#[async_trait]
impl SpeechSynthesizer for MockSynthesizer {
    fn name(&self) -> &str {
        "mock"
    }

    async fn synthesize(&self, _text: &str) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(LLMError::RateLimitExceeded);
        }
        Ok(b"ID3-mp3-bytes".to_vec())
    }
}

pub struct Mocks {
    pub generator: MockGenerator,
    pub transcript: Option<String>,
    pub description: Option<String>,
    pub synthesizer: MockSynthesizer,
}

impl Default for Mocks {
    fn default() -> Self {
        Self {
            generator: MockGenerator::default(),
            transcript: Some("what time is it".into()),
            description: Some("a red bicycle".into()),
            synthesizer: MockSynthesizer::default(),
        }
    }
}

pub struct Harness {
    pub orchestrator: Arc<Orchestrator>,
    pub store: Arc<SessionStore>,
    pub generator: Arc<MockGenerator>,
    pub synthesizer: Arc<MockSynthesizer>,
}

pub fn harness(config: &Config, mocks: Mocks) -> Harness {
    harness_with_store(config, mocks, Arc::new(SessionStore::in_memory()))
}

pub fn harness_with_store(config: &Config, mocks: Mocks, store: Arc<SessionStore>) -> Harness {
    let generator = Arc::new(mocks.generator);
    let synthesizer = Arc::new(mocks.synthesizer);

    let collaborators = Collaborators {
        generator: Arc::clone(&generator) as Arc<dyn LLMProvider>,
        transcriber: Arc::new(MockTranscriber(mocks.transcript)),
        vision: Arc::new(MockVision(mocks.description)),
        synthesizer: Some(Arc::clone(&synthesizer) as Arc<dyn SpeechSynthesizer>),
    };

    let orchestrator = Arc::new(Orchestrator::new(
        config,
        Arc::clone(&store),
        collaborators,
        Arc::new(DefaultExtractor::new(config.documents.max_extracted_chars)),
    ));

    Harness {
        orchestrator,
        store,
        generator,
        synthesizer,
    }
}

pub fn sender() -> Sender {
    Sender::new("7", Some("Ada".into()))
}
