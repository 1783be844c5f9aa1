//! Groq provider
//!
//! Speech synthesis through `/audio/speech` and Whisper transcription through
//! `/audio/transcriptions`, both on Groq's OpenAI-compatible API.

use super::{error_for_status, non_empty, LLMError, SpeechSynthesizer, Transcriber};
use crate::config::GroqConfig;
use crate::secrets::SecretString;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde_json::json;
use std::time::Duration;
use tracing::debug;

pub struct GroqProvider {
    config: GroqConfig,
    api_key: SecretString,
    client: reqwest::Client,
}

impl GroqProvider {
    pub fn new(config: GroqConfig, api_key: SecretString) -> Self {
        Self {
            config,
            api_key,
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(120))
                .build()
                .unwrap_or_default(),
        }
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.api_key.unsecure())
    }
}

/// File name Whisper uses to infer the container format
fn audio_file_name(mime_type: &str) -> &'static str {
    match mime_type {
        "audio/mpeg" | "audio/mp3" => "audio.mp3",
        "audio/wav" | "audio/x-wav" => "audio.wav",
        "audio/mp4" | "audio/m4a" | "audio/x-m4a" => "audio.m4a",
        "audio/webm" => "audio.webm",
        _ => "audio.ogg",
    }
}

#[async_trait]
impl SpeechSynthesizer for GroqProvider {
    fn name(&self) -> &str {
        "groq"
    }

    async fn synthesize(&self, text: &str) -> super::Result<Vec<u8>> {
        let url = format!("{}/audio/speech", self.config.base_url);

        let payload = json!({
            "model": self.config.tts_model,
            "voice": self.config.voice,
            "input": text,
            "response_format": "mp3",
        });

        let response = self
            .client
            .post(&url)
            .header("Authorization", self.bearer())
            .json(&payload)
            .send()
            .await
            .map_err(|e| LLMError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(error_for_status("Groq", status, body));
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| LLMError::NetworkError(e.to_string()))?;

        if audio.is_empty() {
            return Err(LLMError::EmptyResponse);
        }

        debug!(bytes = audio.len(), "speech synthesized");
        Ok(audio.to_vec())
    }
}

#[async_trait]
impl Transcriber for GroqProvider {
    fn name(&self) -> &str {
        "groq"
    }

    async fn transcribe(&self, audio: &[u8], mime_type: &str) -> super::Result<String> {
        let url = format!("{}/audio/transcriptions", self.config.base_url);

        let file_part = Part::bytes(audio.to_vec())
            .file_name(audio_file_name(mime_type))
            .mime_str(mime_type)
            .map_err(|e| LLMError::InvalidRequest(e.to_string()))?;

        let form = Form::new()
            .part("file", file_part)
            .text("model", self.config.whisper_model.clone())
            .text("response_format", "json");

        let response = self
            .client
            .post(&url)
            .header("Authorization", self.bearer())
            .multipart(form)
            .send()
            .await
            .map_err(|e| LLMError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(error_for_status("Groq", status, body));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LLMError::ParseError(e.to_string()))?;

        let text = json["text"].as_str().unwrap_or_default().to_string();
        debug!(text_len = text.len(), "transcription complete");

        non_empty(text)
    }
}
