use super::{
    error_for_status, non_empty, LLMError, LLMProvider, Message, MessageRole, Transcriber,
    VisionProvider,
};
use crate::config::GeminiConfig;
use crate::secrets::SecretString;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{json, Value};
use std::time::Duration;

const TRANSCRIBE_PROMPT: &str =
    "Transcribe this audio message exactly as spoken. Return only the transcription.";

/// Google Gemini provider
///
/// Serves text generation, image description and audio transcription from
/// the same `generateContent` endpoint. Media is sent inline as base64.
pub struct GeminiProvider {
    config: GeminiConfig,
    api_key: SecretString,
    client: reqwest::Client,
}

impl GeminiProvider {
    pub fn new(config: GeminiConfig, api_key: SecretString) -> Self {
        Self {
            config,
            api_key,
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(120))
                .build()
                .unwrap_or_default(),
        }
    }

    /// POST a `generateContent` payload and concatenate the text parts of the first candidate
    async fn generate_content(&self, payload: &Value) -> super::Result<String> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.config.base_url,
            self.config.model,
            self.api_key.unsecure()
        );

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(payload)
            .send()
            .await
            // reqwest errors carry the URL, which carries the key
            .map_err(|e| LLMError::NetworkError(crate::secrets::scrub(&e.to_string())))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(error_for_status("Gemini", status, text));
        }

        let data: Value = response
            .json()
            .await
            .map_err(|e| LLMError::ParseError(e.to_string()))?;

        let candidate = data
            .get("candidates")
            .and_then(|c| c.as_array())
            .and_then(|c| c.first())
            .ok_or_else(|| LLMError::ParseError("No candidates in response".to_string()))?;

        let parts = candidate
            .get("content")
            .and_then(|c| c.get("parts"))
            .and_then(|p| p.as_array())
            .ok_or_else(|| LLMError::ParseError("No parts in candidate content".to_string()))?;

        let mut full_text = String::new();
        for part in parts {
            if let Some(text) = part.get("text").and_then(|t| t.as_str()) {
                full_text.push_str(text);
            }
        }

        non_empty(full_text)
    }

    fn inline_part(bytes: &[u8], mime_type: &str) -> Value {
        json!({
            "inline_data": {
                "mime_type": mime_type,
                "data": STANDARD.encode(bytes),
            }
        })
    }
}

#[async_trait]
impl LLMProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(&self, messages: &[Message]) -> super::Result<String> {
        let mut contents = Vec::new();
        let mut system_instruction = None;

        for msg in messages {
            if msg.role == MessageRole::System {
                system_instruction = Some(json!({
                    "parts": [{"text": msg.content}]
                }));
                continue;
            }

            contents.push(json!({
                "role": if msg.role == MessageRole::Assistant { "model" } else { "user" },
                "parts": [{"text": msg.content}]
            }));
        }

        let mut payload = serde_json::Map::new();
        payload.insert("contents".to_string(), json!(contents));

        if let Some(sys) = system_instruction {
            payload.insert("systemInstruction".to_string(), sys);
        }

        self.generate_content(&Value::Object(payload)).await
    }
}

#[async_trait]
impl Transcriber for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn transcribe(&self, audio: &[u8], mime_type: &str) -> super::Result<String> {
        let payload = json!({
            "contents": [{
                "role": "user",
                "parts": [
                    {"text": TRANSCRIBE_PROMPT},
                    Self::inline_part(audio, mime_type),
                ]
            }]
        });

        self.generate_content(&payload).await
    }
}

#[async_trait]
impl VisionProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn describe_image(
        &self,
        image: &[u8],
        mime_type: &str,
        prompt: &str,
    ) -> super::Result<String> {
        let payload = json!({
            "contents": [{
                "role": "user",
                "parts": [
                    {"text": prompt},
                    Self::inline_part(image, mime_type),
                ]
            }]
        });

        self.generate_content(&payload).await
    }
}
