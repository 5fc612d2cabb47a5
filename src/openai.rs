//! Minimal OpenAI REST client shared by the vision OCR, narration and TTS
//! providers.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::OpenAiConfig;
use crate::error::{Result, RecapError};

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("manga-recap/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &OpenAiConfig {
        &self.config
    }

    /// An API key is the only precondition for the hosted endpoints
    pub fn is_configured(&self) -> bool {
        !self.config.api_key.trim().is_empty()
    }

    /// Single-turn chat completion, returns the assistant message text
    pub async fn chat(&self, system: &str, user: &str) -> Result<String> {
        let body = json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
        });

        let response = self.post_json("chat/completions", &body).await?;
        let parsed: ChatResponse = response.json().await?;
        first_message(parsed)
    }

    /// Ask the vision model about an image passed inline as a data URI
    pub async fn vision(&self, prompt: &str, image: &[u8], mime: &str) -> Result<String> {
        let data_uri = format!("data:{};base64,{}", mime, STANDARD.encode(image));
        let body = json!({
            "model": self.config.vision_model,
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "text", "text": prompt },
                    { "type": "image_url", "image_url": { "url": data_uri, "detail": "high" } },
                ],
            }],
        });

        let response = self.post_json("chat/completions", &body).await?;
        let parsed: ChatResponse = response.json().await?;
        first_message(parsed)
    }

    /// Text to speech, returns the encoded mp3 bytes
    pub async fn speech(&self, input: &str) -> Result<Vec<u8>> {
        let body = json!({
            "model": self.config.tts_model,
            "voice": self.config.tts_voice,
            "input": input,
            "response_format": "mp3",
        });

        let response = self.post_json("audio/speech", &body).await?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn post_json(&self, path: &str, body: &Value) -> Result<reqwest::Response> {
        let url = endpoint(&self.config.base_url, path);
        let mut attempt = 0;

        loop {
            debug!("POST {} (attempt {})", url, attempt + 1);
            let response = self
                .client
                .post(&url)
                .bearer_auth(&self.config.api_key)
                .json(body)
                .send()
                .await?;

            let status = response.status();
            if status.is_success() {
                return Ok(response);
            }

            if is_retryable(status) && attempt < self.config.max_retries {
                let delay = Duration::from_secs(1 << attempt.min(5));
                warn!("OpenAI returned {}, retrying in {}s", status, delay.as_secs());
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }

            let raw = response.text().await.unwrap_or_default();
            let message = parse_error_message(&raw).unwrap_or(raw);
            return Err(RecapError::Api(format!("OpenAI API error ({}): {}", status, message)));
        }
    }
}

fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path)
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn parse_error_message(raw_json: &str) -> Option<String> {
    let value: Value = serde_json::from_str(raw_json).ok()?;
    let message = value.get("error")?.get("message")?.as_str()?.to_owned();
    Some(message)
}

fn first_message(response: ChatResponse) -> Result<String> {
    let text = response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(RecapError::Api("OpenAI returned an empty message".to_string()));
    }
    Ok(text)
}
