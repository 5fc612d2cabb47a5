use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info};

use super::{ChapterSource, ScriptGenerator, build_prompt};
use crate::config::{NarrationConfig, OllamaConfig};
use crate::error::{RecapError, Result};
use crate::provider::Provider;

/// Ollama response wrapper
#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
}

/// Narration from a local Ollama model
pub struct OllamaScriptGenerator {
    client: Client,
    ollama: OllamaConfig,
    narration: NarrationConfig,
}

impl OllamaScriptGenerator {
    pub fn new(ollama: OllamaConfig, narration: NarrationConfig) -> Self {
        Self {
            client: Client::new(),
            ollama,
            narration,
        }
    }
}

#[async_trait]
impl Provider for OllamaScriptGenerator {
    fn name(&self) -> &str {
        "ollama"
    }

    /// The model must already be pulled
    async fn is_available(&self) -> bool {
        let url = format!("{}/api/show", self.ollama.endpoint.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .timeout(Duration::from_secs(5))
            .json(&json!({ "name": self.ollama.model }))
            .send()
            .await;

        match response {
            Ok(response) if response.status().is_success() => {
                info!("Ollama model '{}' is available", self.ollama.model);
                true
            }
            Ok(response) => {
                debug!(
                    "Ollama model '{}' not found ({}), pull it first: ollama pull {}",
                    self.ollama.model,
                    response.status(),
                    self.ollama.model
                );
                false
            }
            Err(e) => {
                debug!("Failed to connect to Ollama: {}", e);
                false
            }
        }
    }
}

#[async_trait]
impl ScriptGenerator for OllamaScriptGenerator {
    async fn generate(&self, chapter: &ChapterSource, language: &str) -> Result<String> {
        let prompt = format!(
            "{}\n\n{}",
            self.narration.system_prompt,
            build_prompt(&self.narration.prompt, chapter, language, self.narration.max_source_chars)
        );

        debug!("Requesting narration for {} from Ollama", chapter.chapter_name);
        let response = self
            .client
            .post(format!("{}/api/generate", self.ollama.endpoint.trim_end_matches('/')))
            .json(&json!({
                "model": self.ollama.model,
                "prompt": prompt,
                "stream": false,
            }))
            .send()
            .await
            .map_err(|e| RecapError::Narration(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(RecapError::Narration(format!(
                "Ollama request failed {}: {}",
                status, error_text
            )));
        }

        let parsed: OllamaResponse = response
            .json()
            .await
            .map_err(|e| RecapError::Narration(format!("Failed to read response: {}", e)))?;

        Ok(parsed.response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_endpoint_is_unavailable() {
        let ollama = OllamaConfig {
            endpoint: "http://127.0.0.1:9".to_string(),
            model: "llama3.2:3b".to_string(),
        };
        let generator = OllamaScriptGenerator::new(ollama, NarrationConfig::default());
        assert!(!generator.is_available().await);
    }
}
