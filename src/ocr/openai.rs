use async_trait::async_trait;
use std::path::Path;
use tracing::debug;

use super::{Extraction, TextExtractor};
use crate::error::Result;
use crate::openai::OpenAiClient;
use crate::provider::Provider;

const OCR_PROMPT: &str = "Extraia todo o texto desta imagem de mangá, incluindo diálogos e \
onomatopeias. Responda apenas com o texto extraído. Se não houver texto, responda [Página vazia].";

/// Vision models do not report a confidence
const VISION_CONFIDENCE: f32 = 0.95;

pub struct OpenAiVisionExtractor {
    client: OpenAiClient,
}

impl OpenAiVisionExtractor {
    pub fn new(client: OpenAiClient) -> Self {
        Self { client }
    }
}

fn mime_type(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        _ => "image/jpeg",
    }
}

#[async_trait]
impl Provider for OpenAiVisionExtractor {
    fn name(&self) -> &str {
        "openai"
    }

    async fn is_available(&self) -> bool {
        self.client.is_configured()
    }
}

#[async_trait]
impl TextExtractor for OpenAiVisionExtractor {
    async fn extract(&self, image_path: &Path) -> Result<Extraction> {
        let bytes = tokio::fs::read(image_path).await?;
        debug!("Sending {} ({} bytes) to vision model", image_path.display(), bytes.len());

        let text = self
            .client
            .vision(OCR_PROMPT, &bytes, mime_type(image_path))
            .await?;

        Ok(Extraction {
            text: text.trim().to_string(),
            confidence: VISION_CONFIDENCE,
        })
    }
}
