use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use super::{AudioArtifact, SpeechSynthesizer, split_into_chunks};
use crate::error::{RecapError, Result};
use crate::media::MediaProcessorTrait;
use crate::openai::OpenAiClient;
use crate::provider::Provider;

/// Hosted TTS; long scripts are sent in chunks and the mp3 streams appended
pub struct OpenAiSpeech {
    client: OpenAiClient,
    media: Arc<dyn MediaProcessorTrait>,
    chunk_chars: usize,
}

impl OpenAiSpeech {
    pub fn new(client: OpenAiClient, media: Arc<dyn MediaProcessorTrait>, chunk_chars: usize) -> Self {
        Self {
            client,
            media,
            chunk_chars,
        }
    }
}

#[async_trait]
impl Provider for OpenAiSpeech {
    fn name(&self) -> &str {
        "openai"
    }

    async fn is_available(&self) -> bool {
        self.client.is_configured()
    }
}

#[async_trait]
impl SpeechSynthesizer for OpenAiSpeech {
    async fn synthesize(&self, text: &str, language: &str, output_dir: &Path) -> Result<AudioArtifact> {
        let chunks = split_into_chunks(text, self.chunk_chars);
        if chunks.is_empty() {
            return Err(RecapError::Speech("Nothing to synthesize".to_string()));
        }

        tokio::fs::create_dir_all(output_dir).await?;
        let path = output_dir.join("narration.mp3");
        let mut file = tokio::fs::File::create(&path).await?;

        info!(
            "Synthesizing narration ({} chunks, voice {}, language {})",
            chunks.len(),
            self.client.config().tts_voice,
            language
        );
        for (index, chunk) in chunks.iter().enumerate() {
            debug!("TTS chunk {}/{} ({} chars)", index + 1, chunks.len(), chunk.chars().count());
            let audio = self.client.speech(chunk).await?;
            file.write_all(&audio).await?;
        }
        file.sync_all().await?;
        drop(file);

        let duration = self.media.probe_duration(&path).await?;
        AudioArtifact::new(path, duration, self.name())
    }
}
