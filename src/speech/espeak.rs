use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;
use tracing::{debug, info};

use super::{AudioArtifact, SpeechSynthesizer, wav_duration};
use crate::error::{RecapError, Result};
use crate::provider::Provider;

/// Offline TTS through espeak-ng
pub struct EspeakSpeech {
    binary_path: String,
}

impl EspeakSpeech {
    pub fn new(binary_path: &str) -> Self {
        Self {
            binary_path: binary_path.to_string(),
        }
    }
}

#[async_trait]
impl Provider for EspeakSpeech {
    fn name(&self) -> &str {
        "espeak"
    }

    async fn is_available(&self) -> bool {
        Command::new(&self.binary_path)
            .arg("--version")
            .output()
            .await
            .map(|output| output.status.success())
            .unwrap_or(false)
    }
}

#[async_trait]
impl SpeechSynthesizer for EspeakSpeech {
    async fn synthesize(&self, text: &str, language: &str, output_dir: &Path) -> Result<AudioArtifact> {
        tokio::fs::create_dir_all(output_dir).await?;
        let text_path = output_dir.join("narration.txt");
        let wav_path = output_dir.join("narration.wav");
        tokio::fs::write(&text_path, text).await?;

        debug!("Running {} with voice {}", self.binary_path, language);
        let output = Command::new(&self.binary_path)
            .arg("-v")
            .arg(language)
            .arg("-w")
            .arg(&wav_path)
            .arg("-f")
            .arg(&text_path)
            .output()
            .await
            .map_err(|e| RecapError::Speech(format!("Failed to execute espeak-ng: {}", e)))?;

        let _ = tokio::fs::remove_file(&text_path).await;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RecapError::Speech(format!("espeak-ng failed: {}", stderr.trim())));
        }

        let duration = wav_duration(&wav_path)?;
        info!("Synthesized {:.1}s of narration with espeak-ng", duration);
        AudioArtifact::new(wav_path, duration, self.name())
    }
}
