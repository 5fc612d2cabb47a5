use async_trait::async_trait;
use std::path::Path;
use tracing::info;

use super::{AudioArtifact, SpeechSynthesizer};
use crate::error::{RecapError, Result};
use crate::narration::markers::word_count;
use crate::provider::Provider;

const SAMPLE_RATE: u32 = 44_100;
const CHANNELS: u16 = 2;
const MIN_SECONDS: f64 = 1.0;

/// Writes silence as long as the narration would roughly take to read
pub struct SilentSpeech {
    seconds_per_word: f64,
}

impl SilentSpeech {
    pub fn new(seconds_per_word: f64) -> Self {
        Self { seconds_per_word }
    }

    pub fn duration_for(&self, text: &str) -> f64 {
        (word_count(text) as f64 * self.seconds_per_word).max(MIN_SECONDS)
    }
}

fn write_silence(path: &Path, seconds: f64) -> Result<()> {
    let spec = hound::WavSpec {
        channels: CHANNELS,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let frames = (seconds * SAMPLE_RATE as f64).round() as u32;
    let mut writer = hound::WavWriter::create(path, spec)?;
    {
        let mut samples = writer.get_i16_writer(frames * CHANNELS as u32);
        for _ in 0..frames * CHANNELS as u32 {
            samples.write_sample(0i16);
        }
        samples.flush()?;
    }
    writer.finalize()?;
    Ok(())
}

#[async_trait]
impl Provider for SilentSpeech {
    fn name(&self) -> &str {
        "silent"
    }

    async fn is_available(&self) -> bool {
        true
    }
}

#[async_trait]
impl SpeechSynthesizer for SilentSpeech {
    async fn synthesize(&self, text: &str, _language: &str, output_dir: &Path) -> Result<AudioArtifact> {
        tokio::fs::create_dir_all(output_dir).await?;
        let path = output_dir.join("narration.wav");
        let seconds = self.duration_for(text);

        let target = path.clone();
        tokio::task::spawn_blocking(move || write_silence(&target, seconds))
            .await
            .map_err(|e| RecapError::Speech(format!("Silence writer failed: {}", e)))??;

        info!("Wrote {:.1}s of silence to {}", seconds, path.display());
        AudioArtifact::new(path, seconds, self.name())
    }
}
