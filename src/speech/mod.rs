// Speech synthesis providers
//
// Implementations, in default priority order:
// - OpenAI: hosted TTS, mp3 output
// - Espeak: local espeak-ng binary, wav output
// - Silent: silent wav sized from the word count

pub mod espeak;
pub mod openai;
pub mod silent;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

use crate::config::Config;
use crate::error::{RecapError, Result};
use crate::media::MediaProcessorTrait;
use crate::openai::OpenAiClient;
use crate::provider::{Provider, select_provider};

/// Narration audio on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioArtifact {
    pub path: PathBuf,
    pub duration_seconds: f64,
    pub provider: String,
}

impl AudioArtifact {
    pub fn new(path: PathBuf, duration_seconds: f64, provider: &str) -> Result<Self> {
        if !duration_seconds.is_finite() || duration_seconds <= 0.0 {
            return Err(RecapError::InvalidAudio(duration_seconds));
        }
        Ok(Self {
            path,
            duration_seconds,
            provider: provider.to_string(),
        })
    }
}

/// Main trait for speech synthesis
#[async_trait]
pub trait SpeechSynthesizer: Provider {
    /// Read `text` aloud into a file under `output_dir`
    async fn synthesize(&self, text: &str, language: &str, output_dir: &Path) -> Result<AudioArtifact>;
}

/// Length of a WAV file in seconds
pub fn wav_duration(path: &Path) -> Result<f64> {
    let reader = hound::WavReader::open(path)?;
    let spec = reader.spec();
    Ok(reader.duration() as f64 / spec.sample_rate as f64)
}

/// Split text into pieces of at most `max_chars` characters, preferring
/// paragraph and then word boundaries
pub fn split_into_chunks(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();

    let push_piece = |piece: &str, separator: &str, current: &mut String, chunks: &mut Vec<String>| {
        let needed = if current.is_empty() { 0 } else { separator.chars().count() };
        if current.chars().count() + needed + piece.chars().count() <= max_chars {
            if !current.is_empty() {
                current.push_str(separator);
            }
            current.push_str(piece);
            true
        } else {
            if !current.is_empty() {
                chunks.push(std::mem::take(current));
            }
            false
        }
    };

    for paragraph in text.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
        if push_piece(paragraph, "\n\n", &mut current, &mut chunks) {
            continue;
        }
        if paragraph.chars().count() <= max_chars {
            current.push_str(paragraph);
            continue;
        }

        for word in paragraph.split_whitespace() {
            if push_piece(word, " ", &mut current, &mut chunks) {
                continue;
            }
            // A single word longer than a chunk is cut by characters
            let chars: Vec<char> = word.chars().collect();
            for piece in chars.chunks(max_chars) {
                let piece: String = piece.iter().collect();
                if !push_piece(&piece, " ", &mut current, &mut chunks) {
                    current.push_str(&piece);
                }
            }
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Factory for creating speech synthesizers
pub struct SpeechFactory;

impl SpeechFactory {
    pub fn create_synthesizer(
        name: &str,
        config: &Config,
        openai: &OpenAiClient,
        media: &Arc<dyn MediaProcessorTrait>,
    ) -> Option<Box<dyn SpeechSynthesizer>> {
        match name.to_lowercase().as_str() {
            "openai" => Some(Box::new(openai::OpenAiSpeech::new(
                openai.clone(),
                media.clone(),
                config.speech.chunk_chars,
            ))),
            "espeak" => Some(Box::new(espeak::EspeakSpeech::new(&config.speech.espeak_binary))),
            "silent" => Some(Box::new(silent::SilentSpeech::new(
                config.speech.silent_seconds_per_word,
            ))),
            _ => None,
        }
    }

    pub fn candidates(
        config: &Config,
        openai: &OpenAiClient,
        media: &Arc<dyn MediaProcessorTrait>,
    ) -> Vec<Box<dyn SpeechSynthesizer>> {
        config
            .speech
            .providers
            .iter()
            .filter_map(|name| {
                let synthesizer = Self::create_synthesizer(name, config, openai, media);
                if synthesizer.is_none() {
                    warn!("Unknown speech provider '{}' in configuration", name);
                }
                synthesizer
            })
            .collect()
    }

    pub async fn create_default(
        config: &Config,
        openai: &OpenAiClient,
        media: &Arc<dyn MediaProcessorTrait>,
    ) -> Result<Arc<dyn SpeechSynthesizer>> {
        let selected = select_provider("speech", Self::candidates(config, openai, media)).await?;
        Ok(Arc::from(selected))
    }
}
