use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::error::{Result, RecapError};

/// Default narration prompt; asks the model for the pacing markers the
/// timing allocator depends on.
const DEFAULT_PROMPT: &str = "Resuma o seguinte texto de forma narrativa. Utilize '[PAUSA]' para \
indicar pausas e sugira imagens no formato [IMAGEM: descricao].";

const DEFAULT_SYSTEM_PROMPT: &str =
    "Você é um roteirista especializado em adaptar mangás para vídeos narrados.";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub pipeline: PipelineConfig,
    pub ocr: OcrConfig,
    pub narration: NarrationConfig,
    pub speech: SpeechConfig,
    pub video: VideoConfig,
    pub openai: OpenAiConfig,
    pub ollama: OllamaConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Working directory for stage artifacts, checkpoint and logs
    pub temp_dir: PathBuf,
    /// Narration language (ISO 639-1)
    pub language: String,
    /// Maximum number of chapters processed concurrently during OCR
    pub max_workers: usize,
    /// Draw progress bars on the terminal
    pub show_progress: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Provider priority; the first available one is used
    pub providers: Vec<String>,
    /// Path to tesseract binary
    pub tesseract_binary: String,
    /// Tesseract language packs (e.g. "por+eng+jpn")
    pub tesseract_languages: String,
    /// Run grayscale/contrast enhancement before OCR
    pub enhance: bool,
    /// Binarize the enhanced image
    pub binarize: bool,
    /// Longest edge of the enhanced image in pixels
    pub max_image_size: u32,
    /// Cache OCR results on disk
    pub cache_enabled: bool,
    /// Cache entry lifetime in seconds (0 = never expires)
    pub cache_ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NarrationConfig {
    /// Provider priority; the first available one is used
    pub providers: Vec<String>,
    /// Instruction prepended to the chapter text
    pub prompt: String,
    /// System prompt for chat models
    pub system_prompt: String,
    /// Source text beyond this many characters is truncated per chapter
    pub max_source_chars: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// Provider priority; the first available one is used
    pub providers: Vec<String>,
    /// Path to espeak-ng binary
    pub espeak_binary: String,
    /// Seconds of silence per word for the silent stand-in
    pub silent_seconds_per_word: f64,
    /// Maximum characters per TTS request
    pub chunk_chars: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    /// Path to ffmpeg binary
    pub ffmpeg_binary: String,
    /// Path to ffprobe binary
    pub ffprobe_binary: String,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Fixed seconds per image; advisory, scaled down if it overruns the audio
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_duration: Option<f64>,
    /// Additional encoding options for clip rendering
    /// Common options: ["-preset", "medium", "-crf", "23"]
    pub encoding_options: Vec<String>,
    /// Keep per-image clips after a successful render
    pub keep_clips: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    /// Never written to disk; read from OPENAI_API_KEY
    #[serde(skip_serializing)]
    pub api_key: String,
    pub base_url: String,
    /// Chat model for narration
    pub model: String,
    /// Vision model for OCR
    pub vision_model: String,
    pub tts_model: String,
    pub tts_voice: String,
    pub timeout_secs: u64,
    /// Retries on 429/5xx responses
    pub max_retries: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    /// Ollama endpoint URL
    pub endpoint: String,
    /// LLM model to use for narration
    pub model: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            temp_dir: PathBuf::from("temp"),
            language: "pt".to_string(),
            max_workers: 3,
            show_progress: true,
        }
    }
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            providers: vec!["openai".to_string(), "tesseract".to_string(), "silent".to_string()],
            tesseract_binary: "tesseract".to_string(),
            tesseract_languages: "por+eng+jpn".to_string(),
            enhance: true,
            binarize: false,
            max_image_size: 2048,
            cache_enabled: true,
            cache_ttl_secs: 3600,
        }
    }
}

impl Default for NarrationConfig {
    fn default() -> Self {
        Self {
            providers: vec!["openai".to_string(), "ollama".to_string(), "passthrough".to_string()],
            prompt: DEFAULT_PROMPT.to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_source_chars: 12_000,
        }
    }
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            providers: vec!["openai".to_string(), "espeak".to_string(), "silent".to_string()],
            espeak_binary: "espeak-ng".to_string(),
            silent_seconds_per_word: 0.3,
            chunk_chars: 4000,
        }
    }
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            ffmpeg_binary: "ffmpeg".to_string(),
            ffprobe_binary: "ffprobe".to_string(),
            width: 1280,
            height: 720,
            fps: 30,
            image_duration: None,
            encoding_options: vec![
                // "-preset".to_string(), "medium".to_string(),
                // "-crf".to_string(), "23".to_string(),
            ],
            keep_clips: false,
        }
    }
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            vision_model: "gpt-4o-mini".to_string(),
            tts_model: "tts-1".to_string(),
            tts_voice: "alloy".to_string(),
            timeout_secs: 120,
            max_retries: 2,
        }
    }
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434".to_string(),
            model: "llama3.2:3b".to_string(),
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| RecapError::Config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| RecapError::Config(format!("Failed to parse config file: {}", e)))
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| RecapError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| RecapError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Override settings from the process environment
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty("OPENAI_API_KEY") {
            self.openai.api_key = key;
        }
        if let Some(model) = non_empty("OPENAI_MODEL") {
            self.openai.model = model;
        }
        if let Some(model) = non_empty("OPENAI_VISION_MODEL") {
            self.openai.vision_model = model;
        }
        if let Some(model) = non_empty("OPENAI_TTS_MODEL") {
            self.openai.tts_model = model;
        }
        if let Some(voice) = non_empty("OPENAI_TTS_VOICE") {
            self.openai.tts_voice = voice;
        }
        if let Some(lang) = non_empty("MMR_LANG") {
            self.pipeline.language = lang;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.video.width == 0 || self.video.height == 0 {
            return Err(RecapError::Config("Video width and height must be positive".to_string()));
        }
        // libx264 with yuv420p rejects odd dimensions
        if self.video.width % 2 != 0 || self.video.height % 2 != 0 {
            return Err(RecapError::Config(format!(
                "Video dimensions must be even, got {}x{}",
                self.video.width, self.video.height
            )));
        }
        if self.video.fps == 0 {
            return Err(RecapError::Config("Video fps must be positive".to_string()));
        }
        if let Some(duration) = self.video.image_duration {
            if !(duration.is_finite() && duration > 0.0) {
                return Err(RecapError::Config(format!(
                    "Image duration must be positive, got {}",
                    duration
                )));
            }
        }
        if self.pipeline.max_workers == 0 {
            return Err(RecapError::Config("pipeline.max_workers must be at least 1".to_string()));
        }
        if self.speech.chunk_chars == 0 {
            return Err(RecapError::Config("speech.chunk_chars must be at least 1".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [video]
            width = 1920
            height = 1080
            "#,
        )
        .unwrap();

        assert_eq!(config.video.width, 1920);
        assert_eq!(config.video.fps, 30);
        assert_eq!(config.pipeline.language, "pt");
        assert_eq!(config.ocr.providers, vec!["openai", "tesseract", "silent"]);
    }

    #[test]
    fn test_api_key_is_not_saved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manga-recap.toml");

        let mut config = Config::default();
        config.openai.api_key = "sk-secret".to_string();
        config.save_to_file(&path).unwrap();

        let saved = std::fs::read_to_string(&path).unwrap();
        assert!(!saved.contains("sk-secret"));

        let loaded = Config::from_file(&path).unwrap();
        assert!(loaded.openai.api_key.is_empty());
        assert_eq!(loaded.video.height, 720);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_env_from(|key| match key {
            "OPENAI_API_KEY" => Some("sk-test".to_string()),
            "MMR_LANG" => Some("en".to_string()),
            "OPENAI_TTS_VOICE" => Some("   ".to_string()),
            _ => None,
        });

        assert_eq!(config.openai.api_key, "sk-test");
        assert_eq!(config.pipeline.language, "en");
        assert_eq!(config.openai.tts_voice, "alloy");
    }

    #[test]
    fn test_validate_rejects_odd_dimensions() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.video.width = 1281;
        assert!(matches!(config.validate(), Err(RecapError::Config(_))));

        config.video.width = 1280;
        config.video.image_duration = Some(0.0);
        assert!(config.validate().is_err());
    }
}
