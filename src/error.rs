use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RecapError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("Image decoding error: {0}")]
    Image(#[from] image::ImageError),

    #[error("API error: {0}")]
    Api(String),

    #[error("OCR error: {0}")]
    Ocr(String),

    #[error("Narration error: {0}")]
    Narration(String),

    #[error("Speech synthesis error: {0}")]
    Speech(String),

    #[error("Media processing error: {0}")]
    Media(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("No chapter directories found in {}", .0.display())]
    NoChapters(PathBuf),

    #[error("No content images: no page with extracted text is available for the video")]
    NoContentImages,

    #[error("Invalid audio: duration must be positive, got {0}s")]
    InvalidAudio(f64),

    #[error("No available provider for {0}")]
    ProviderUnavailable(String),
}

pub type Result<T> = std::result::Result<T, RecapError>;
