// Media processing over ffmpeg
//
// - Commands: ffmpeg/ffprobe command builders
// - Processor: the ffmpeg-backed MediaProcessorTrait implementation
// - Composer: turns a timing plan plus narration audio into the final video

pub mod commands;
pub mod composer;
pub mod processor;

use async_trait::async_trait;
use std::path::Path;

pub use commands::*;
pub use composer::{ComposeReport, CropRect, Reconciliation, VideoComposer};
pub use processor::*;

use crate::config::VideoConfig;
use crate::error::Result;

/// Main trait for media processing operations
#[async_trait]
pub trait MediaProcessorTrait: Send + Sync {
    /// Render a still image as a clip of exactly `frames` frames
    async fn render_image_clip(
        &self,
        image_path: &Path,
        crop: CropRect,
        frames: u64,
        output_path: &Path,
    ) -> Result<()>;

    /// Render a black clip of exactly `frames` frames
    async fn render_blank_clip(&self, frames: u64, output_path: &Path) -> Result<()>;

    /// Join clips listed in a concat demuxer file
    async fn concat_clips(&self, list_file: &Path, output_path: &Path) -> Result<()>;

    /// Combine video and narration, optionally cutting at `trim_to` seconds
    async fn mux_audio(
        &self,
        video_path: &Path,
        audio_path: &Path,
        output_path: &Path,
        trim_to: Option<f64>,
    ) -> Result<()>;

    /// Duration of a media file in seconds
    async fn probe_duration(&self, media_path: &Path) -> Result<f64>;

    /// Check if media processor is available
    fn check_availability(&self) -> Result<()>;

    /// Get media processor version information
    async fn get_version_info(&self) -> Result<String>;
}

/// Factory for creating media processor instances
pub struct MediaProcessorFactory;

impl MediaProcessorFactory {
    /// Create the default media processor implementation (FFmpeg-based)
    pub fn create_processor(config: VideoConfig) -> Box<dyn MediaProcessorTrait> {
        Box::new(processor::MediaProcessorImpl::new(config))
    }
}
