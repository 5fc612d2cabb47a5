use async_trait::async_trait;
use std::path::Path;
use std::process::Command;
use tracing::{debug, info};

use super::composer::CropRect;
use super::{FrameFormat, MediaCommandBuilder, MediaProcessorTrait, parse_probe_duration};
use crate::config::VideoConfig;
use crate::error::{RecapError, Result};

/// Concrete implementation of media processor (FFmpeg-based)
pub struct MediaProcessorImpl {
    config: VideoConfig,
    command_builder: MediaCommandBuilder,
}

impl MediaProcessorImpl {
    /// Create a new media processor implementation
    pub fn new(config: VideoConfig) -> Self {
        let command_builder = MediaCommandBuilder::new(&config.ffmpeg_binary, &config.ffprobe_binary);

        Self {
            config,
            command_builder,
        }
    }

    fn format(&self) -> FrameFormat {
        FrameFormat {
            width: self.config.width,
            height: self.config.height,
            fps: self.config.fps,
        }
    }
}

#[async_trait]
impl MediaProcessorTrait for MediaProcessorImpl {
    async fn render_image_clip(
        &self,
        image_path: &Path,
        crop: CropRect,
        frames: u64,
        output_path: &Path,
    ) -> Result<()> {
        debug!(
            "Rendering {} ({} frames) -> {}",
            image_path.display(),
            frames,
            output_path.display()
        );

        let command = self.command_builder.image_clip(
            image_path,
            crop,
            frames,
            self.format(),
            output_path,
            &self.config.encoding_options,
        );
        command.execute().await
    }

    async fn render_blank_clip(&self, frames: u64, output_path: &Path) -> Result<()> {
        debug!("Rendering blank clip ({} frames) -> {}", frames, output_path.display());

        let command = self.command_builder.blank_clip(
            frames,
            self.format(),
            output_path,
            &self.config.encoding_options,
        );
        command.execute().await
    }

    async fn concat_clips(&self, list_file: &Path, output_path: &Path) -> Result<()> {
        info!("Concatenating clips from {}", list_file.display());
        self.command_builder.concat(list_file, output_path).execute().await
    }

    async fn mux_audio(
        &self,
        video_path: &Path,
        audio_path: &Path,
        output_path: &Path,
        trim_to: Option<f64>,
    ) -> Result<()> {
        info!(
            "Muxing {} with {} -> {}",
            video_path.display(),
            audio_path.display(),
            output_path.display()
        );
        self.command_builder
            .mux_audio(video_path, audio_path, output_path, trim_to)
            .execute()
            .await
    }

    async fn probe_duration(&self, media_path: &Path) -> Result<f64> {
        let stdout = self
            .command_builder
            .probe_duration(media_path)
            .execute_with_output()
            .await?;
        let duration = parse_probe_duration(&stdout)?;
        debug!("{} lasts {:.3}s", media_path.display(), duration);
        Ok(duration)
    }

    /// Check if media processor is available
    fn check_availability(&self) -> Result<()> {
        for binary in [&self.config.ffmpeg_binary, &self.config.ffprobe_binary] {
            let output = Command::new(binary)
                .arg("-version")
                .output()
                .map_err(|e| RecapError::Media(format!("{} not found: {}", binary, e)))?;

            if !output.status.success() {
                return Err(RecapError::Media(format!("{} version check failed", binary)));
            }
        }

        info!("Media processor is available");
        Ok(())
    }

    /// Get media processor version information
    async fn get_version_info(&self) -> Result<String> {
        let stdout = self.command_builder.version_check().execute_with_output().await?;
        // The first line carries the version
        Ok(stdout.lines().next().unwrap_or("Unknown version").to_string())
    }
}
