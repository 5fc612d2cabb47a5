use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::MediaProcessorTrait;
use crate::config::VideoConfig;
use crate::error::{RecapError, Result};
use crate::progress::progress_bar;
use crate::speech::AudioArtifact;
use crate::timing::{DURATION_TOLERANCE, TimingEntry};

const CLIPS_DIR: &str = "clips";
const CONCAT_LIST: &str = "concat.txt";
const CONCAT_VIDEO: &str = "concat.mp4";

/// Source rectangle cut out of a page before scaling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Largest centred rectangle of the target aspect ratio inside the source
pub fn centered_crop(src_width: u32, src_height: u32, target_width: u32, target_height: u32) -> CropRect {
    let (sw, sh) = (src_width as u64, src_height as u64);
    let (tw, th) = (target_width.max(1) as u64, target_height.max(1) as u64);

    if sw * th > sh * tw {
        // Wider than the target: cut the sides
        let width = ((sh * tw / th) as u32).clamp(1, src_width);
        CropRect {
            x: (src_width - width) / 2,
            y: 0,
            width,
            height: src_height,
        }
    } else {
        let height = ((sw * th / tw) as u32).clamp(1, src_height.max(1));
        CropRect {
            x: 0,
            y: (src_height.saturating_sub(height)) / 2,
            width: src_width,
            height,
        }
    }
}

/// Frame counts from cumulative boundaries so rounding never drifts by more
/// than one frame overall; every clip keeps at least one frame
pub fn quantize_frames(durations: &[f64], fps: u32) -> Vec<u64> {
    let fps = fps as f64;
    let mut elapsed = 0.0;
    let mut emitted = 0u64;

    durations
        .iter()
        .map(|duration| {
            elapsed += duration;
            let boundary = (elapsed * fps).round() as u64;
            let frames = boundary.saturating_sub(emitted).max(1);
            emitted += frames;
            frames
        })
        .collect()
}

/// Clips that start at or after the end of the audio; trimming the mux cuts them
pub fn clips_past_audio(frames: &[u64], audio_seconds: f64, fps: u32) -> usize {
    let audio_frames = (audio_seconds * fps as f64).round() as u64;
    let mut start = 0u64;
    frames
        .iter()
        .filter(|&&count| {
            let past = start >= audio_frames;
            start += count;
            past
        })
        .count()
}

/// Adjustment applied after comparing the clip stream with the audio
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Reconciliation {
    None,
    /// Cut the final mux at the audio length
    Trim { to_seconds: f64 },
    /// Hold the last image longer
    ExtendLast { by_seconds: f64 },
}

pub fn reconcile(stream_seconds: f64, audio_seconds: f64) -> Reconciliation {
    if stream_seconds > audio_seconds + DURATION_TOLERANCE {
        Reconciliation::Trim {
            to_seconds: audio_seconds,
        }
    } else if stream_seconds < audio_seconds - DURATION_TOLERANCE {
        Reconciliation::ExtendLast {
            by_seconds: audio_seconds - stream_seconds,
        }
    } else {
        Reconciliation::None
    }
}

#[derive(Debug, Clone, PartialEq)]
enum ClipSource {
    Image { path: PathBuf, crop: CropRect },
    Blank,
}

#[derive(Debug, Clone, PartialEq)]
struct Clip {
    source: ClipSource,
    frames: u64,
    path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComposeReport {
    pub output: PathBuf,
    pub clips: usize,
    pub blank_clips: usize,
    pub stream_seconds: f64,
    pub reconciliation: Reconciliation,
}

/// Renders a timing plan and the narration into the final video
pub struct VideoComposer {
    media: Arc<dyn MediaProcessorTrait>,
    config: VideoConfig,
    show_progress: bool,
}

impl VideoComposer {
    pub fn new(media: Arc<dyn MediaProcessorTrait>, config: VideoConfig, show_progress: bool) -> Self {
        Self {
            media,
            config,
            show_progress,
        }
    }

    async fn render(&self, clip: &Clip) -> Result<()> {
        match &clip.source {
            ClipSource::Image { path, crop } => {
                self.media
                    .render_image_clip(path, *crop, clip.frames, &clip.path)
                    .await
            }
            ClipSource::Blank => self.media.render_blank_clip(clip.frames, &clip.path).await,
        }
    }

    fn source_for(&self, image_path: &Path) -> ClipSource {
        match image::image_dimensions(image_path) {
            Ok((width, height)) if width > 0 && height > 0 => ClipSource::Image {
                path: image_path.to_path_buf(),
                crop: centered_crop(width, height, self.config.width, self.config.height),
            },
            Ok(_) => {
                warn!("{} has no pixels, using a black frame", image_path.display());
                ClipSource::Blank
            }
            Err(e) => {
                warn!("Cannot decode {}, using a black frame: {}", image_path.display(), e);
                ClipSource::Blank
            }
        }
    }

    async fn concat(&self, clips_dir: &Path, clips: &[Clip]) -> Result<PathBuf> {
        let list: String = clips
            .iter()
            .filter_map(|clip| clip.path.file_name())
            .map(|name| format!("file '{}'\n", name.to_string_lossy()))
            .collect();

        let list_path = clips_dir.join(CONCAT_LIST);
        tokio::fs::write(&list_path, list).await?;

        let video_path = clips_dir.join(CONCAT_VIDEO);
        self.media.concat_clips(&list_path, &video_path).await?;
        Ok(video_path)
    }

    pub async fn compose(
        &self,
        plan: &[TimingEntry],
        audio: &AudioArtifact,
        output: &Path,
        work_dir: &Path,
    ) -> Result<ComposeReport> {
        if plan.is_empty() {
            return Err(RecapError::NoContentImages);
        }

        let clips_dir = work_dir.join(CLIPS_DIR);
        tokio::fs::create_dir_all(&clips_dir).await?;

        let durations: Vec<f64> = plan.iter().map(|entry| entry.duration).collect();
        let frames = quantize_frames(&durations, self.config.fps);
        let hidden = clips_past_audio(&frames, audio.duration_seconds, self.config.fps);
        if hidden > 0 {
            warn!(
                "{} of {} images fall past the end of the {:.2}s narration at {} fps and will not be visible",
                hidden,
                plan.len(),
                audio.duration_seconds,
                self.config.fps
            );
        }

        let progress = progress_bar(plan.len() as u64, "Clips", self.show_progress);
        let mut clips = Vec::with_capacity(plan.len());
        for (index, (entry, frames)) in plan.iter().zip(frames).enumerate() {
            let mut clip = Clip {
                source: self.source_for(&entry.image_path),
                frames,
                path: clips_dir.join(format!("clip_{:05}.mp4", index + 1)),
            };

            if let Err(e) = self.render(&clip).await {
                if clip.source == ClipSource::Blank {
                    return Err(e);
                }
                warn!("Failed to render {}, using a black frame: {}", entry.image_path.display(), e);
                clip.source = ClipSource::Blank;
                self.render(&clip).await?;
            }

            clips.push(clip);
            progress.inc(1);
        }
        progress.finish_and_clear();

        let mut stream = self.concat(&clips_dir, &clips).await?;
        let mut stream_seconds = self.media.probe_duration(&stream).await?;
        let reconciliation = reconcile(stream_seconds, audio.duration_seconds);
        debug!(
            "Clip stream {:.3}s vs audio {:.3}s: {:?}",
            stream_seconds, audio.duration_seconds, reconciliation
        );

        let trim_to = match reconciliation {
            Reconciliation::None => None,
            Reconciliation::Trim { to_seconds } => Some(to_seconds),
            Reconciliation::ExtendLast { by_seconds } => {
                let extra = (by_seconds * self.config.fps as f64).ceil() as u64;
                if let Some(last) = clips.last_mut() {
                    info!("Extending the last clip by {:.3}s ({} frames)", by_seconds, extra);
                    last.frames += extra;
                    self.render(last).await?;
                }
                stream = self.concat(&clips_dir, &clips).await?;
                stream_seconds = self.media.probe_duration(&stream).await?;
                // Rounding up to whole frames can overshoot slightly
                (stream_seconds > audio.duration_seconds).then_some(audio.duration_seconds)
            }
        };

        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        self.media.mux_audio(&stream, &audio.path, output, trim_to).await?;

        let blank_clips = clips.iter().filter(|c| c.source == ClipSource::Blank).count();
        if self.config.keep_clips {
            info!("Keeping clips in {}", clips_dir.display());
        } else if let Err(e) = tokio::fs::remove_dir_all(&clips_dir).await {
            warn!("Failed to remove {}: {}", clips_dir.display(), e);
        }

        info!("Video written to {}", output.display());
        Ok(ComposeReport {
            output: output.to_path_buf(),
            clips: clips.len(),
            blank_clips,
            stream_seconds,
            reconciliation,
        })
    }
}
