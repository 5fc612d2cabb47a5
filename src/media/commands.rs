use std::path::Path;
use tokio::process::Command;
use tracing::debug;

use super::composer::CropRect;
use crate::error::{RecapError, Result};

/// Abstract media processing command representation
#[derive(Debug, Clone)]
pub struct MediaCommand {
    pub binary_path: String,
    pub args: Vec<String>,
    pub description: String,
}

impl MediaCommand {
    /// Create a new media processing command
    pub fn new<S1: Into<String>, S2: Into<String>>(binary_path: S1, description: S2) -> Self {
        Self {
            binary_path: binary_path.into(),
            args: Vec::new(),
            description: description.into(),
        }
    }

    /// Add an argument
    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(|s| s.into()));
        self
    }

    /// Add input file
    pub fn input<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg("-i").arg(path.as_ref().to_string_lossy().to_string())
    }

    /// Add output file
    pub fn output<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg(path.as_ref().to_string_lossy().to_string())
    }

    /// Force overwrite output
    pub fn overwrite(self) -> Self {
        self.arg("-y")
    }

    /// Set video codec
    pub fn video_codec<S: Into<String>>(self, codec: S) -> Self {
        self.arg("-c:v").arg(codec)
    }

    /// Set audio codec
    pub fn audio_codec<S: Into<String>>(self, codec: S) -> Self {
        self.arg("-c:a").arg(codec)
    }

    /// Disable audio
    pub fn no_audio(self) -> Self {
        self.arg("-an")
    }

    /// Add video filter
    pub fn video_filter<S: Into<String>>(self, filter: S) -> Self {
        self.arg("-vf").arg(filter)
    }

    /// Stop after exactly `frames` video frames
    pub fn frames(self, frames: u64) -> Self {
        self.arg("-frames:v").arg(frames.to_string())
    }

    /// Run and return stdout
    pub async fn execute_with_output(&self) -> Result<String> {
        debug!("Executing media command: {} {:?}", self.binary_path, self.args);
        debug!("Description: {}", self.description);

        let output = Command::new(&self.binary_path)
            .args(&self.args)
            .output()
            .await
            .map_err(|e| RecapError::Media(format!("Failed to execute {}: {}", self.binary_path, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail: Vec<&str> = stderr.lines().rev().take(5).collect();
            return Err(RecapError::Media(format!(
                "{} failed: {}",
                self.description,
                tail.into_iter().rev().collect::<Vec<_>>().join("\n")
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Execute the command
    pub async fn execute(&self) -> Result<()> {
        self.execute_with_output().await.map(|_| ())
    }
}

/// Output geometry shared by every clip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameFormat {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

/// Builder for the ffmpeg/ffprobe invocations the composer needs
pub struct MediaCommandBuilder {
    binary_path: String,
    probe_path: String,
}

impl MediaCommandBuilder {
    /// Create a new command builder
    pub fn new<S1: Into<String>, S2: Into<String>>(binary_path: S1, probe_path: S2) -> Self {
        Self {
            binary_path: binary_path.into(),
            probe_path: probe_path.into(),
        }
    }

    fn encode(cmd: MediaCommand, format: FrameFormat, additional_options: &[String]) -> MediaCommand {
        cmd.arg("-r")
            .arg(format.fps.to_string())
            .video_codec("libx264")
            .arg("-pix_fmt")
            .arg("yuv420p")
            .args(additional_options.iter().cloned())
            .no_audio()
    }

    /// Still image held for `frames` frames, centre-cropped then scaled
    pub fn image_clip<P: AsRef<Path>>(
        &self,
        image_path: P,
        crop: CropRect,
        frames: u64,
        format: FrameFormat,
        output_path: P,
        additional_options: &[String],
    ) -> MediaCommand {
        let filter = format!(
            "crop={}:{}:{}:{},scale={}:{},setsar=1,format=yuv420p",
            crop.width, crop.height, crop.x, crop.y, format.width, format.height
        );

        let cmd = MediaCommand::new(&self.binary_path, "Image clip")
            .overwrite()
            .arg("-loop")
            .arg("1")
            .arg("-framerate")
            .arg(format.fps.to_string())
            .input(image_path)
            .video_filter(filter)
            .frames(frames);

        Self::encode(cmd, format, additional_options).output(output_path)
    }

    /// Solid black clip, stands in for pages that cannot be decoded
    pub fn blank_clip<P: AsRef<Path>>(
        &self,
        frames: u64,
        format: FrameFormat,
        output_path: P,
        additional_options: &[String],
    ) -> MediaCommand {
        let cmd = MediaCommand::new(&self.binary_path, "Blank clip")
            .overwrite()
            .arg("-f")
            .arg("lavfi")
            .input(format!(
                "color=c=black:s={}x{}:r={}",
                format.width, format.height, format.fps
            ))
            .frames(frames);

        Self::encode(cmd, format, additional_options).output(output_path)
    }

    /// Concatenate clips listed in a concat demuxer file without re-encoding
    pub fn concat<P: AsRef<Path>>(&self, list_file: P, output_path: P) -> MediaCommand {
        MediaCommand::new(&self.binary_path, "Clip concatenation")
            .overwrite()
            .arg("-f")
            .arg("concat")
            .arg("-safe")
            .arg("0")
            .input(list_file)
            .arg("-c")
            .arg("copy")
            .output(output_path)
    }

    /// Add the narration to the video stream, optionally cut at `trim_to` seconds
    pub fn mux_audio<P: AsRef<Path>>(
        &self,
        video_path: P,
        audio_path: P,
        output_path: P,
        trim_to: Option<f64>,
    ) -> MediaCommand {
        let mut cmd = MediaCommand::new(&self.binary_path, "Audio mux")
            .overwrite()
            .input(video_path)
            .input(audio_path)
            .arg("-map")
            .arg("0:v:0")
            .arg("-map")
            .arg("1:a:0")
            .video_codec("copy")
            .audio_codec("aac")
            .arg("-b:a")
            .arg("192k");

        if let Some(seconds) = trim_to {
            cmd = cmd.arg("-t").arg(format!("{:.3}", seconds));
        }

        cmd.arg("-movflags").arg("+faststart").output(output_path)
    }

    /// Container duration in seconds, printed as a bare number
    pub fn probe_duration<P: AsRef<Path>>(&self, media_path: P) -> MediaCommand {
        MediaCommand::new(&self.probe_path, "Duration probe")
            .arg("-v")
            .arg("error")
            .arg("-show_entries")
            .arg("format=duration")
            .arg("-of")
            .arg("default=noprint_wrappers=1:nokey=1")
            .output(media_path)
    }

    /// Build version check command
    pub fn version_check(&self) -> MediaCommand {
        MediaCommand::new(&self.binary_path, "Version check").arg("-version")
    }
}

/// Parse ffprobe's bare duration output
pub fn parse_probe_duration(stdout: &str) -> Result<f64> {
    let value = stdout.trim();
    value
        .lines()
        .next()
        .and_then(|line| line.trim().parse::<f64>().ok())
        .filter(|seconds| seconds.is_finite() && *seconds >= 0.0)
        .ok_or_else(|| RecapError::Media(format!("Unexpected ffprobe output: '{}'", value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> MediaCommandBuilder {
        MediaCommandBuilder::new("ffmpeg", "ffprobe")
    }

    const FORMAT: FrameFormat = FrameFormat {
        width: 1280,
        height: 720,
        fps: 30,
    };

    #[test]
    fn test_image_clip_args() {
        let crop = CropRect {
            x: 0,
            y: 219,
            width: 1000,
            height: 562,
        };
        let cmd = builder().image_clip("p.png", crop, 75, FORMAT, "c.mp4", &["-crf".to_string(), "23".to_string()]);

        assert_eq!(cmd.binary_path, "ffmpeg");
        let joined = cmd.args.join(" ");
        assert!(joined.starts_with("-y -loop 1 -framerate 30 -i p.png"));
        assert!(joined.contains("-vf crop=1000:562:0:219,scale=1280:720,setsar=1,format=yuv420p"));
        assert!(joined.contains("-frames:v 75"));
        assert!(joined.contains("-crf 23"));
        assert_eq!(cmd.args.last().unwrap(), "c.mp4");
    }

    #[test]
    fn test_blank_clip_uses_color_source() {
        let cmd = builder().blank_clip(10, FORMAT, "b.mp4", &[]);
        let joined = cmd.args.join(" ");
        assert!(joined.contains("-f lavfi -i color=c=black:s=1280x720:r=30"));
        assert!(joined.contains("-frames:v 10"));
    }

    #[test]
    fn test_mux_trim() {
        let trimmed = builder().mux_audio("v.mp4", "a.mp3", "o.mp4", Some(12.5));
        assert!(trimmed.args.join(" ").contains("-t 12.500"));

        let untouched = builder().mux_audio("v.mp4", "a.mp3", "o.mp4", None);
        assert!(!untouched.args.contains(&"-t".to_string()));
    }

    #[test]
    fn test_probe_command_and_parse() {
        let cmd = builder().probe_duration("a.mp3");
        assert_eq!(cmd.binary_path, "ffprobe");
        assert_eq!(cmd.args.last().unwrap(), "a.mp3");

        assert_eq!(parse_probe_duration("12.345000\n").unwrap(), 12.345);
        assert!(parse_probe_duration("N/A").is_err());
        assert!(parse_probe_duration("").is_err());
    }
}
