use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::Config;

#[derive(Parser)]
#[command(author, version, about = "Turn manga chapters into a narrated recap video", long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file path (defaults to ./manga-recap.toml when present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the full OCR -> narration -> audio -> video pipeline
    Run(RunArgs),

    /// Show the checkpoint and which stage outputs exist
    Status {
        /// Working directory of the run
        #[arg(long)]
        temp: Option<PathBuf>,

        /// Output video of the run
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List OCR, narration and speech providers and whether they are available
    Providers,

    /// Manage the OCR result cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Write the default configuration to a file
    InitConfig {
        /// Destination file
        #[arg(default_value = "manga-recap.toml")]
        path: PathBuf,
    },
}

#[derive(ClapArgs, Debug, Clone)]
pub struct RunArgs {
    /// Directory with one sub-directory of page images per chapter
    #[arg(long)]
    pub chapters_dir: PathBuf,

    /// Output video file
    #[arg(short, long)]
    pub output: PathBuf,

    /// Narration language (ISO 639-1)
    #[arg(long)]
    pub lang: Option<String>,

    /// Working directory for intermediate files
    #[arg(long)]
    pub temp: Option<PathBuf>,

    /// Show every image for this many seconds instead of following the narration
    #[arg(long)]
    pub image_duration: Option<f64>,

    /// Video width in pixels
    #[arg(long)]
    pub width: Option<u32>,

    /// Video height in pixels
    #[arg(long)]
    pub height: Option<u32>,

    /// Only process the first N chapters
    #[arg(long)]
    pub max_chapters: Option<usize>,

    /// Ignore the checkpoint and redo every stage
    #[arg(long)]
    pub force: bool,
}

impl RunArgs {
    /// Command-line values take precedence over the configuration
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(lang) = &self.lang {
            config.pipeline.language = lang.clone();
        }
        if let Some(temp) = &self.temp {
            config.pipeline.temp_dir = temp.clone();
        }
        if let Some(duration) = self.image_duration {
            config.video.image_duration = Some(duration);
        }
        if let Some(width) = self.width {
            config.video.width = width;
        }
        if let Some(height) = self.height {
            config.video.height = height;
        }
    }
}

#[derive(Subcommand)]
pub enum CacheAction {
    /// Delete every cached OCR result
    Clear {
        #[arg(long)]
        temp: Option<PathBuf>,
    },

    /// Show cache size and expired entries
    Info {
        #[arg(long)]
        temp: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run() {
        let args = Args::try_parse_from([
            "manga-recap",
            "run",
            "--chapters-dir",
            "manga",
            "--output",
            "recap.mp4",
            "--lang",
            "en",
            "--image-duration",
            "4.5",
            "--force",
            "-v",
        ])
        .unwrap();

        assert!(args.verbose);
        let Commands::Run(run) = args.command else {
            panic!("expected run");
        };
        assert_eq!(run.chapters_dir, PathBuf::from("manga"));
        assert!(run.force);

        let mut config = Config::default();
        run.apply_to(&mut config);
        assert_eq!(config.pipeline.language, "en");
        assert_eq!(config.video.image_duration, Some(4.5));
        assert_eq!(config.video.width, 1280);
    }

    #[test]
    fn test_run_requires_chapters_dir() {
        assert!(Args::try_parse_from(["manga-recap", "run", "--output", "o.mp4"]).is_err());
    }

    #[test]
    fn test_parse_cache_clear() {
        let args = Args::try_parse_from(["manga-recap", "cache", "clear", "--temp", "work"]).unwrap();
        assert!(matches!(
            args.command,
            Commands::Cache { action: CacheAction::Clear { temp: Some(_) } }
        ));
    }
}
