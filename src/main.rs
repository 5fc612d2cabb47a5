//! manga-recap - narrated recap videos from manga chapters
//!
//! Entry point: parses the command line, loads configuration, sets up logging
//! and dispatches to the pipeline or one of the maintenance commands.

use anyhow::Result;
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tracing::{Level, info};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use manga_recap::checkpoint::{CheckpointStore, Stage};
use manga_recap::cli::{Args, CacheAction, Commands};
use manga_recap::config::Config;
use manga_recap::media::{MediaProcessorFactory, MediaProcessorTrait};
use manga_recap::narration::NarrationFactory;
use manga_recap::ocr::{OcrCache, OcrFactory};
use manga_recap::openai::OpenAiClient;
use manga_recap::pipeline::{Pipeline, RunOptions, StageArtifacts};
use manga_recap::provider::{ProviderStatus, describe_providers};
use manga_recap::speech::SpeechFactory;

const DEFAULT_CONFIG_FILE: &str = "manga-recap.toml";

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            if Path::new(DEFAULT_CONFIG_FILE).exists() {
                Config::from_file(DEFAULT_CONFIG_FILE)?
            } else {
                Config::default()
            }
        }
    };
    config.apply_env();
    if let Commands::Run(run) = &args.command {
        run.apply_to(&mut config);
    }
    config.validate()?;

    // Logging lives under the temp dir, which the command line may have moved
    setup_logging(args.verbose, &config.pipeline.temp_dir)?;
    info!("Starting manga-recap {}", env!("CARGO_PKG_VERSION"));

    match args.command {
        Commands::Run(run) => {
            let mut options = RunOptions::from_config(&config, run.chapters_dir, run.output);
            options.max_chapters = run.max_chapters;
            options.force = run.force;

            let pipeline = Pipeline::new(config).await?;
            let summary = pipeline.run(&options).await?;

            println!("\nVideo created: {}", summary.video.output.display());
            println!("  Chapters: {}", summary.chapters);
            println!("  Images:   {}", summary.images);
            println!("  Duration: {:.1}s", summary.audio_seconds);
            if !summary.skipped.is_empty() {
                let skipped: Vec<&str> = summary.skipped.iter().map(|s| s.name()).collect();
                println!("  Resumed:  {} reused from checkpoint", skipped.join(", "));
            }
        }
        Commands::Status { temp, output } => {
            let temp_dir = temp.unwrap_or_else(|| config.pipeline.temp_dir.clone());
            let store = CheckpointStore::new(&temp_dir);

            match store.load().await {
                Some(checkpoint) => {
                    let last = checkpoint.last_step.map(|s| s.name()).unwrap_or("none");
                    println!("Checkpoint: last step '{}' at {}", last, checkpoint.timestamp);
                }
                None => println!("No checkpoint in {}", temp_dir.display()),
            }

            let artifacts = StageArtifacts::new(&temp_dir, output.as_deref().unwrap_or(Path::new("")));
            println!("{:<10} {:<10} {}", "Stage", "Output", "Path");
            println!("{}", "-".repeat(60));
            for stage in Stage::ALL {
                if stage == Stage::Video && output.is_none() {
                    continue;
                }
                let status = if artifacts.stage_output_exists(stage).await {
                    "present"
                } else {
                    "missing"
                };
                println!("{:<10} {:<10} {}", stage.name(), status, artifacts.path(stage).display());
            }
        }
        Commands::Providers => {
            let openai = OpenAiClient::new(config.openai.clone())?;
            let media: Arc<dyn MediaProcessorTrait> =
                Arc::from(MediaProcessorFactory::create_processor(config.video.clone()));

            print_providers("OCR", &describe_providers(&OcrFactory::candidates(&config, &openai)).await);
            print_providers(
                "Narration",
                &describe_providers(&NarrationFactory::candidates(&config, &openai)).await,
            );
            print_providers(
                "Speech",
                &describe_providers(&SpeechFactory::candidates(&config, &openai, &media)).await,
            );

            println!("\nVideo:");
            match media.check_availability() {
                Ok(()) => println!("  {:<12} {}", "ffmpeg", media.get_version_info().await?),
                Err(e) => println!("  {:<12} unavailable ({})", "ffmpeg", e),
            }
        }
        Commands::Cache { action } => match action {
            CacheAction::Clear { temp } => {
                let cache = ocr_cache(&config, temp.as_deref());
                let deleted = cache.clear().await?;
                println!("Cleared {} cached OCR results from {}", deleted, cache.dir().display());
            }
            CacheAction::Info { temp } => {
                let cache = ocr_cache(&config, temp.as_deref());
                let info = cache.info().await?;
                println!("OCR cache: {}", cache.dir().display());
                println!("  Entries: {} ({} expired)", info.entries, info.expired);
                println!("  Size:    {:.1} KB", info.total_bytes as f64 / 1024.0);
                let ttl = if config.ocr.cache_ttl_secs == 0 {
                    "never expires".to_string()
                } else {
                    format!("{}s", config.ocr.cache_ttl_secs)
                };
                println!("  TTL:     {}", ttl);
            }
        },
        Commands::InitConfig { path } => {
            if path.exists() {
                anyhow::bail!("{} already exists", path.display());
            }
            Config::default().save_to_file(&path)?;
            println!("Wrote default configuration to {}", path.display());
        }
    }

    Ok(())
}

fn ocr_cache(config: &Config, temp: Option<&Path>) -> OcrCache {
    let temp_dir = temp.unwrap_or(config.pipeline.temp_dir.as_path());
    OcrCache::new(OcrCache::default_dir(temp_dir), config.ocr.cache_ttl_secs)
}

fn print_providers(kind: &str, statuses: &[ProviderStatus]) {
    println!("\n{}:", kind);
    for (index, status) in statuses.iter().enumerate() {
        let availability = if status.available { "available" } else { "unavailable" };
        println!("  {}. {:<12} {}", index + 1, status.name, availability);
    }
}

fn setup_logging(verbose: bool, temp_dir: &Path) -> Result<()> {
    let log_dir = temp_dir.join("log");
    std::fs::create_dir_all(&log_dir)?;

    // Daily rotation
    let file_appender = rolling::daily(&log_dir, "manga-recap.log");
    let (non_blocking_file, guard) = non_blocking(file_appender);
    // Keep the guard alive for the duration of the program
    std::mem::forget(guard);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let console_layer = fmt::layer().with_target(false);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false); // No ANSI colors in file

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!(
        "Logging initialized - console: {}, file: {}",
        log_level,
        log_dir.join("manga-recap.log").display()
    );

    Ok(())
}
