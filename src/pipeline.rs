use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::catalog::{CatalogBuilder, ChapterCatalogEntry, content_images, discover_chapters};
use crate::checkpoint::{CheckpointStore, PipelineCheckpoint, Stage, write_json_atomic};
use crate::config::Config;
use crate::error::{RecapError, Result};
use crate::media::{ComposeReport, MediaProcessorFactory, MediaProcessorTrait, VideoComposer};
use crate::narration::{NarrationCompiler, NarrationFactory, NarrationScript, ScriptGenerator};
use crate::ocr::{OcrFactory, TextExtractor};
use crate::openai::OpenAiClient;
use crate::speech::{AudioArtifact, SpeechFactory, SpeechSynthesizer};
use crate::timing;

pub const CATALOG_FILE: &str = "chapter_texts.json";
pub const SCRIPT_FILE: &str = "narration_scripts.json";
pub const AUDIO_FILE: &str = "narration_audio.json";

/// Per-run settings, after CLI overrides
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub chapters_dir: PathBuf,
    pub output: PathBuf,
    pub temp_dir: PathBuf,
    pub language: String,
    pub max_chapters: Option<usize>,
    pub force: bool,
    pub fixed_image_duration: Option<f64>,
}

impl RunOptions {
    pub fn from_config(config: &Config, chapters_dir: PathBuf, output: PathBuf) -> Self {
        Self {
            chapters_dir,
            output,
            temp_dir: config.pipeline.temp_dir.clone(),
            language: config.pipeline.language.clone(),
            max_chapters: None,
            force: false,
            fixed_image_duration: config.video.image_duration,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub chapters: usize,
    pub images: usize,
    pub audio_seconds: f64,
    pub executed: Vec<Stage>,
    pub skipped: Vec<Stage>,
    pub video: ComposeReport,
}

/// Where each stage leaves its output
#[derive(Debug, Clone)]
pub struct StageArtifacts {
    temp_dir: PathBuf,
    output: PathBuf,
}

impl StageArtifacts {
    pub fn new(temp_dir: &Path, output: &Path) -> Self {
        Self {
            temp_dir: temp_dir.to_path_buf(),
            output: output.to_path_buf(),
        }
    }

    pub fn path(&self, stage: Stage) -> PathBuf {
        match stage {
            Stage::Ocr => self.temp_dir.join(CATALOG_FILE),
            Stage::Scripts => self.temp_dir.join(SCRIPT_FILE),
            Stage::Audio => self.temp_dir.join(AUDIO_FILE),
            Stage::Video => self.output.clone(),
        }
    }

    /// The audio stage also needs the audio file its metadata points to
    pub async fn stage_output_exists(&self, stage: Stage) -> bool {
        let path = self.path(stage);
        if !path.is_file() {
            return false;
        }

        match stage {
            Stage::Audio => read_json::<AudioArtifact>(&path)
                .await
                .map(|audio| audio.path.is_file())
                .unwrap_or(false),
            _ => true,
        }
    }
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = tokio::fs::read(path).await?;
    Ok(serde_json::from_slice(&content)?)
}

/// The external capabilities the pipeline drives
#[derive(Clone)]
pub struct Components {
    pub extractor: Arc<dyn TextExtractor>,
    pub generator: Arc<dyn ScriptGenerator>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    pub media: Arc<dyn MediaProcessorTrait>,
}

impl Components {
    /// Select the first available provider of each kind
    pub async fn from_config(config: &Config) -> Result<Self> {
        let openai = OpenAiClient::new(config.openai.clone())?;
        let media: Arc<dyn MediaProcessorTrait> =
            Arc::from(MediaProcessorFactory::create_processor(config.video.clone()));

        Ok(Self {
            extractor: OcrFactory::create_default(config, &openai).await?,
            generator: NarrationFactory::create_default(config, &openai).await?,
            synthesizer: SpeechFactory::create_default(config, &openai, &media).await?,
            media,
        })
    }
}

/// Checkpointed OCR -> script -> audio -> video runner
pub struct Pipeline {
    config: Config,
    components: Components,
}

impl Pipeline {
    pub async fn new(config: Config) -> Result<Self> {
        let components = Components::from_config(&config).await?;
        Ok(Self::with_components(config, components))
    }

    pub fn with_components(config: Config, components: Components) -> Self {
        Self { config, components }
    }

    pub async fn run(&self, options: &RunOptions) -> Result<RunSummary> {
        let chapter_dirs = discover_chapters(&options.chapters_dir, options.max_chapters)?;
        info!("Found {} chapters in {}", chapter_dirs.len(), options.chapters_dir.display());

        self.components.media.check_availability()?;
        tokio::fs::create_dir_all(&options.temp_dir).await?;

        let store = CheckpointStore::new(&options.temp_dir);
        let artifacts = StageArtifacts::new(&options.temp_dir, &options.output);
        let mut checkpoint = if options.force {
            info!("--force given, ignoring any checkpoint");
            PipelineCheckpoint::default()
        } else {
            store.load().await.unwrap_or_default()
        };

        let mut runner = StageRunner {
            store: &store,
            artifacts: &artifacts,
            checkpoint: &mut checkpoint,
            force: options.force,
            recomputed: false,
            executed: Vec::new(),
            skipped: Vec::new(),
        };

        // Stage 1: page text
        let catalog: Vec<ChapterCatalogEntry> = if runner.should_skip(Stage::Ocr).await {
            read_json(&artifacts.path(Stage::Ocr)).await?
        } else {
            let builder = CatalogBuilder::new(
                self.components.extractor.clone(),
                self.config.pipeline.max_workers,
                self.config.pipeline.show_progress,
            );
            let catalog = builder.build(&chapter_dirs).await?;
            runner.finish(Stage::Ocr, &catalog).await?;
            catalog
        };

        // Stage 2: narration script
        let script: NarrationScript = if runner.should_skip(Stage::Scripts).await {
            read_json(&artifacts.path(Stage::Scripts)).await?
        } else {
            let compiler = NarrationCompiler::new(
                self.components.generator.clone(),
                self.config.pipeline.show_progress,
            );
            let script = compiler.compile(&catalog, &options.language).await?;
            runner.finish(Stage::Scripts, &script).await?;
            script
        };

        // Stage 3: narration audio
        let audio: AudioArtifact = if runner.should_skip(Stage::Audio).await {
            read_json(&artifacts.path(Stage::Audio)).await?
        } else {
            let audio = self
                .components
                .synthesizer
                .synthesize(&script.spoken_text(), &options.language, &options.temp_dir)
                .await?;
            runner.finish(Stage::Audio, &audio).await?;
            audio
        };
        if !audio.duration_seconds.is_finite() || audio.duration_seconds <= 0.0 {
            return Err(RecapError::InvalidAudio(audio.duration_seconds));
        }

        // Stage 4: video
        let images = content_images(&catalog);
        info!("{} images with content across {} chapters", images.len(), catalog.len());
        let plan = timing::allocate(
            audio.duration_seconds,
            &script.full_text,
            &images,
            options.fixed_image_duration,
        )?;

        let composer = VideoComposer::new(
            self.components.media.clone(),
            self.config.video.clone(),
            self.config.pipeline.show_progress,
        );
        let video = composer
            .compose(&plan, &audio, &options.output, &options.temp_dir)
            .await?;

        // A finished run leaves no checkpoint behind
        runner.executed.push(Stage::Video);
        store.clear().await?;

        info!(
            "Finished: {} images, {:.1}s of narration -> {}",
            images.len(),
            audio.duration_seconds,
            options.output.display()
        );

        Ok(RunSummary {
            chapters: catalog.len(),
            images: images.len(),
            audio_seconds: audio.duration_seconds,
            executed: runner.executed,
            skipped: runner.skipped,
            video,
        })
    }
}

struct StageRunner<'a> {
    store: &'a CheckpointStore,
    artifacts: &'a StageArtifacts,
    checkpoint: &'a mut PipelineCheckpoint,
    force: bool,
    /// Set once any stage runs; every later stage runs too
    recomputed: bool,
    executed: Vec<Stage>,
    skipped: Vec<Stage>,
}

impl StageRunner<'_> {
    async fn should_skip(&mut self, stage: Stage) -> bool {
        if self.force || self.recomputed || !self.checkpoint.reached(stage) {
            return false;
        }

        if !self.artifacts.stage_output_exists(stage).await {
            info!("Checkpoint lists {} as done but its output is missing, running it again", stage);
            return false;
        }

        info!("Skipping {} stage, output found at {}", stage, self.artifacts.path(stage).display());
        self.skipped.push(stage);
        true
    }

    async fn finish<T: serde::Serialize>(&mut self, stage: Stage, artifact: &T) -> Result<()> {
        let path = self.artifacts.path(stage);
        write_json_atomic(&path, artifact).await?;

        self.checkpoint.complete(stage, &path);
        if let Err(e) = self.store.save(self.checkpoint).await {
            warn!("Failed to save checkpoint after {}: {}", stage, e);
            return Err(e);
        }

        self.recomputed = true;
        self.executed.push(stage);
        info!("Stage {} complete", stage);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::CropRect;
    use crate::narration::ChapterSource;
    use crate::narration::passthrough::PassthroughGenerator;
    use crate::ocr::Extraction;
    use crate::provider::Provider;
    use crate::speech::silent::SilentSpeech;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Pages named `*blank*` have no text
    #[derive(Default)]
    struct CountingExtractor {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Provider for CountingExtractor {
        fn name(&self) -> &str {
            "counting"
        }

        async fn is_available(&self) -> bool {
            true
        }
    }

    #[async_trait]
    impl TextExtractor for CountingExtractor {
        async fn extract(&self, image_path: &Path) -> Result<Extraction> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let name = image_path.file_stem().unwrap().to_string_lossy().to_string();
            if name.contains("blank") {
                Ok(Extraction::empty())
            } else {
                Ok(Extraction {
                    text: format!("Texto da página {}", name),
                    confidence: 0.9,
                })
            }
        }
    }

    #[derive(Default)]
    struct CountingGenerator {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Provider for CountingGenerator {
        fn name(&self) -> &str {
            "passthrough"
        }

        async fn is_available(&self) -> bool {
            true
        }
    }

    #[async_trait]
    impl ScriptGenerator for CountingGenerator {
        async fn generate(&self, chapter: &ChapterSource, language: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            PassthroughGenerator.generate(chapter, language).await
        }
    }

    struct BrokenSpeech;

    #[async_trait]
    impl Provider for BrokenSpeech {
        fn name(&self) -> &str {
            "broken"
        }

        async fn is_available(&self) -> bool {
            true
        }
    }

    #[async_trait]
    impl SpeechSynthesizer for BrokenSpeech {
        async fn synthesize(&self, _text: &str, _language: &str, _dir: &Path) -> Result<AudioArtifact> {
            Err(RecapError::Speech("voice unavailable".to_string()))
        }
    }

    /// Tracks rendered frames per clip; probing reports their total length
    #[derive(Default)]
    struct FakeMedia {
        clips: Mutex<HashMap<PathBuf, u64>>,
        images: Mutex<Vec<PathBuf>>,
    }

    #[async_trait]
    impl MediaProcessorTrait for FakeMedia {
        async fn render_image_clip(&self, image: &Path, _crop: CropRect, frames: u64, out: &Path) -> Result<()> {
            self.images.lock().unwrap().push(image.to_path_buf());
            self.clips.lock().unwrap().insert(out.to_path_buf(), frames);
            Ok(())
        }

        async fn render_blank_clip(&self, frames: u64, out: &Path) -> Result<()> {
            self.clips.lock().unwrap().insert(out.to_path_buf(), frames);
            Ok(())
        }

        async fn concat_clips(&self, _list: &Path, _out: &Path) -> Result<()> {
            Ok(())
        }

        async fn mux_audio(&self, _v: &Path, _a: &Path, out: &Path, _trim: Option<f64>) -> Result<()> {
            std::fs::write(out, b"video")?;
            Ok(())
        }

        async fn probe_duration(&self, _path: &Path) -> Result<f64> {
            let frames: u64 = self.clips.lock().unwrap().values().sum();
            Ok(frames as f64 / 30.0)
        }

        fn check_availability(&self) -> Result<()> {
            Ok(())
        }

        async fn get_version_info(&self) -> Result<String> {
            Ok("fake".to_string())
        }
    }

    struct Fixture {
        root: tempfile::TempDir,
        extractor: Arc<CountingExtractor>,
        generator: Arc<CountingGenerator>,
        media: Arc<FakeMedia>,
    }

    impl Fixture {
        /// 3 chapters x 5 pages, 2 pages per chapter without text
        fn new() -> Self {
            let root = tempfile::tempdir().unwrap();
            for chapter in 1..=3 {
                let dir = root.path().join("chapters").join(format!("Capítulo {}", chapter));
                std::fs::create_dir_all(&dir).unwrap();
                for page in ["01", "02_blank", "03", "04_blank", "05"] {
                    image::RgbImage::new(8, 12).save(dir.join(format!("{}.png", page))).unwrap();
                }
            }

            Self {
                root,
                extractor: Arc::new(CountingExtractor::default()),
                generator: Arc::new(CountingGenerator::default()),
                media: Arc::new(FakeMedia::default()),
            }
        }

        fn options(&self) -> RunOptions {
            RunOptions {
                chapters_dir: self.root.path().join("chapters"),
                output: self.root.path().join("out").join("recap.mp4"),
                temp_dir: self.root.path().join("temp"),
                language: "pt".to_string(),
                max_chapters: None,
                force: false,
                fixed_image_duration: None,
            }
        }

        fn pipeline(&self, synthesizer: Arc<dyn SpeechSynthesizer>) -> Pipeline {
            let mut config = Config::default();
            config.pipeline.show_progress = false;
            Pipeline::with_components(
                config,
                Components {
                    extractor: self.extractor.clone(),
                    generator: self.generator.clone(),
                    synthesizer,
                    media: self.media.clone(),
                },
            )
        }

        fn temp(&self, file: &str) -> PathBuf {
            self.root.path().join("temp").join(file)
        }
    }

    fn silent() -> Arc<dyn SpeechSynthesizer> {
        Arc::new(SilentSpeech::new(0.3))
    }

    #[tokio::test]
    async fn test_full_run_uses_only_contentful_pages() {
        let fixture = Fixture::new();
        let summary = fixture.pipeline(silent()).run(&fixture.options()).await.unwrap();

        assert_eq!(summary.chapters, 3);
        assert_eq!(summary.images, 9);
        assert_eq!(fixture.media.images.lock().unwrap().len(), 9);
        assert!(
            fixture
                .media
                .images
                .lock()
                .unwrap()
                .iter()
                .all(|p| !p.to_string_lossy().contains("blank"))
        );
        assert_eq!(summary.executed, Stage::ALL.to_vec());
        assert!(summary.skipped.is_empty());

        assert!(fixture.options().output.exists());
        assert!(fixture.temp(CATALOG_FILE).exists());
        assert!(!fixture.temp("video_checkpoint.json").exists());
        assert!((summary.video.stream_seconds - summary.audio_seconds).abs() <= 0.1);
    }

    #[tokio::test]
    async fn test_resume_after_scripts_skips_earlier_stages() {
        let fixture = Fixture::new();
        let err = fixture
            .pipeline(Arc::new(BrokenSpeech))
            .run(&fixture.options())
            .await
            .unwrap_err();
        assert!(matches!(err, RecapError::Speech(_)));

        let checkpoint = CheckpointStore::new(&fixture.temp("")).load().await.unwrap();
        assert_eq!(checkpoint.last_step, Some(Stage::Scripts));

        let script_before = std::fs::read(fixture.temp(SCRIPT_FILE)).unwrap();
        let ocr_calls = fixture.extractor.calls.load(Ordering::SeqCst);
        let generator_calls = fixture.generator.calls.load(Ordering::SeqCst);

        let summary = fixture.pipeline(silent()).run(&fixture.options()).await.unwrap();

        assert_eq!(summary.skipped, vec![Stage::Ocr, Stage::Scripts]);
        assert_eq!(fixture.extractor.calls.load(Ordering::SeqCst), ocr_calls);
        assert_eq!(fixture.generator.calls.load(Ordering::SeqCst), generator_calls);
        assert_eq!(std::fs::read(fixture.temp(SCRIPT_FILE)).unwrap(), script_before);
        assert_eq!(summary.images, 9);
    }

    #[tokio::test]
    async fn test_missing_script_artifact_is_regenerated() {
        let fixture = Fixture::new();
        fixture
            .pipeline(Arc::new(BrokenSpeech))
            .run(&fixture.options())
            .await
            .unwrap_err();
        std::fs::remove_file(fixture.temp(SCRIPT_FILE)).unwrap();

        let ocr_calls = fixture.extractor.calls.load(Ordering::SeqCst);
        let generator_calls = fixture.generator.calls.load(Ordering::SeqCst);

        let summary = fixture.pipeline(silent()).run(&fixture.options()).await.unwrap();

        assert_eq!(summary.skipped, vec![Stage::Ocr]);
        assert_eq!(fixture.extractor.calls.load(Ordering::SeqCst), ocr_calls);
        assert_eq!(fixture.generator.calls.load(Ordering::SeqCst), generator_calls + 3);
        assert!(fixture.temp(SCRIPT_FILE).exists());
    }

    #[tokio::test]
    async fn test_finished_run_leaves_no_checkpoint() {
        let fixture = Fixture::new();
        let summary = fixture.pipeline(silent()).run(&fixture.options()).await.unwrap();
        assert_eq!(summary.executed.last(), Some(&Stage::Video));
        assert!(CheckpointStore::new(&fixture.temp("")).load().await.is_none());

        // Nothing to resume from, so a second run starts over
        let summary = fixture.pipeline(silent()).run(&fixture.options()).await.unwrap();
        assert!(summary.skipped.is_empty());
        assert_eq!(fixture.extractor.calls.load(Ordering::SeqCst), 30);
    }

    #[tokio::test]
    async fn test_force_ignores_checkpoint() {
        let fixture = Fixture::new();
        fixture
            .pipeline(Arc::new(BrokenSpeech))
            .run(&fixture.options())
            .await
            .unwrap_err();

        let mut options = fixture.options();
        options.force = true;
        let summary = fixture.pipeline(silent()).run(&options).await.unwrap();

        assert!(summary.skipped.is_empty());
        assert_eq!(fixture.extractor.calls.load(Ordering::SeqCst), 30);
    }

    #[tokio::test]
    async fn test_corrupt_checkpoint_runs_everything() {
        let fixture = Fixture::new();
        std::fs::create_dir_all(fixture.temp("")).unwrap();
        std::fs::write(fixture.temp("video_checkpoint.json"), "garbage").unwrap();

        let summary = fixture.pipeline(silent()).run(&fixture.options()).await.unwrap();
        assert_eq!(summary.executed.len(), 4);
    }

    #[tokio::test]
    async fn test_no_content_is_fatal() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("chapters").join("Capítulo 1");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("01_blank.png"), b"img").unwrap();

        let fixture = Fixture {
            root,
            extractor: Arc::new(CountingExtractor::default()),
            generator: Arc::new(CountingGenerator::default()),
            media: Arc::new(FakeMedia::default()),
        };

        let err = fixture.pipeline(silent()).run(&fixture.options()).await.unwrap_err();
        assert!(matches!(err, RecapError::NoContentImages));
        assert!(!fixture.options().output.exists());
        assert_eq!(fixture.generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_chapters_is_fatal() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("chapters")).unwrap();
        let fixture = Fixture {
            root,
            extractor: Arc::new(CountingExtractor::default()),
            generator: Arc::new(CountingGenerator::default()),
            media: Arc::new(FakeMedia::default()),
        };

        let err = fixture.pipeline(silent()).run(&fixture.options()).await.unwrap_err();
        assert!(matches!(err, RecapError::NoChapters(_)));
    }
}
