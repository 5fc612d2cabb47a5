// Narration script compilation
//
// A script generator turns the text of one chapter into narration with inline
// markers. The compiler runs it for every chapter that has content, normalizes
// the markers and joins everything into a single NarrationScript.
//
// Generators, in default priority order:
// - OpenAI: chat completion
// - Ollama: local model over /api/generate
// - Passthrough: template built from the page text, no model involved

pub mod markers;
pub mod ollama;
pub mod openai;
pub mod passthrough;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

pub use markers::Segment;

use crate::catalog::ChapterCatalogEntry;
use crate::config::Config;
use crate::error::{RecapError, Result};
use crate::openai::OpenAiClient;
use crate::progress::progress_bar;
use crate::provider::{Provider, select_provider};

/// Contentful text of one chapter, as handed to a generator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterSource {
    pub chapter_name: String,
    /// Text of each page with content, in page order
    pub pages: Vec<String>,
    pub page_numbers: Vec<u32>,
}

impl ChapterSource {
    pub fn from_entry(entry: &ChapterCatalogEntry) -> Self {
        let content: Vec<_> = entry.content_pages().collect();
        Self {
            chapter_name: entry.chapter_name.clone(),
            pages: content.iter().map(|page| page.text.clone()).collect(),
            page_numbers: content.iter().map(|page| page.page_number).collect(),
        }
    }

    /// Page texts joined by blank lines, cut to at most `max_chars` characters
    pub fn joined_text(&self, max_chars: usize) -> String {
        let joined = self.pages.join("\n\n");
        if max_chars == 0 || joined.chars().count() <= max_chars {
            return joined;
        }
        joined.chars().take(max_chars).collect()
    }
}

/// Writes narration for a single chapter
#[async_trait]
pub trait ScriptGenerator: Provider {
    async fn generate(&self, chapter: &ChapterSource, language: &str) -> Result<String>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterNarration {
    pub chapter_name: String,
    pub text: String,
    pub word_count: usize,
    pub source_pages: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptSegment {
    pub text: String,
    pub word_count: usize,
}

/// Compiled narration for the whole run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrationScript {
    /// Complete script with canonical markers
    pub full_text: String,
    pub segments: Vec<ScriptSegment>,
    pub chapters: Vec<ChapterNarration>,
    pub total_word_count: usize,
    pub image_marker_count: usize,
    pub total_chapters: usize,
    /// Name of the generator that wrote the script
    pub generator: String,
}

impl NarrationScript {
    /// Assemble the script from per-chapter narration
    pub fn from_chapters(chapters: Vec<ChapterNarration>, generator: &str) -> Result<Self> {
        if chapters.is_empty() {
            return Err(RecapError::NoContentImages);
        }

        let full_text = chapters
            .iter()
            .map(|chapter| format!("{}\n{}", markers::chapter_marker(&chapter.chapter_name), chapter.text))
            .collect::<Vec<_>>()
            .join(&format!("\n{}\n", markers::PAUSE_MARKER));

        let segments: Vec<ScriptSegment> = markers::segment(&full_text)
            .into_iter()
            .map(|segment| ScriptSegment {
                text: segment.text,
                word_count: segment.word_count,
            })
            .collect();

        Ok(Self {
            total_word_count: segments.iter().map(|s| s.word_count).sum(),
            image_marker_count: markers::count_image_markers(&full_text),
            total_chapters: chapters.len(),
            generator: generator.to_string(),
            full_text,
            segments,
            chapters,
        })
    }

    /// Text for the speech synthesizer
    pub fn spoken_text(&self) -> String {
        markers::spoken_text(&self.full_text)
    }
}

/// Runs the selected generator over the catalog
pub struct NarrationCompiler {
    generator: Arc<dyn ScriptGenerator>,
    show_progress: bool,
}

impl NarrationCompiler {
    pub fn new(generator: Arc<dyn ScriptGenerator>, show_progress: bool) -> Self {
        Self {
            generator,
            show_progress,
        }
    }

    pub async fn compile(
        &self,
        catalog: &[ChapterCatalogEntry],
        language: &str,
    ) -> Result<NarrationScript> {
        let progress = progress_bar(catalog.len() as u64, "Narration", self.show_progress);
        let mut chapters = Vec::new();

        for entry in catalog {
            progress.inc(1);
            if entry.pages_with_content == 0 {
                info!("Skipping chapter {}: no pages with content", entry.chapter_name);
                continue;
            }

            let source = ChapterSource::from_entry(entry);
            let raw = self.generator.generate(&source, language).await?;
            let text = markers::normalize(raw.trim());

            let word_count = markers::segment(&text).iter().map(|s| s.word_count).sum();
            if word_count == 0 {
                warn!(
                    "Skipping chapter {}: {} returned no narration",
                    entry.chapter_name,
                    self.generator.name()
                );
                continue;
            }

            info!("Narrated chapter {} ({} words)", entry.chapter_name, word_count);
            chapters.push(ChapterNarration {
                chapter_name: entry.chapter_name.clone(),
                text,
                word_count,
                source_pages: source.page_numbers,
            });
        }
        progress.finish_and_clear();

        if chapters.is_empty() {
            warn!("No chapter has pages with content");
        }
        NarrationScript::from_chapters(chapters, self.generator.name())
    }
}

/// Factory for creating script generators
pub struct NarrationFactory;

impl NarrationFactory {
    pub fn create_generator(
        name: &str,
        config: &Config,
        openai: &OpenAiClient,
    ) -> Option<Box<dyn ScriptGenerator>> {
        match name.to_lowercase().as_str() {
            "openai" => Some(Box::new(openai::OpenAiScriptGenerator::new(
                openai.clone(),
                config.narration.clone(),
            ))),
            "ollama" => Some(Box::new(ollama::OllamaScriptGenerator::new(
                config.ollama.clone(),
                config.narration.clone(),
            ))),
            "passthrough" => Some(Box::new(passthrough::PassthroughGenerator)),
            _ => None,
        }
    }

    pub fn candidates(config: &Config, openai: &OpenAiClient) -> Vec<Box<dyn ScriptGenerator>> {
        config
            .narration
            .providers
            .iter()
            .filter_map(|name| {
                let generator = Self::create_generator(name, config, openai);
                if generator.is_none() {
                    warn!("Unknown narration provider '{}' in configuration", name);
                }
                generator
            })
            .collect()
    }

    pub async fn create_default(
        config: &Config,
        openai: &OpenAiClient,
    ) -> Result<Arc<dyn ScriptGenerator>> {
        let selected = select_provider("narration", Self::candidates(config, openai)).await?;
        Ok(Arc::from(selected))
    }
}

/// Prompt shared by the model-backed generators
pub(crate) fn build_prompt(instruction: &str, chapter: &ChapterSource, language: &str, max_chars: usize) -> String {
    format!(
        "{}\nIdioma da narração: {}\nCapítulo: {}\n\nTexto:\n{}",
        instruction,
        language,
        chapter.chapter_name,
        chapter.joined_text(max_chars)
    )
}
