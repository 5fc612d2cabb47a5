use futures::{StreamExt, TryStreamExt, stream};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{RecapError, Result};
use crate::ocr::TextExtractor;
use crate::progress::progress_bar;

/// Text recorded for a page where nothing was read
pub const EMPTY_PAGE_SENTINEL: &str = "[Página vazia]";

/// Prefix of the text recorded for a page whose extraction failed
pub const OCR_ERROR_PREFIX: &str = "[Erro OCR";

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp"];

/// Whether extracted text counts as page content
pub fn is_contentful(text: &str) -> bool {
    let text = text.trim();
    !text.is_empty() && text != EMPTY_PAGE_SENTINEL && !text.starts_with(OCR_ERROR_PREFIX)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRecord {
    pub image_file: String,
    pub image_path: PathBuf,
    /// 1-based position in sorted filename order
    pub page_number: u32,
    pub text: String,
    pub confidence: f32,
    pub has_content: bool,
}

impl PageRecord {
    pub fn new(image_path: PathBuf, page_number: u32, text: String, confidence: f32) -> Self {
        let image_file = image_path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();

        Self {
            image_file,
            has_content: is_contentful(&text),
            image_path,
            page_number,
            text,
            confidence,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterCatalogEntry {
    pub chapter_name: String,
    pub chapter_dir: PathBuf,
    pub pages: Vec<PageRecord>,
    pub total_pages: usize,
    pub pages_with_content: usize,
}

impl ChapterCatalogEntry {
    pub fn new(chapter_name: String, chapter_dir: PathBuf, pages: Vec<PageRecord>) -> Self {
        Self {
            total_pages: pages.len(),
            pages_with_content: pages.iter().filter(|page| page.has_content).count(),
            chapter_name,
            chapter_dir,
            pages,
        }
    }

    pub fn content_pages(&self) -> impl Iterator<Item = &PageRecord> {
        self.pages.iter().filter(|page| page.has_content)
    }
}

/// Images shown in the video: contentful pages in chapter then page order
pub fn content_images(catalog: &[ChapterCatalogEntry]) -> Vec<PathBuf> {
    catalog
        .iter()
        .flat_map(|entry| entry.content_pages().map(|page| page.image_path.clone()))
        .collect()
}

/// Immediate sub-directories of `root`, sorted by name
pub fn discover_chapters(root: &Path, max_chapters: Option<usize>) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(RecapError::FileNotFound(root.display().to_string()));
    }

    let mut chapters = Vec::new();
    for entry in WalkDir::new(root)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| RecapError::Io(e.into()))?;
        if entry.file_type().is_dir() {
            chapters.push(entry.into_path());
        }
    }

    if chapters.is_empty() {
        return Err(RecapError::NoChapters(root.to_path_buf()));
    }

    if let Some(limit) = max_chapters {
        if chapters.len() > limit {
            info!("Limiting to the first {} of {} chapters", limit, chapters.len());
            chapters.truncate(limit);
        }
    }

    Ok(chapters)
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Page images of a chapter in lexicographic filename order
pub fn list_images(chapter_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut images = Vec::new();
    for entry in WalkDir::new(chapter_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| RecapError::Io(e.into()))?;
        if entry.file_type().is_file() && is_image(entry.path()) {
            images.push(entry.into_path());
        }
    }
    Ok(images)
}

/// Reads every page of every chapter through the selected extractor
pub struct CatalogBuilder {
    extractor: Arc<dyn TextExtractor>,
    max_workers: usize,
    show_progress: bool,
}

impl CatalogBuilder {
    pub fn new(extractor: Arc<dyn TextExtractor>, max_workers: usize, show_progress: bool) -> Self {
        Self {
            extractor,
            max_workers: max_workers.max(1),
            show_progress,
        }
    }

    /// Pages are read one after another; a failing page becomes an error sentinel
    pub async fn build_chapter(&self, chapter_dir: &Path) -> Result<ChapterCatalogEntry> {
        let chapter_name = chapter_dir
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| chapter_dir.display().to_string());

        let images = list_images(chapter_dir)?;
        debug!("Chapter {}: {} images", chapter_name, images.len());

        let mut pages = Vec::with_capacity(images.len());
        for (index, image_path) in images.into_iter().enumerate() {
            let (text, confidence) = match self.extractor.extract(&image_path).await {
                Ok(extraction) if extraction.text.trim().is_empty() => {
                    (EMPTY_PAGE_SENTINEL.to_string(), extraction.confidence)
                }
                Ok(extraction) => (extraction.text.trim().to_string(), extraction.confidence),
                Err(e) => {
                    warn!("OCR failed for {}: {}", image_path.display(), e);
                    (format!("{}: {}]", OCR_ERROR_PREFIX, e), 0.0)
                }
            };
            pages.push(PageRecord::new(image_path, index as u32 + 1, text, confidence));
        }

        let entry = ChapterCatalogEntry::new(chapter_name, chapter_dir.to_path_buf(), pages);
        info!(
            "Chapter {}: {}/{} pages with content",
            entry.chapter_name, entry.pages_with_content, entry.total_pages
        );
        Ok(entry)
    }

    /// Chapters run concurrently up to `max_workers`; results keep input order
    pub async fn build(&self, chapter_dirs: &[PathBuf]) -> Result<Vec<ChapterCatalogEntry>> {
        let progress = progress_bar(chapter_dirs.len() as u64, "OCR", self.show_progress);

        let catalog = stream::iter(chapter_dirs.iter().map(|dir| {
            let progress = &progress;
            async move {
                let entry = self.build_chapter(dir).await;
                progress.inc(1);
                entry
            }
        }))
        .buffered(self.max_workers)
        .try_collect::<Vec<_>>()
        .await?;

        progress.finish_and_clear();
        Ok(catalog)
    }
}
