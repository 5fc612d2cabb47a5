use async_trait::async_trait;
use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, ImageFormat, Luma};
use std::path::Path;
use tracing::{debug, warn};

use super::{Extraction, TextExtractor};
use crate::config::OcrConfig;
use crate::error::{RecapError, Result};
use crate::provider::Provider;

const BINARIZE_THRESHOLD: u8 = 128;

#[derive(Debug, Clone, PartialEq)]
pub struct EnhanceSettings {
    /// Longest edge in pixels
    pub max_size: u32,
    /// Contrast adjustment passed to `adjust_contrast`; 22.5 is roughly a 1.5x stretch
    pub contrast: f32,
    pub binarize: bool,
}

impl Default for EnhanceSettings {
    fn default() -> Self {
        Self {
            max_size: 2048,
            contrast: 22.5,
            binarize: false,
        }
    }
}

impl EnhanceSettings {
    pub fn from_config(config: &OcrConfig) -> Self {
        Self {
            max_size: config.max_image_size,
            binarize: config.binarize,
            ..Self::default()
        }
    }
}

/// Grayscale, downscale, contrast stretch and optionally binarize a page
pub fn enhance_image(image: DynamicImage, settings: &EnhanceSettings) -> GrayImage {
    let (width, height) = (image.width(), image.height());
    let image = if settings.max_size > 0 && width.max(height) > settings.max_size {
        let ratio = settings.max_size as f64 / width.max(height) as f64;
        let new_width = ((width as f64 * ratio).round() as u32).max(1);
        let new_height = ((height as f64 * ratio).round() as u32).max(1);
        image.resize_exact(new_width, new_height, FilterType::Lanczos3)
    } else {
        image
    };

    let mut gray = image.grayscale().adjust_contrast(settings.contrast).to_luma8();

    if settings.binarize {
        for pixel in gray.pixels_mut() {
            let value = if pixel[0] >= BINARIZE_THRESHOLD { 255 } else { 0 };
            *pixel = Luma([value]);
        }
    }

    gray
}

/// Write an enhanced PNG copy of `source` to `target`
pub fn enhance_file(source: &Path, target: &Path, settings: &EnhanceSettings) -> Result<()> {
    let image = image::open(source)?;
    let enhanced = enhance_image(image, settings);
    enhanced.save_with_format(target, ImageFormat::Png)?;
    Ok(())
}

/// Runs the wrapped extractor on an enhanced temporary copy of each page.
/// Falls back to the original image when the page cannot be decoded.
pub struct EnhancingExtractor<E> {
    inner: E,
    settings: EnhanceSettings,
}

impl<E: TextExtractor> EnhancingExtractor<E> {
    pub fn new(inner: E, settings: EnhanceSettings) -> Self {
        Self { inner, settings }
    }
}

#[async_trait]
impl<E: TextExtractor> Provider for EnhancingExtractor<E> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn is_available(&self) -> bool {
        self.inner.is_available().await
    }
}

#[async_trait]
impl<E: TextExtractor> TextExtractor for EnhancingExtractor<E> {
    async fn extract(&self, image_path: &Path) -> Result<Extraction> {
        let enhanced = tempfile::Builder::new()
            .prefix("ocr-")
            .suffix(".png")
            .tempfile()?;

        let source = image_path.to_path_buf();
        let target = enhanced.path().to_path_buf();
        let settings = self.settings.clone();

        let result = tokio::task::spawn_blocking(move || enhance_file(&source, &target, &settings))
            .await
            .map_err(|e| RecapError::Ocr(format!("Enhancement task failed: {}", e)))?;

        match result {
            Ok(()) => {
                debug!("Enhanced {} for OCR", image_path.display());
                self.inner.extract(enhanced.path()).await
            }
            Err(e) => {
                warn!("Could not enhance {}: {}", image_path.display(), e);
                self.inner.extract(image_path).await
            }
        }
    }
}
