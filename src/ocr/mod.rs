// Content extraction (OCR) providers
//
// Implementations, in default priority order:
// - OpenAI: vision model reads the page
// - Tesseract: local tesseract binary, optionally on an enhanced copy of the page
// - Silent: no-op stand-in that reports every page as empty
//
// The selected provider is wrapped in the on-disk result cache when enabled.

pub mod cache;
pub mod enhance;
pub mod openai;
pub mod silent;
pub mod tesseract;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

pub use cache::{CachedExtractor, OcrCache, OcrCacheInfo};
pub use enhance::{EnhanceSettings, EnhancingExtractor};

use crate::config::Config;
use crate::error::Result;
use crate::openai::OpenAiClient;
use crate::provider::{Provider, select_provider};

/// Text read from a single page image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extraction {
    pub text: String,
    /// Confidence in [0, 1]
    pub confidence: f32,
}

impl Extraction {
    pub fn empty() -> Self {
        Self {
            text: String::new(),
            confidence: 0.0,
        }
    }
}

/// Main trait for content extraction
#[async_trait]
pub trait TextExtractor: Provider {
    /// Extract text from a page image
    async fn extract(&self, image_path: &Path) -> Result<Extraction>;
}

/// Factory for creating extractor instances
pub struct OcrFactory;

impl OcrFactory {
    /// Create an extractor by configuration name
    pub fn create_extractor(
        name: &str,
        config: &Config,
        openai: &OpenAiClient,
    ) -> Option<Box<dyn TextExtractor>> {
        match name.to_lowercase().as_str() {
            "openai" => Some(Box::new(openai::OpenAiVisionExtractor::new(openai.clone()))),
            "tesseract" => {
                let tesseract = tesseract::TesseractExtractor::new(
                    &config.ocr.tesseract_binary,
                    &config.ocr.tesseract_languages,
                );
                if config.ocr.enhance {
                    Some(Box::new(EnhancingExtractor::new(
                        tesseract,
                        EnhanceSettings::from_config(&config.ocr),
                    )))
                } else {
                    Some(Box::new(tesseract))
                }
            }
            "silent" => Some(Box::new(silent::SilentExtractor)),
            _ => None,
        }
    }

    /// Build every configured candidate in priority order
    pub fn candidates(config: &Config, openai: &OpenAiClient) -> Vec<Box<dyn TextExtractor>> {
        config
            .ocr
            .providers
            .iter()
            .filter_map(|name| {
                let extractor = Self::create_extractor(name, config, openai);
                if extractor.is_none() {
                    warn!("Unknown OCR provider '{}' in configuration", name);
                }
                extractor
            })
            .collect()
    }

    /// Select the first available extractor, wrapped in the result cache when enabled
    pub async fn create_default(
        config: &Config,
        openai: &OpenAiClient,
    ) -> Result<Arc<dyn TextExtractor>> {
        let selected = select_provider("OCR", Self::candidates(config, openai)).await?;

        if config.ocr.cache_enabled {
            let cache = OcrCache::new(
                OcrCache::default_dir(&config.pipeline.temp_dir),
                config.ocr.cache_ttl_secs,
            );
            Ok(Arc::new(CachedExtractor::new(selected, cache)))
        } else {
            Ok(Arc::from(selected))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_provider_is_skipped() {
        let mut config = Config::default();
        config.ocr.providers = vec!["silent".to_string(), "paddle".to_string()];
        let openai = OpenAiClient::new(config.openai.clone()).unwrap();

        let candidates = OcrFactory::candidates(&config, &openai);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].name(), "silent");
    }

    #[tokio::test]
    async fn test_falls_back_to_silent_without_key() {
        let mut config = Config::default();
        config.ocr.providers = vec!["openai".to_string(), "silent".to_string()];
        config.ocr.cache_enabled = false;
        let openai = OpenAiClient::new(config.openai.clone()).unwrap();

        let extractor = OcrFactory::create_default(&config, &openai).await.unwrap();
        assert_eq!(extractor.name(), "silent");
    }
}
