use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::{Extraction, TextExtractor};
use crate::error::{RecapError, Result};
use crate::provider::Provider;

/// One cached OCR result, stored as `<key>.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedExtraction {
    pub image_path: String,
    pub provider: String,
    pub extraction: Extraction,
    pub cached_at: u64, // Unix timestamp
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OcrCacheInfo {
    pub entries: usize,
    pub expired: usize,
    pub total_bytes: u64,
}

/// JSON-file cache of OCR results under `<temp>/cache/ocr`
#[derive(Debug, Clone)]
pub struct OcrCache {
    dir: PathBuf,
    ttl_secs: u64,
}

fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

impl OcrCache {
    pub fn new(dir: PathBuf, ttl_secs: u64) -> Self {
        Self { dir, ttl_secs }
    }

    pub fn default_dir(temp_dir: &Path) -> PathBuf {
        temp_dir.join("cache").join("ocr")
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Key on image path, modification time and provider
    pub fn cache_key(image_path: &Path, provider: &str) -> Result<String> {
        let metadata = std::fs::metadata(image_path)
            .map_err(|e| RecapError::Ocr(format!("Failed to read image metadata: {}", e)))?;

        let modified = metadata
            .modified()
            .map_err(|e| RecapError::Ocr(format!("Failed to get modification time: {}", e)))?
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();

        let mut hasher = DefaultHasher::new();
        image_path.to_string_lossy().hash(&mut hasher);
        modified.hash(&mut hasher);
        metadata.len().hash(&mut hasher);
        provider.hash(&mut hasher);

        Ok(format!("{:016x}", hasher.finish()))
    }

    fn is_expired(&self, entry: &CachedExtraction, now: u64) -> bool {
        self.ttl_secs > 0 && now.saturating_sub(entry.cached_at) > self.ttl_secs
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    pub async fn load(&self, key: &str) -> Option<Extraction> {
        let path = self.entry_path(key);
        let content = tokio::fs::read_to_string(&path).await.ok()?;

        let entry: CachedExtraction = match serde_json::from_str(&content) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Discarding unreadable OCR cache entry {}: {}", key, e);
                let _ = tokio::fs::remove_file(&path).await;
                return None;
            }
        };

        if self.is_expired(&entry, now_secs()) {
            debug!("OCR cache entry {} expired", key);
            let _ = tokio::fs::remove_file(&path).await;
            return None;
        }

        debug!("OCR cache hit: {}", key);
        Some(entry.extraction)
    }

    pub async fn store(
        &self,
        key: &str,
        image_path: &Path,
        provider: &str,
        extraction: &Extraction,
    ) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let entry = CachedExtraction {
            image_path: image_path.to_string_lossy().to_string(),
            provider: provider.to_string(),
            extraction: extraction.clone(),
            cached_at: now_secs(),
        };

        let content = serde_json::to_string_pretty(&entry)?;
        tokio::fs::write(self.entry_path(key), content).await?;
        Ok(())
    }

    async fn json_files(&self) -> Result<Vec<PathBuf>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                files.push(path);
            }
        }
        Ok(files)
    }

    /// Remove every cached result, returns the number of deleted entries
    pub async fn clear(&self) -> Result<u64> {
        let mut deleted = 0;
        for path in self.json_files().await? {
            if tokio::fs::remove_file(&path).await.is_ok() {
                deleted += 1;
            }
        }

        info!("Cleared {} cached OCR results", deleted);
        Ok(deleted)
    }

    pub async fn info(&self) -> Result<OcrCacheInfo> {
        let now = now_secs();
        let mut info = OcrCacheInfo::default();

        for path in self.json_files().await? {
            let Ok(content) = tokio::fs::read_to_string(&path).await else {
                continue;
            };
            info.entries += 1;
            info.total_bytes += content.len() as u64;

            match serde_json::from_str::<CachedExtraction>(&content) {
                Ok(entry) if !self.is_expired(&entry, now) => {}
                _ => info.expired += 1,
            }
        }

        Ok(info)
    }
}

/// Decorator that consults the cache before calling the wrapped extractor
pub struct CachedExtractor {
    inner: Box<dyn TextExtractor>,
    cache: OcrCache,
}

impl CachedExtractor {
    pub fn new(inner: Box<dyn TextExtractor>, cache: OcrCache) -> Self {
        Self { inner, cache }
    }
}

#[async_trait]
impl Provider for CachedExtractor {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn is_available(&self) -> bool {
        self.inner.is_available().await
    }
}

#[async_trait]
impl TextExtractor for CachedExtractor {
    async fn extract(&self, image_path: &Path) -> Result<Extraction> {
        let key = match OcrCache::cache_key(image_path, self.inner.name()) {
            Ok(key) => key,
            Err(_) => return self.inner.extract(image_path).await,
        };

        if let Some(hit) = self.cache.load(&key).await {
            return Ok(hit);
        }

        // Failures are not cached so the next run retries them
        let extraction = self.inner.extract(image_path).await?;
        if let Err(e) = self
            .cache
            .store(&key, image_path, self.inner.name(), &extraction)
            .await
        {
            warn!("Failed to cache OCR result for {}: {}", image_path.display(), e);
        }

        Ok(extraction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Provider for Counting {
        fn name(&self) -> &str {
            "counting"
        }

        async fn is_available(&self) -> bool {
            true
        }
    }

    #[async_trait]
    impl TextExtractor for Counting {
        async fn extract(&self, _image_path: &Path) -> Result<Extraction> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Extraction {
                text: "Olá!".to_string(),
                confidence: 0.9,
            })
        }
    }

    #[tokio::test]
    async fn test_second_extract_hits_cache() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("001.png");
        std::fs::write(&image, b"fake").unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let cache = OcrCache::new(dir.path().join("cache"), 3600);
        let extractor = CachedExtractor::new(Box::new(Counting { calls: calls.clone() }), cache.clone());

        let first = extractor.extract(&image).await.unwrap();
        let second = extractor.extract(&image).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.info().await.unwrap().entries, 1);
    }

    #[tokio::test]
    async fn test_clear_removes_entries() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("001.png");
        std::fs::write(&image, b"fake").unwrap();

        let cache = OcrCache::new(dir.path().join("cache"), 0);
        let key = OcrCache::cache_key(&image, "silent").unwrap();
        cache.store(&key, &image, "silent", &Extraction::empty()).await.unwrap();

        assert_eq!(cache.clear().await.unwrap(), 1);
        assert_eq!(cache.info().await.unwrap(), OcrCacheInfo::default());
        assert!(cache.load(&key).await.is_none());
    }

    #[test]
    fn test_key_depends_on_provider() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("001.png");
        std::fs::write(&image, b"fake").unwrap();

        let a = OcrCache::cache_key(&image, "openai").unwrap();
        let b = OcrCache::cache_key(&image, "tesseract").unwrap();
        assert_ne!(a, b);
        assert_eq!(a, OcrCache::cache_key(&image, "openai").unwrap());
    }

    #[test]
    fn test_expiry() {
        let cache = OcrCache::new(PathBuf::from("unused"), 60);
        let entry = CachedExtraction {
            image_path: "p.png".to_string(),
            provider: "silent".to_string(),
            extraction: Extraction::empty(),
            cached_at: 1_000,
        };
        assert!(!cache.is_expired(&entry, 1_050));
        assert!(cache.is_expired(&entry, 1_061));

        let forever = OcrCache::new(PathBuf::from("unused"), 0);
        assert!(!forever.is_expired(&entry, u64::MAX));
    }
}
