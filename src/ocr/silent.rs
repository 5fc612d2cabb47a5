use async_trait::async_trait;
use std::path::Path;

use super::{Extraction, TextExtractor};
use crate::error::Result;
use crate::provider::Provider;

/// Always-available stand-in; every page comes back empty
pub struct SilentExtractor;

#[async_trait]
impl Provider for SilentExtractor {
    fn name(&self) -> &str {
        "silent"
    }

    async fn is_available(&self) -> bool {
        true
    }
}

#[async_trait]
impl TextExtractor for SilentExtractor {
    async fn extract(&self, _image_path: &Path) -> Result<Extraction> {
        Ok(Extraction::empty())
    }
}
