use async_trait::async_trait;
use tracing::debug;

use super::{ChapterSource, ScriptGenerator, build_prompt};
use crate::config::NarrationConfig;
use crate::error::Result;
use crate::openai::OpenAiClient;
use crate::provider::Provider;

pub struct OpenAiScriptGenerator {
    client: OpenAiClient,
    config: NarrationConfig,
}

impl OpenAiScriptGenerator {
    pub fn new(client: OpenAiClient, config: NarrationConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl Provider for OpenAiScriptGenerator {
    fn name(&self) -> &str {
        "openai"
    }

    async fn is_available(&self) -> bool {
        self.client.is_configured()
    }
}

#[async_trait]
impl ScriptGenerator for OpenAiScriptGenerator {
    async fn generate(&self, chapter: &ChapterSource, language: &str) -> Result<String> {
        let prompt = build_prompt(
            &self.config.prompt,
            chapter,
            language,
            self.config.max_source_chars,
        );
        debug!(
            "Requesting narration for {} from {}",
            chapter.chapter_name,
            self.client.config().model
        );

        self.client.chat(&self.config.system_prompt, &prompt).await
    }
}
