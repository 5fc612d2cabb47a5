use async_trait::async_trait;

use super::markers::{PAUSE_MARKER, image_marker};
use super::{ChapterSource, ScriptGenerator};
use crate::error::Result;
use crate::provider::Provider;

/// Offline fallback: each page's text becomes one narration segment
pub struct PassthroughGenerator;

#[async_trait]
impl Provider for PassthroughGenerator {
    fn name(&self) -> &str {
        "passthrough"
    }

    async fn is_available(&self) -> bool {
        true
    }
}

#[async_trait]
impl ScriptGenerator for PassthroughGenerator {
    async fn generate(&self, chapter: &ChapterSource, _language: &str) -> Result<String> {
        let script = chapter
            .pages
            .iter()
            .zip(&chapter.page_numbers)
            .map(|(text, number)| {
                // Brackets in page text would read as markers
                let line = text
                    .replace(['[', ']'], " ")
                    .split_whitespace()
                    .collect::<Vec<_>>()
                    .join(" ");
                format!("{}\n{}", image_marker(&format!("página {}", number)), line)
            })
            .collect::<Vec<_>>()
            .join(&format!("\n{}\n", PAUSE_MARKER));

        Ok(script)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::narration::markers;

    #[tokio::test]
    async fn test_one_segment_per_page() {
        let chapter = ChapterSource {
            chapter_name: "Capítulo 1".to_string(),
            pages: vec!["Olá,\nmundo!".to_string(), "Tchau.".to_string()],
            page_numbers: vec![1, 4],
        };

        let script = PassthroughGenerator.generate(&chapter, "pt").await.unwrap();
        assert_eq!(
            script,
            "[IMAGEM: página 1]\nOlá, mundo!\n[PAUSA]\n[IMAGEM: página 4]\nTchau."
        );

        let segments = markers::segment(&script);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].word_count, 2);
        assert_eq!(markers::count_image_markers(&script), 2);
    }

    #[tokio::test]
    async fn test_bracketed_page_text_is_narrated() {
        let chapter = ChapterSource {
            chapter_name: "Capítulo 1".to_string(),
            pages: vec!["[BOOM!]".to_string(), "Ele cai [PAUSA] no rio".to_string()],
            page_numbers: vec![1, 2],
        };

        let script = PassthroughGenerator.generate(&chapter, "pt").await.unwrap();
        let segments = markers::segment(&script);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text, "BOOM!");
        assert_eq!(segments[1].text, "Ele cai PAUSA no rio");
    }
}
