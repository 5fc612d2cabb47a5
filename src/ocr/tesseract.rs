use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;
use tracing::debug;

use super::{Extraction, TextExtractor};
use crate::error::{RecapError, Result};
use crate::provider::Provider;

/// OCR through a local tesseract binary using its TSV output
pub struct TesseractExtractor {
    binary_path: String,
    languages: String,
}

impl TesseractExtractor {
    pub fn new(binary_path: &str, languages: &str) -> Self {
        Self {
            binary_path: binary_path.to_string(),
            languages: languages.to_string(),
        }
    }
}

#[async_trait]
impl Provider for TesseractExtractor {
    fn name(&self) -> &str {
        "tesseract"
    }

    async fn is_available(&self) -> bool {
        Command::new(&self.binary_path)
            .arg("--version")
            .output()
            .await
            .map(|output| output.status.success())
            .unwrap_or(false)
    }
}

#[async_trait]
impl TextExtractor for TesseractExtractor {
    async fn extract(&self, image_path: &Path) -> Result<Extraction> {
        debug!("Running tesseract on {}", image_path.display());

        let output = Command::new(&self.binary_path)
            .arg(image_path)
            .arg("stdout")
            .arg("-l")
            .arg(&self.languages)
            .arg("tsv")
            .output()
            .await
            .map_err(|e| RecapError::Ocr(format!("Failed to execute tesseract: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RecapError::Ocr(format!("tesseract failed: {}", stderr.trim())));
        }

        Ok(parse_tsv(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Rebuild lines from word-level TSV rows; confidence is the mean word confidence
fn parse_tsv(tsv: &str) -> Extraction {
    let mut lines: Vec<((u32, u32, u32, u32), Vec<String>)> = Vec::new();
    let mut confidence_sum = 0.0f32;
    let mut confident_words = 0u32;

    for row in tsv.lines().skip(1) {
        let columns: Vec<&str> = row.split('\t').collect();
        if columns.len() < 12 || columns[0] != "5" {
            continue;
        }

        let word = columns[11].trim();
        if word.is_empty() {
            continue;
        }

        let position = |i: usize| columns[i].parse::<u32>().unwrap_or(0);
        let line_id = (position(1), position(2), position(3), position(4));

        match lines.last_mut() {
            Some((id, words)) if *id == line_id => words.push(word.to_string()),
            _ => lines.push((line_id, vec![word.to_string()])),
        }

        if let Ok(conf) = columns[10].parse::<f32>() {
            if conf > 0.0 {
                confidence_sum += conf;
                confident_words += 1;
            }
        }
    }

    let text = lines
        .iter()
        .map(|(_, words)| words.join(" "))
        .collect::<Vec<_>>()
        .join("\n");

    let confidence = if confident_words > 0 {
        (confidence_sum / confident_words as f32 / 100.0).clamp(0.0, 1.0)
    } else {
        0.0
    };

    Extraction { text, confidence }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str =
        "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext";

    #[test]
    fn test_parse_tsv_groups_lines() {
        let tsv = format!(
            "{}\n\
             1\t1\t0\t0\t0\t0\t0\t0\t800\t1200\t-1\t\n\
             5\t1\t1\t1\t1\t1\t10\t10\t50\t20\t90\tNão\n\
             5\t1\t1\t1\t1\t2\t70\t10\t50\t20\t80\tpode\n\
             5\t1\t1\t1\t2\t1\t10\t40\t50\t20\t70\tser!\n",
            HEADER
        );

        let extraction = parse_tsv(&tsv);
        assert_eq!(extraction.text, "Não pode\nser!");
        assert!((extraction.confidence - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_parse_tsv_without_words() {
        let tsv = format!("{}\n1\t1\t0\t0\t0\t0\t0\t0\t800\t1200\t-1\t\n", HEADER);
        let extraction = parse_tsv(&tsv);
        assert!(extraction.text.is_empty());
        assert_eq!(extraction.confidence, 0.0);
    }

    #[tokio::test]
    async fn test_missing_binary_is_unavailable() {
        let extractor = TesseractExtractor::new("definitely-not-tesseract-binary", "eng");
        assert!(!extractor.is_available().await);
    }
}
