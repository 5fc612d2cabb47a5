//! Inline narration markers.
//!
//! Scripts use `[PAUSA]` to separate narration segments, `[IMAGEM: ...]` to
//! suggest a new image and `[CAPÍTULO: ...]` to introduce a chapter. Language
//! models are loose with casing and spelling, so [`normalize`] folds the
//! common variants back into the canonical forms before anything else reads
//! the script.

use regex::Regex;
use std::sync::LazyLock;

pub const PAUSE_MARKER: &str = "[PAUSA]";

static PAUSE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\[\s*(?:pausa|pause)\s*\]").expect("valid pause regex")
});

static IMAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\[\s*(?:imagem|image)\s*:\s*([^\]]*?)\s*\]").expect("valid image regex")
});

static CHAPTER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\[\s*(?:capítulo|capitulo|chapter)\s*:\s*([^\]]*?)\s*\]")
        .expect("valid chapter regex")
});

static MARKER_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\[[^\]]*\]\s*$").expect("valid marker line regex"));

/// A run of narration between two pause markers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub text: String,
    pub word_count: usize,
}

pub fn image_marker(description: &str) -> String {
    format!("[IMAGEM: {}]", description.trim())
}

pub fn chapter_marker(name: &str) -> String {
    format!("[CAPÍTULO: {}]", name.trim())
}

/// Rewrite loose marker variants into their canonical spelling
pub fn normalize(script: &str) -> String {
    let script = PAUSE_RE.replace_all(script, PAUSE_MARKER);
    let script = IMAGE_RE.replace_all(&script, |caps: &regex::Captures| image_marker(&caps[1]));
    let script = CHAPTER_RE.replace_all(&script, |caps: &regex::Captures| chapter_marker(&caps[1]));
    script.into_owned()
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Split on pause markers, drop marker-only lines and inline image markers,
/// then discard pieces left empty
pub fn segment(script: &str) -> Vec<Segment> {
    PAUSE_RE
        .split(script)
        .filter_map(|piece| {
            let kept: Vec<String> = piece
                .lines()
                .filter(|line| !MARKER_LINE_RE.is_match(line))
                .map(|line| {
                    let line = IMAGE_RE.replace_all(line, "");
                    line.split_whitespace().collect::<Vec<_>>().join(" ")
                })
                .filter(|line| !line.is_empty())
                .collect();

            let text = kept.join("\n");
            if text.is_empty() {
                None
            } else {
                let word_count = word_count(&text);
                Some(Segment { text, word_count })
            }
        })
        .collect()
}

pub fn count_image_markers(script: &str) -> usize {
    IMAGE_RE.find_iter(script).count()
}

/// Text meant to be read aloud: markers removed, pauses become paragraph breaks
pub fn spoken_text(script: &str) -> String {
    segment(script)
        .into_iter()
        .map(|segment| segment.text)
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_loose_variants() {
        let script = "Início [pausa] meio [ PAUSE ] fim [IMAGE: herói]\n[imagem:vilão] [chapter: 2]";
        assert_eq!(
            normalize(script),
            "Início [PAUSA] meio [PAUSA] fim [IMAGEM: herói]\n[IMAGEM: vilão] [CAPÍTULO: 2]"
        );
    }

    #[test]
    fn test_segment_drops_marker_lines_and_inline_images() {
        let script = "[CAPÍTULO: Capítulo 1]\nO herói chega. [IMAGEM: cidade]\n[PAUSA]\n[IMAGEM: luta]\n[PAUSA]\nEle vence a luta final.";
        let segments = segment(script);

        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text, "O herói chega.");
        assert_eq!(segments[0].word_count, 3);
        assert_eq!(segments[1].word_count, 5);
    }

    #[test]
    fn test_segment_empty_script() {
        assert!(segment("").is_empty());
        assert!(segment("[PAUSA] [PAUSA]\n[IMAGEM: x]").is_empty());
    }

    #[test]
    fn test_count_and_spoken_text() {
        let script = "Um [IMAGEM: a] dois\n[PAUSA]\n[IMAGEM: b]\ntrês";
        assert_eq!(count_image_markers(script), 2);
        assert_eq!(spoken_text(script), "Um dois\n\ntrês");
    }
}
