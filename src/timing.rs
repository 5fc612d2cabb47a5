//! Per-image display durations.
//!
//! The narration is split into segments on pause markers. Every segment gets a
//! share of the audio proportional to its word count, and the contentful page
//! images are dealt out to the segments in order. The resulting durations
//! always add up to the audio length.

use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, warn};

use crate::error::{RecapError, Result};
use crate::narration::markers;

/// Shortest share a segment gets when the audio is long enough to afford it
pub const MIN_SEGMENT_SECONDS: f64 = 0.5;

/// Largest accepted gap between the plan total and the audio duration
pub const DURATION_TOLERANCE: f64 = 0.1;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimingEntry {
    pub image_path: PathBuf,
    pub duration: f64,
}

pub fn plan_total(plan: &[TimingEntry]) -> f64 {
    plan.iter().map(|entry| entry.duration).sum()
}

/// Build the timing plan for `images` over `total_duration` seconds of audio
pub fn allocate(
    total_duration: f64,
    script: &str,
    images: &[PathBuf],
    fixed_image_duration: Option<f64>,
) -> Result<Vec<TimingEntry>> {
    if !total_duration.is_finite() || total_duration <= 0.0 {
        return Err(RecapError::InvalidAudio(total_duration));
    }
    if images.is_empty() {
        return Err(RecapError::NoContentImages);
    }

    let durations = match fixed_image_duration {
        Some(fixed) if fixed.is_finite() && fixed > 0.0 => {
            fixed_durations(total_duration, fixed, images.len())
        }
        Some(fixed) => {
            warn!("Ignoring invalid fixed image duration {}", fixed);
            content_durations(total_duration, script, images.len())
        }
        None => content_durations(total_duration, script, images.len()),
    };

    let mut plan: Vec<TimingEntry> = images
        .iter()
        .zip(durations)
        .map(|(image_path, duration)| TimingEntry {
            image_path: image_path.clone(),
            duration,
        })
        .collect();

    let residual = total_duration - plan_total(&plan);
    if let Some(last) = plan.last_mut() {
        last.duration += residual;
    }

    debug!(
        "Timing plan: {} images over {:.2}s",
        plan.len(),
        plan_total(&plan)
    );
    Ok(plan)
}

fn fixed_durations(total: f64, fixed: f64, count: usize) -> Vec<f64> {
    if fixed * count as f64 > total {
        let scaled = total / count as f64;
        debug!("Fixed duration {}s overruns the audio, using {:.3}s", fixed, scaled);
        return vec![scaled; count];
    }

    // The last image holds until the narration ends
    let mut durations = vec![fixed; count];
    if let Some(last) = durations.last_mut() {
        *last += total - fixed * count as f64;
    }
    durations
}

fn content_durations(total: f64, script: &str, image_count: usize) -> Vec<f64> {
    let words: Vec<usize> = markers::segment(script)
        .iter()
        .map(|segment| segment.word_count)
        .collect();

    if words.iter().sum::<usize>() == 0 {
        debug!("No narration words, spreading images uniformly");
        return vec![total / image_count as f64; image_count];
    }

    let segment_seconds = segment_durations(&words, total);
    let per_segment = images_per_segment(image_count, words.len());

    let mut durations = Vec::with_capacity(image_count);
    for (seconds, images) in segment_seconds.iter().zip(&per_segment) {
        for _ in 0..*images {
            durations.push(seconds / *images as f64);
        }
    }

    // Segments left without an image (more segments than images) give their
    // time back to the others
    let emitted: f64 = durations.iter().sum();
    if emitted > 0.0 && (emitted - total).abs() > f64::EPSILON {
        let scale = total / emitted;
        for duration in &mut durations {
            *duration *= scale;
        }
    }

    durations
}

/// Word-proportional shares with a floor of MIN_SEGMENT_SECONDS per segment.
/// Segments below the floor are pinned to it and the rest re-shared until no
/// share falls under the floor.
fn segment_durations(words: &[usize], total: f64) -> Vec<f64> {
    let proportional = |indices: &[usize], budget: f64| -> Vec<(usize, f64)> {
        let free_words: usize = indices.iter().map(|&i| words[i]).sum();
        indices
            .iter()
            .map(|&i| (i, words[i] as f64 / free_words as f64 * budget))
            .collect()
    };

    let all: Vec<usize> = (0..words.len()).collect();
    if MIN_SEGMENT_SECONDS * words.len() as f64 > total {
        return proportional(&all, total).into_iter().map(|(_, d)| d).collect();
    }

    let mut durations = vec![MIN_SEGMENT_SECONDS; words.len()];
    let mut free = all;

    loop {
        let pinned = words.len() - free.len();
        let budget = total - pinned as f64 * MIN_SEGMENT_SECONDS;
        let shares = proportional(&free, budget);

        let below: Vec<usize> = shares
            .iter()
            .filter(|(_, d)| *d < MIN_SEGMENT_SECONDS)
            .map(|(i, _)| *i)
            .collect();

        if below.is_empty() {
            for (i, d) in shares {
                durations[i] = d;
            }
            return durations;
        }

        free.retain(|i| !below.contains(i));
    }
}

/// First `images % segments` segments get one extra image
fn images_per_segment(images: usize, segments: usize) -> Vec<usize> {
    let base = images / segments;
    let extra = images % segments;
    (0..segments)
        .map(|i| if i < extra { base + 1 } else { base })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn images(n: usize) -> Vec<PathBuf> {
        (1..=n).map(|i| PathBuf::from(format!("{:03}.png", i))).collect()
    }

    fn words(n: usize) -> String {
        vec!["palavra"; n].join(" ")
    }

    fn durations(plan: &[TimingEntry]) -> Vec<f64> {
        plan.iter().map(|e| e.duration).collect()
    }

    fn assert_close(actual: &[f64], expected: &[f64]) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-9, "{:?} != {:?}", actual, expected);
        }
    }

    #[test]
    fn test_word_proportional_split() {
        let script = format!("{}\n[PAUSA]\n{}", words(10), words(30));
        let plan = allocate(40.0, &script, &images(8), None).unwrap();

        assert_close(&durations(&plan), &[2.5, 2.5, 2.5, 2.5, 7.5, 7.5, 7.5, 7.5]);
        assert_eq!(plan[0].image_path, PathBuf::from("001.png"));
        assert!((plan_total(&plan) - 40.0).abs() <= DURATION_TOLERANCE);
    }

    #[test]
    fn test_fixed_duration_scaled_down() {
        let plan = allocate(30.0, "qualquer coisa", &images(10), Some(5.0)).unwrap();
        assert_close(&durations(&plan), &[3.0; 10]);
    }

    #[test]
    fn test_fixed_duration_last_image_absorbs_rest() {
        let plan = allocate(30.0, "", &images(4), Some(5.0)).unwrap();
        assert_close(&durations(&plan), &[5.0, 5.0, 5.0, 15.0]);
    }

    #[test]
    fn test_extra_images_go_to_earliest_segments() {
        let script = format!("{}[PAUSA]{}[PAUSA]{}", words(10), words(10), words(10));
        let plan = allocate(30.0, &script, &images(5), None).unwrap();

        // 2 + 2 + 1 images for three 10 s segments
        assert_close(&durations(&plan), &[5.0, 5.0, 5.0, 5.0, 10.0]);
    }

    #[test]
    fn test_short_segment_gets_floor() {
        let script = format!("{}[PAUSA]{}", words(1), words(99));
        let plan = allocate(10.0, &script, &images(2), None).unwrap();

        assert_close(&durations(&plan), &[0.5, 9.5]);
    }

    #[test]
    fn test_floor_skipped_when_audio_too_short() {
        let script = format!("{}[PAUSA]{}[PAUSA]{}", words(1), words(1), words(2));
        let plan = allocate(1.0, &script, &images(3), None).unwrap();

        assert_close(&durations(&plan), &[0.25, 0.25, 0.5]);
    }

    #[test]
    fn test_more_segments_than_images() {
        let script = format!("{}[PAUSA]{}[PAUSA]{}", words(10), words(10), words(20));
        let plan = allocate(40.0, &script, &images(2), None).unwrap();

        // Third segment has no image; its time is shared proportionally
        assert_close(&durations(&plan), &[20.0, 20.0]);
    }

    #[test]
    fn test_no_words_is_uniform() {
        let plan = allocate(9.0, "[PAUSA]\n[IMAGEM: capa]", &images(3), None).unwrap();
        assert_close(&durations(&plan), &[3.0, 3.0, 3.0]);
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(matches!(
            allocate(0.0, "a", &images(1), None),
            Err(RecapError::InvalidAudio(_))
        ));
        assert!(matches!(
            allocate(f64::NAN, "a", &images(1), None),
            Err(RecapError::InvalidAudio(_))
        ));
        assert!(matches!(
            allocate(10.0, "a", &[], None),
            Err(RecapError::NoContentImages)
        ));
    }

    #[test]
    fn test_total_matches_and_is_deterministic() {
        let script = format!(
            "{}[PAUSA]{}[PAUSA]{}[PAUSA]{}[PAUSA]{}",
            words(3),
            words(17),
            words(1),
            words(42),
            words(8)
        );

        for count in [1, 2, 4, 5, 7, 13, 40] {
            for total in [0.7, 3.3, 61.9, 1234.5] {
                let first = allocate(total, &script, &images(count), None).unwrap();
                let second = allocate(total, &script, &images(count), None).unwrap();

                assert_eq!(first, second);
                assert_eq!(first.len(), count);
                assert!((plan_total(&first) - total).abs() <= DURATION_TOLERANCE);
                assert!(first.iter().all(|e| e.duration > 0.0));
            }
        }
    }

    #[test]
    fn test_images_per_segment() {
        assert_eq!(images_per_segment(8, 2), vec![4, 4]);
        assert_eq!(images_per_segment(7, 3), vec![3, 2, 2]);
        assert_eq!(images_per_segment(2, 3), vec![1, 1, 0]);
    }
}
