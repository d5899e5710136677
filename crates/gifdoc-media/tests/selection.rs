//! Selection and alignment scenarios on synthetic score sequences.
//!
//! No real video is decoded here: the selector and aligner operate on
//! constructed scores and windows, so the contract can be checked
//! exactly.

use gifdoc_media::{
    AlignerWeights, ClipTextAligner, DetectorConfig, EventClipSelector, PairSignals,
    SignalWeights,
};
use gifdoc_models::{ChangeScore, ClipSource, ClipWindow, ScoreComponents, TranscriptLine};

fn score_at(timestamp: f64, score: f64) -> ChangeScore {
    ChangeScore {
        timestamp,
        score,
        components: ScoreComponents::default(),
    }
}

fn line(index: usize, start: f64, end: f64) -> TranscriptLine {
    TranscriptLine::new(index, start, end, format!("step {index}"))
}

#[test]
fn every_line_gets_a_valid_window() {
    let config = DetectorConfig::default();
    let selector = EventClipSelector::new(&config);
    let duration = 600.0;

    let scores: Vec<ChangeScore> = (0..3000)
        .map(|i| score_at(i as f64 * 0.2, ((i % 7) as f64) / 10.0))
        .collect();

    let midpoints = [0.5, 1.0, 45.0, 299.7, 450.2, 599.0, 599.9];
    for (idx, &midpoint) in midpoints.iter().enumerate() {
        let (window, _) = selector.select_anchored(idx, midpoint, &scores, &[], duration);
        assert!(
            window.is_valid_for(duration),
            "window {:?} invalid for midpoint {midpoint}",
            (window.start_secs, window.end_secs)
        );
        assert!(window.duration() >= 2.0 - 1e-9 && window.duration() <= 4.0 + 1e-9);
    }
}

#[test]
fn disabled_signals_yield_exact_fallback_windows() {
    // 600s video, midpoints [1, 300, 590], no usable signal anywhere
    let config = DetectorConfig {
        weights: SignalWeights::disabled(),
        ..Default::default()
    };
    let selector = EventClipSelector::new(&config);

    let expected = [
        (1.0, (0.0, 3.0)),
        (300.0, (298.5, 301.5)),
        (590.0, (588.5, 591.5)),
    ];
    for (idx, (midpoint, bounds)) in expected.iter().enumerate() {
        let (window, _) = selector.select_anchored(idx, *midpoint, &[], &[], 600.0);
        assert_eq!(window.source, ClipSource::FallbackUniform);
        assert_eq!((window.start_secs, window.end_secs), *bounds);
    }
}

#[test]
fn boundary_midpoints_stay_inside_the_video() {
    let selector = EventClipSelector::new(&DetectorConfig::default());
    let duration = 120.0;

    for midpoint in [0.0, 0.5, 1.0, 119.0, 119.5, 120.0] {
        let window = selector.fallback_window(midpoint, duration);
        assert!(window.start_secs >= 0.0);
        assert!(window.end_secs <= duration);
        assert!((window.duration() - 3.0).abs() < 1e-9);
    }
}

#[test]
fn repeated_selection_is_deterministic() {
    let selector = EventClipSelector::new(&DetectorConfig::default());
    let scores: Vec<ChangeScore> = (0..200)
        .map(|i| score_at(i as f64 * 0.2, ((i * 13 % 11) as f64) / 10.0))
        .collect();

    let baseline: Vec<ClipWindow> = (0..5)
        .map(|idx| {
            selector
                .select_anchored(idx, 10.0 + idx as f64 * 6.0, &scores, &[], 60.0)
                .0
        })
        .collect();

    for _ in 0..10 {
        let again: Vec<ClipWindow> = (0..5)
            .map(|idx| {
                selector
                    .select_anchored(idx, 10.0 + idx as f64 * 6.0, &scores, &[], 60.0)
                    .0
            })
            .collect();
        assert_eq!(baseline, again);
    }
}

#[test]
fn aligner_weighted_sum_scenario() {
    // Two candidates for one line: visually similar but distant, vs
    // dissimilar but adjacent. The configured weights decide, and the
    // expected scores are computed by hand.
    let weights = AlignerWeights {
        temporal: 1.0,
        embedding: 0.5,
        ocr: 0.25,
    };
    let aligner = ClipTextAligner::new(weights);

    let lines = vec![line(0, 99.0, 101.0)]; // midpoint 100
    let pool = vec![
        ClipWindow::new(148.5, 151.5, 0.8, ClipSource::MotionDetected), // mid 150
        ClipWindow::new(100.5, 103.5, 0.6, ClipSource::MotionDetected), // mid 102
    ];

    let sims = [0.9, 0.2];
    let result = aligner.align(&lines, &pool, |_, ci| PairSignals {
        embedding_similarity: Some(sims[ci]),
        ocr_match: 0.0,
    });

    let far_similar = 1.0 / (1.0 + 50.0) + 0.5 * 0.9;
    let near_dissimilar = 1.0 / (1.0 + 2.0) + 0.5 * 0.2;
    assert!(far_similar > near_dissimilar);

    let assignment = result[0].as_ref().unwrap();
    assert_eq!(assignment.clip, pool[0]);
    assert!((assignment.compatibility - far_similar).abs() < 1e-9);
}

#[test]
fn aligner_mapping_is_injective_under_many_lines() {
    let aligner = ClipTextAligner::new(AlignerWeights::default());
    let lines: Vec<TranscriptLine> = (0..8)
        .map(|i| line(i, i as f64 * 20.0, i as f64 * 20.0 + 3.0))
        .collect();
    let pool: Vec<ClipWindow> = (0..10)
        .map(|i| {
            ClipWindow::new(
                i as f64 * 15.0,
                i as f64 * 15.0 + 3.0,
                0.5,
                ClipSource::MotionDetected,
            )
        })
        .collect();

    let result = aligner.align(&lines, &pool, |_, _| PairSignals::default());

    assert_eq!(result.len(), lines.len());
    let mut seen: Vec<(u64, u64)> = Vec::new();
    for assignment in result.iter().flatten() {
        let key = (
            assignment.clip.start_secs.to_bits(),
            assignment.clip.end_secs.to_bits(),
        );
        assert!(!seen.contains(&key), "clip assigned to two lines");
        seen.push(key);
    }
    // Pool is larger than the line count: every line gets a clip
    assert!(result.iter().all(|a| a.is_some()));
}

#[test]
fn pool_candidates_do_not_overlap_heavily() {
    let selector = EventClipSelector::new(&DetectorConfig::default());
    let scores: Vec<ChangeScore> = (0..500)
        .map(|i| {
            let t = i as f64 * 0.2;
            // Bursts of change every 10 seconds
            let s = if (t % 10.0) < 0.4 { 0.9 } else { 0.1 };
            score_at(t, s)
        })
        .collect();

    let pool = selector.detect_candidate_pool(&scores, 100.0);
    assert!(!pool.is_empty());
    for pair in pool.windows(2) {
        assert!(pair[0].start_secs < pair[1].start_secs);
        assert!(
            pair[0].overlap_fraction(&pair[1]) < 0.5,
            "adjacent pool windows overlap too much"
        );
    }
}
