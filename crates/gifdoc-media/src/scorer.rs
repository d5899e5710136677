//! Frame-pair change scoring.
//!
//! Scores consecutive frame pairs with cheap whole-frame signals
//! (pixel difference, SSIM complement, histogram distance) and an
//! optional block-motion signal. The cheap signals run in parallel
//! across pairs; motion runs sequentially under a wall-clock budget
//! and degrades to `None` once the budget is spent.

use std::time::{Duration, Instant};

use image::GrayImage;
use rayon::prelude::*;
use tracing::warn;

use gifdoc_models::{ChangeScore, ScoreComponents};

use crate::config::SignalWeights;
use crate::sampler::FrameSample;

/// Number of luminance histogram bins.
const HISTOGRAM_BINS: usize = 64;

/// Side length of a motion-estimation block, in pixels.
const MOTION_BLOCK: u32 = 16;

/// Motion search radius around each block, in pixels.
const MOTION_RADIUS: i32 = 4;

// SSIM stabilizers for 8-bit luma (k1=0.01, k2=0.03, L=255).
const SSIM_C1: f64 = (0.01 * 255.0) * (0.01 * 255.0);
const SSIM_C2: f64 = (0.03 * 255.0) * (0.03 * 255.0);

/// Result of scoring a frame sequence.
#[derive(Debug, Clone)]
pub struct ScoreOutcome {
    /// One score per consecutive frame pair, in timestamp order
    pub scores: Vec<ChangeScore>,
    /// Whether the motion budget ran out before all pairs were covered
    pub motion_budget_exceeded: bool,
}

/// Scores visual change between consecutive sampled frames.
#[derive(Debug, Clone)]
pub struct ChangeScorer {
    weights: SignalWeights,
    high_fidelity: bool,
    motion_budget: Duration,
}

impl ChangeScorer {
    pub fn new(weights: SignalWeights, high_fidelity: bool, motion_budget: Duration) -> Self {
        Self {
            weights,
            high_fidelity,
            motion_budget,
        }
    }

    /// Score every consecutive pair in `frames`.
    ///
    /// Each score carries the timestamp of the later frame of its
    /// pair. Fewer than two frames yields an empty outcome.
    pub fn score(&self, frames: &[FrameSample]) -> ScoreOutcome {
        if frames.len() < 2 {
            return ScoreOutcome {
                scores: Vec::new(),
                motion_budget_exceeded: false,
            };
        }

        let mut components: Vec<ScoreComponents> = frames
            .par_windows(2)
            .map(|pair| ScoreComponents {
                pixel_diff: pixel_difference(&pair[0].luma, &pair[1].luma),
                ssim_complement: ssim_complement(&pair[0].luma, &pair[1].luma),
                histogram_distance: histogram_distance(&pair[0].luma, &pair[1].luma),
                motion: None,
            })
            .collect();

        let mut budget_exceeded = false;
        if self.high_fidelity && self.weights.motion > 0.0 {
            let deadline = Instant::now() + self.motion_budget;
            for (i, pair) in frames.windows(2).enumerate() {
                if Instant::now() >= deadline {
                    budget_exceeded = true;
                    warn!(
                        scored = i,
                        pairs = components.len(),
                        "Motion budget exhausted, remaining pairs score without motion"
                    );
                    break;
                }
                components[i].motion = Some(block_motion(&pair[0].luma, &pair[1].luma));
            }
        }

        let scores = components
            .into_iter()
            .enumerate()
            .map(|(i, c)| ChangeScore {
                timestamp: frames[i + 1].timestamp,
                score: self.combine(&c),
                components: c,
            })
            .collect();

        ScoreOutcome {
            scores,
            motion_budget_exceeded: budget_exceeded,
        }
    }

    /// Weighted sum of the available sub-scores, normalized by the
    /// total active weight.
    fn combine(&self, c: &ScoreComponents) -> f64 {
        let w = &self.weights;
        let mut sum = w.pixel_diff * c.pixel_diff
            + w.ssim * c.ssim_complement
            + w.histogram * c.histogram_distance;
        let mut total = w.pixel_diff + w.ssim + w.histogram;
        if let Some(motion) = c.motion {
            sum += w.motion * motion;
            total += w.motion;
        }
        if total <= 0.0 {
            return 0.0;
        }
        (sum / total).clamp(0.0, 1.0)
    }
}

/// Mean absolute luma difference, normalized to [0, 1].
fn pixel_difference(a: &GrayImage, b: &GrayImage) -> f64 {
    let len = a.as_raw().len().min(b.as_raw().len());
    if len == 0 {
        return 0.0;
    }
    let sum: u64 = a
        .as_raw()
        .iter()
        .zip(b.as_raw().iter())
        .map(|(&x, &y)| (x as i32 - y as i32).unsigned_abs() as u64)
        .sum();
    sum as f64 / (len as f64 * 255.0)
}

/// Global structural-similarity complement, clamped to [0, 1].
fn ssim_complement(a: &GrayImage, b: &GrayImage) -> f64 {
    let len = a.as_raw().len().min(b.as_raw().len());
    if len == 0 {
        return 0.0;
    }
    let n = len as f64;

    let mut sum_a = 0.0;
    let mut sum_b = 0.0;
    for i in 0..len {
        sum_a += a.as_raw()[i] as f64;
        sum_b += b.as_raw()[i] as f64;
    }
    let mean_a = sum_a / n;
    let mean_b = sum_b / n;

    let mut var_a = 0.0;
    let mut var_b = 0.0;
    let mut cov = 0.0;
    for i in 0..len {
        let da = a.as_raw()[i] as f64 - mean_a;
        let db = b.as_raw()[i] as f64 - mean_b;
        var_a += da * da;
        var_b += db * db;
        cov += da * db;
    }
    var_a /= n;
    var_b /= n;
    cov /= n;

    let ssim = ((2.0 * mean_a * mean_b + SSIM_C1) * (2.0 * cov + SSIM_C2))
        / ((mean_a * mean_a + mean_b * mean_b + SSIM_C1) * (var_a + var_b + SSIM_C2));

    (1.0 - ssim).clamp(0.0, 1.0)
}

/// Chi-square distance between normalized 64-bin luma histograms,
/// bounded to [0, 1].
fn histogram_distance(a: &GrayImage, b: &GrayImage) -> f64 {
    let hist_a = luma_histogram(a);
    let hist_b = luma_histogram(b);

    let mut distance = 0.0;
    for i in 0..HISTOGRAM_BINS {
        let denom = hist_a[i] + hist_b[i];
        if denom > 0.0 {
            let diff = hist_a[i] - hist_b[i];
            distance += diff * diff / denom;
        }
    }
    (distance / 2.0).clamp(0.0, 1.0)
}

fn luma_histogram(img: &GrayImage) -> [f64; HISTOGRAM_BINS] {
    let mut hist = [0.0; HISTOGRAM_BINS];
    let raw = img.as_raw();
    if raw.is_empty() {
        return hist;
    }
    let bin_width = 256 / HISTOGRAM_BINS;
    for &px in raw {
        hist[px as usize / bin_width] += 1.0;
    }
    let total = raw.len() as f64;
    for bin in hist.iter_mut() {
        *bin /= total;
    }
    hist
}

/// Mean best-match block displacement between two frames, normalized
/// by the search radius.
fn block_motion(prev: &GrayImage, curr: &GrayImage) -> f64 {
    let (w, h) = curr.dimensions();
    if prev.dimensions() != (w, h) {
        return 0.0;
    }

    let max_disp = (MOTION_RADIUS as f64) * std::f64::consts::SQRT_2;
    let mut total = 0.0;
    let mut blocks = 0u32;

    let mut by = 0;
    while by + MOTION_BLOCK <= h {
        let mut bx = 0;
        while bx + MOTION_BLOCK <= w {
            let mut best_sad = u64::MAX;
            let mut best_disp = 0.0;
            for dy in -MOTION_RADIUS..=MOTION_RADIUS {
                for dx in -MOTION_RADIUS..=MOTION_RADIUS {
                    if let Some(sad) = block_sad(prev, curr, bx, by, dx, dy) {
                        if sad < best_sad {
                            best_sad = sad;
                            best_disp = ((dx * dx + dy * dy) as f64).sqrt();
                        }
                    }
                }
            }
            if best_sad != u64::MAX {
                total += best_disp / max_disp;
                blocks += 1;
            }
            bx += MOTION_BLOCK;
        }
        by += MOTION_BLOCK;
    }

    if blocks == 0 {
        0.0
    } else {
        (total / blocks as f64).clamp(0.0, 1.0)
    }
}

/// Sum of absolute differences between the block at (bx, by) in `curr`
/// and the block shifted by (dx, dy) in `prev`. `None` when the
/// shifted block leaves the frame.
fn block_sad(prev: &GrayImage, curr: &GrayImage, bx: u32, by: u32, dx: i32, dy: i32) -> Option<u64> {
    let (w, h) = prev.dimensions();
    let sx = bx as i32 + dx;
    let sy = by as i32 + dy;
    if sx < 0 || sy < 0 {
        return None;
    }
    let (sx, sy) = (sx as u32, sy as u32);
    if sx + MOTION_BLOCK > w || sy + MOTION_BLOCK > h {
        return None;
    }

    let mut sad = 0u64;
    for row in 0..MOTION_BLOCK {
        for col in 0..MOTION_BLOCK {
            let p = prev.get_pixel(sx + col, sy + row).0[0] as i32;
            let c = curr.get_pixel(bx + col, by + row).0[0] as i32;
            sad += (p - c).unsigned_abs() as u64;
        }
    }
    Some(sad)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform_frame(ts: f64, value: u8) -> FrameSample {
        FrameSample {
            timestamp: ts,
            luma: GrayImage::from_pixel(64, 48, image::Luma([value])),
            ocr_text: None,
        }
    }

    fn scorer(weights: SignalWeights) -> ChangeScorer {
        ChangeScorer::new(weights, false, Duration::from_secs(2))
    }

    #[test]
    fn test_identical_frames_score_zero() {
        let frames = vec![uniform_frame(0.0, 128), uniform_frame(0.2, 128)];
        let outcome = scorer(SignalWeights::default()).score(&frames);
        assert_eq!(outcome.scores.len(), 1);
        assert!(outcome.scores[0].score < 1e-9);
        assert!(!outcome.motion_budget_exceeded);
    }

    #[test]
    fn test_opposite_frames_score_high() {
        let frames = vec![uniform_frame(0.0, 0), uniform_frame(0.2, 255)];
        let outcome = scorer(SignalWeights::default()).score(&frames);
        let score = &outcome.scores[0];
        assert!(score.score > 0.9, "score was {}", score.score);
        assert!((score.components.pixel_diff - 1.0).abs() < 1e-9);
        assert!((score.components.histogram_distance - 1.0).abs() < 1e-9);
        assert!(score.components.ssim_complement > 0.99);
    }

    #[test]
    fn test_score_carries_later_timestamp() {
        let frames = vec![
            uniform_frame(10.0, 0),
            uniform_frame(10.2, 50),
            uniform_frame(10.4, 100),
        ];
        let outcome = scorer(SignalWeights::default()).score(&frames);
        assert_eq!(outcome.scores.len(), 2);
        assert!((outcome.scores[0].timestamp - 10.2).abs() < 1e-9);
        assert!((outcome.scores[1].timestamp - 10.4).abs() < 1e-9);
    }

    #[test]
    fn test_single_signal_isolation() {
        let weights = SignalWeights {
            pixel_diff: 1.0,
            ssim: 0.0,
            histogram: 0.0,
            motion: 0.0,
        };
        let frames = vec![uniform_frame(0.0, 100), uniform_frame(0.2, 200)];
        let outcome = scorer(weights).score(&frames);
        let score = &outcome.scores[0];
        // With only pixel_diff active the combined score is the raw
        // pixel difference
        assert!((score.score - score.components.pixel_diff).abs() < 1e-9);
        assert!((score.components.pixel_diff - 100.0 / 255.0).abs() < 1e-9);
    }

    #[test]
    fn test_all_disabled_scores_zero() {
        let frames = vec![uniform_frame(0.0, 0), uniform_frame(0.2, 255)];
        let outcome = scorer(SignalWeights::disabled()).score(&frames);
        assert_eq!(outcome.scores[0].score, 0.0);
    }

    #[test]
    fn test_motion_budget_exhaustion() {
        let scorer = ChangeScorer::new(SignalWeights::default(), true, Duration::ZERO);
        let frames = vec![uniform_frame(0.0, 0), uniform_frame(0.2, 255)];
        let outcome = scorer.score(&frames);
        assert!(outcome.motion_budget_exceeded);
        assert!(outcome.scores[0].components.motion.is_none());
        // Degraded pairs still score from the cheap signals
        assert!(outcome.scores[0].score > 0.9);
    }

    #[test]
    fn test_motion_computed_in_high_fidelity() {
        let scorer = ChangeScorer::new(SignalWeights::default(), true, Duration::from_secs(10));
        let frames = vec![uniform_frame(0.0, 128), uniform_frame(0.2, 128)];
        let outcome = scorer.score(&frames);
        assert!(!outcome.motion_budget_exceeded);
        assert_eq!(outcome.scores[0].components.motion, Some(0.0));
    }

    #[test]
    fn test_fewer_than_two_frames() {
        let outcome = scorer(SignalWeights::default()).score(&[uniform_frame(0.0, 10)]);
        assert!(outcome.scores.is_empty());
    }
}
