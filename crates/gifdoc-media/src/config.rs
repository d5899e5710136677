//! Detection configuration.
//!
//! Every signal weight is a named field so tests can isolate one
//! signal's contribution by zeroing the others.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use gifdoc_models::clip::{MAX_CLIP_SECS, MIN_CLIP_SECS};

/// Hard cap on the frame sampling rate, independent of source fps.
pub const MAX_SAMPLE_RATE: f64 = 5.0;

/// Weights for combining per-pair change signals.
///
/// The combined score is the weighted sum of the available sub-scores
/// divided by the total active weight, so disabled signals (weight 0)
/// drop out cleanly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalWeights {
    /// Mean absolute pixel difference
    pub pixel_diff: f64,
    /// Structural similarity complement (1 - SSIM)
    pub ssim: f64,
    /// Chi-square luminance histogram distance
    pub histogram: f64,
    /// Block-motion magnitude (high-fidelity mode only)
    pub motion: f64,
}

impl Default for SignalWeights {
    fn default() -> Self {
        Self {
            pixel_diff: 1.0,
            ssim: 1.0,
            histogram: 1.0,
            motion: 1.0,
        }
    }
}

impl SignalWeights {
    /// Weights with every signal disabled. Forces fallback selection.
    pub fn disabled() -> Self {
        Self {
            pixel_diff: 0.0,
            ssim: 0.0,
            histogram: 0.0,
            motion: 0.0,
        }
    }

    /// Whether any signal is active.
    pub fn any_active(&self) -> bool {
        self.pixel_diff > 0.0 || self.ssim > 0.0 || self.histogram > 0.0 || self.motion > 0.0
    }
}

/// Weights for the aligner's compatibility score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlignerWeights {
    /// Inverse-distance temporal proximity term
    pub temporal: f64,
    /// Visual-embedding cosine similarity term
    pub embedding: f64,
    /// On-screen-text hint match term
    pub ocr: f64,
}

impl Default for AlignerWeights {
    fn default() -> Self {
        Self {
            temporal: 1.0,
            embedding: 0.5,
            ocr: 0.25,
        }
    }
}

/// Configuration for the detection core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Frame sampling rate in samples/second (clamped to [`MAX_SAMPLE_RATE`])
    pub sample_rate: f64,

    /// Search padding around a line midpoint, in seconds
    pub search_pad_secs: f64,

    /// Minimum clip length in seconds
    pub min_clip_secs: f64,

    /// Maximum clip length in seconds
    pub max_clip_secs: f64,

    /// Target clip length in seconds (clamped to [min, max])
    pub target_clip_secs: f64,

    /// Change-signal weights
    pub weights: SignalWeights,

    /// Score bonus per OCR-flagged frame inside a candidate window
    pub ocr_bonus: f64,

    /// Enable the CPU-expensive block-motion signal
    pub high_fidelity: bool,

    /// Wall-clock budget for motion scoring per line; exceeded budget
    /// degrades to pixel+histogram, never aborts
    pub motion_budget: Duration,

    /// Minimum combined score for an independent motion-peak candidate
    pub peak_threshold: f64,

    /// Detect an independent candidate pool and assign via the aligner
    pub pool_detection: bool,

    /// Aligner compatibility weights
    pub aligner: AlignerWeights,

    /// Maximum concurrently open decode passes on one video
    pub max_decode_handles: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            sample_rate: MAX_SAMPLE_RATE,
            search_pad_secs: 2.0,
            min_clip_secs: MIN_CLIP_SECS,
            max_clip_secs: MAX_CLIP_SECS,
            target_clip_secs: 3.0,
            weights: SignalWeights::default(),
            ocr_bonus: 0.05,
            high_fidelity: false,
            motion_budget: Duration::from_secs(2),
            peak_threshold: 0.4,
            pool_detection: false,
            aligner: AlignerWeights::default(),
            max_decode_handles: 2,
        }
    }
}

impl DetectorConfig {
    /// Effective sampling rate after the hard cap.
    pub fn effective_sample_rate(&self) -> f64 {
        self.sample_rate.clamp(0.5, MAX_SAMPLE_RATE)
    }

    /// Target clip length clamped into the [min, max] band.
    pub fn target_clip(&self) -> f64 {
        self.target_clip_secs
            .clamp(self.min_clip_secs, self.max_clip_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_rate_capped() {
        let config = DetectorConfig {
            sample_rate: 30.0,
            ..Default::default()
        };
        assert_eq!(config.effective_sample_rate(), MAX_SAMPLE_RATE);
    }

    #[test]
    fn test_target_clip_clamped() {
        let config = DetectorConfig {
            target_clip_secs: 10.0,
            ..Default::default()
        };
        assert_eq!(config.target_clip(), MAX_CLIP_SECS);
    }

    #[test]
    fn test_disabled_weights() {
        assert!(!SignalWeights::disabled().any_active());
        assert!(SignalWeights::default().any_active());
    }
}
