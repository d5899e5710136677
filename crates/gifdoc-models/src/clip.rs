//! Clip windows and change scores.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Minimum selectable clip length in seconds.
pub const MIN_CLIP_SECS: f64 = 2.0;

/// Maximum selectable clip length in seconds.
pub const MAX_CLIP_SECS: f64 = 4.0;

/// How a clip window was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClipSource {
    /// Best-scoring window near a transcript timestamp
    TranscriptAnchored,
    /// Motion peak detected independently of the transcript
    MotionDetected,
    /// Deterministic window centered on the line midpoint
    FallbackUniform,
}

impl ClipSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TranscriptAnchored => "transcript_anchored",
            Self::MotionDetected => "motion_detected",
            Self::FallbackUniform => "fallback_uniform",
        }
    }
}

impl fmt::Display for ClipSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A 2-4 second interval selected as visually representative of one
/// instructional step. Immutable once selected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipWindow {
    /// Window start in seconds
    pub start_secs: f64,

    /// Window end in seconds
    pub end_secs: f64,

    /// Aggregate change score of the winning window (0 for fallback)
    pub peak_score: f64,

    /// Selection provenance
    pub source: ClipSource,
}

impl ClipWindow {
    pub fn new(start_secs: f64, end_secs: f64, peak_score: f64, source: ClipSource) -> Self {
        Self {
            start_secs,
            end_secs,
            peak_score,
            source,
        }
    }

    /// Window length in seconds.
    pub fn duration(&self) -> f64 {
        self.end_secs - self.start_secs
    }

    /// Temporal midpoint of the window.
    pub fn midpoint(&self) -> f64 {
        (self.start_secs + self.end_secs) / 2.0
    }

    /// Fraction of this window overlapped by `other`, relative to the
    /// shorter of the two.
    pub fn overlap_fraction(&self, other: &ClipWindow) -> f64 {
        let overlap = (self.end_secs.min(other.end_secs) - self.start_secs.max(other.start_secs))
            .max(0.0);
        let shorter = self.duration().min(other.duration());
        if shorter > 0.0 {
            overlap / shorter
        } else {
            0.0
        }
    }

    /// Whether the window satisfies the selection invariants for a
    /// video of the given duration.
    pub fn is_valid_for(&self, video_duration: f64) -> bool {
        let len = self.duration();
        self.start_secs >= 0.0
            && self.end_secs <= video_duration + 1e-6
            && len >= MIN_CLIP_SECS - 1e-6
            && len <= MAX_CLIP_SECS + 1e-6
    }
}

/// Per-signal breakdown of one change score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct ScoreComponents {
    /// Mean absolute pixel difference, normalized by frame area
    pub pixel_diff: f64,

    /// 1 - SSIM between the pair
    pub ssim_complement: f64,

    /// Chi-square luminance histogram distance, normalized
    pub histogram_distance: f64,

    /// Block-motion magnitude (high-fidelity mode only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub motion: Option<f64>,
}

/// Normalized dissimilarity between two adjacent frame samples,
/// aligned to the timestamp of the later sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeScore {
    /// Timestamp of the later frame in the pair
    pub timestamp: f64,

    /// Combined weighted score in [0, 1]
    pub score: f64,

    /// Individual sub-scores
    pub components: ScoreComponents,
}
