//! Per-line selection diagnostics and soft-failure warnings.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::clip::ClipWindow;
use crate::transcript::TranscriptLine;

/// Which selection path produced a line's clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMode {
    /// Scored search around the line's transcript timestamp
    Anchored,
    /// Assigned from an independently detected candidate pool
    PoolAligned,
    /// Deterministic midpoint-centered window
    Fallback,
}

impl SelectionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Anchored => "anchored",
            Self::PoolAligned => "pool_aligned",
            Self::Fallback => "fallback",
        }
    }
}

impl fmt::Display for SelectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Observability record for one line's clip selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineDiagnostic {
    /// Transcript line index
    pub line_index: usize,

    /// Selection path taken
    pub mode: SelectionMode,

    /// Search window start (seconds)
    pub search_start: f64,

    /// Search window end (seconds)
    pub search_end: f64,

    /// Aggregate change score of the winning window
    pub aggregate_score: f64,

    /// OCR bonus added to the winning window's score
    pub ocr_bonus: f64,

    /// Aligner compatibility score (pool-aligned selections only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compatibility: Option<f64>,
}

/// Category of a recoverable per-step failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// OCR collaborator failed or is absent; zero text bonus applied
    OcrUnavailable,
    /// Embedding collaborator failed or is absent; temporal-only match
    EmbeddingUnavailable,
    /// High-fidelity motion scoring exceeded its time budget
    MotionBudgetExceeded,
    /// Encoder failed for this clip; placeholder artifact substituted
    EncoderFailed,
    /// Change scoring failed for this line; fallback window used
    ScoringFailed,
}

impl WarningKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OcrUnavailable => "ocr_unavailable",
            Self::EmbeddingUnavailable => "embedding_unavailable",
            Self::MotionBudgetExceeded => "motion_budget_exceeded",
            Self::EncoderFailed => "encoder_failed",
            Self::ScoringFailed => "scoring_failed",
        }
    }
}

/// A warning attached to one step, or to the run as a whole when no
/// single line is at fault. Never aborts the job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepWarning {
    /// Transcript line index the warning applies to; `None` for
    /// run-scoped warnings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_index: Option<usize>,

    /// Failure category
    pub kind: WarningKind,

    /// Human-readable detail
    pub detail: String,
}

impl StepWarning {
    /// A warning attached to one transcript line.
    pub fn new(line_index: usize, kind: WarningKind, detail: impl Into<String>) -> Self {
        Self {
            line_index: Some(line_index),
            kind,
            detail: detail.into(),
        }
    }

    /// A warning covering the whole run rather than one line.
    pub fn run_scoped(kind: WarningKind, detail: impl Into<String>) -> Self {
        Self {
            line_index: None,
            kind,
            detail: detail.into(),
        }
    }
}

/// One (line, clip) pair produced by the detection core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignedStep {
    /// The instructional line
    pub line: TranscriptLine,

    /// The selected clip window
    pub clip: ClipWindow,

    /// Selection diagnostics
    pub diagnostic: LineDiagnostic,
}

/// Encoded artifact for one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepArtifact {
    /// Transcript line index
    pub line_index: usize,

    /// Encoded GIF bytes; empty when `placeholder` is set
    #[serde(skip)]
    pub bytes: Vec<u8>,

    /// True when the encoder failed and a placeholder was substituted
    pub placeholder: bool,
}

impl StepArtifact {
    /// An encoded artifact.
    pub fn encoded(line_index: usize, bytes: Vec<u8>) -> Self {
        Self {
            line_index,
            bytes,
            placeholder: false,
        }
    }

    /// A placeholder standing in for a failed encode.
    pub fn placeholder(line_index: usize) -> Self {
        Self {
            line_index,
            bytes: Vec::new(),
            placeholder: true,
        }
    }
}
