//! Shared data models for the gifdoc pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Transcript lines and instructional steps
//! - Clip windows and change scores
//! - Per-line selection diagnostics and warnings
//! - Jobs and job state
//! - Video metadata and pre-flight validation

pub mod clip;
pub mod diagnostics;
pub mod job;
pub mod timestamp;
pub mod transcript;
pub mod video;

// Re-export common types
pub use clip::{ChangeScore, ClipSource, ClipWindow, ScoreComponents};
pub use diagnostics::{
    AlignedStep, LineDiagnostic, SelectionMode, StepArtifact, StepWarning, WarningKind,
};
pub use job::{JobId, JobRecord, JobState};
pub use timestamp::{format_seconds, parse_timestamp, TimestampError, MAX_VIDEO_DURATION_SECS};
pub use transcript::TranscriptLine;
pub use video::{VideoFormat, VideoMetadata, VideoValidationError};
