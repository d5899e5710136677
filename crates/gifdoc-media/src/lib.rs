#![deny(unreachable_patterns)]
//! Clip detection and encoding core.
//!
//! This crate provides:
//! - FFprobe metadata probing and source validation
//! - Type-safe FFmpeg command building with cancellation support
//! - Sparse grayscale frame sampling
//! - Frame-pair change scoring (pixel, SSIM, histogram, block motion)
//! - Anchored, fallback, and pool-based clip window selection
//! - Greedy clip-text alignment
//! - Looping GIF encoding via gifski

pub mod aligner;
pub mod collaborators;
pub mod command;
pub mod config;
pub mod detect;
pub mod error;
pub mod gif_encoder;
pub mod probe;
pub mod sampler;
pub mod scorer;
pub mod selector;

pub use aligner::{temporal_proximity, Assignment, ClipTextAligner, PairSignals};
pub use collaborators::{
    cosine_similarity, ClipEncoder, Collaborators, EmbeddingProvider, EncodeSettings, NoopOcr,
    OcrEngine, TARGET_ARTIFACT_MAX_BYTES, TARGET_ARTIFACT_MIN_BYTES,
};
pub use command::{FfmpegCommand, FfmpegRunner};
pub use config::{AlignerWeights, DetectorConfig, SignalWeights, MAX_SAMPLE_RATE};
pub use detect::{detect_clips, DetectionReport};
pub use error::{MediaError, MediaResult};
pub use gif_encoder::GifskiEncoder;
pub use probe::{probe_video, validate_source};
pub use sampler::{FrameSample, FrameSampler};
pub use scorer::{ChangeScorer, ScoreOutcome};
pub use selector::{fit_window, EventClipSelector};
