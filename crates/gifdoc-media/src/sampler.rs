//! Sparse frame sampling.
//!
//! Extracts a bounded-rate sequence of downscaled grayscale frames for
//! a time interval. Sampling is a pure read of the source: frames live
//! in a scoped temp directory that is removed when the pass ends,
//! whatever the exit path.

use std::path::Path;

use image::GrayImage;
use tokio::sync::watch;
use tracing::debug;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::config::MAX_SAMPLE_RATE;
use crate::error::{MediaError, MediaResult};

/// Width frames are downscaled to before analysis.
const ANALYSIS_WIDTH: u32 = 160;

/// One sampled frame. Ephemeral: owned by a single detection pass and
/// never persisted.
#[derive(Debug, Clone)]
pub struct FrameSample {
    /// Timestamp within the source video, in seconds
    pub timestamp: f64,

    /// Downscaled grayscale pixels
    pub luma: GrayImage,

    /// On-screen text found by the OCR collaborator, if any
    pub ocr_text: Option<String>,
}

/// Extracts frame sequences at a bounded rate.
#[derive(Debug, Clone)]
pub struct FrameSampler {
    sample_rate: f64,
}

impl FrameSampler {
    /// Create a sampler. The rate is capped at [`MAX_SAMPLE_RATE`]
    /// regardless of the source frame rate.
    pub fn new(sample_rate: f64) -> Self {
        Self {
            sample_rate: sample_rate.clamp(0.5, MAX_SAMPLE_RATE),
        }
    }

    /// Effective sampling rate.
    pub fn rate(&self) -> f64 {
        self.sample_rate
    }

    /// Sample the closed interval `[start, end]`.
    ///
    /// Returns frames in timestamp order. Sampling the same interval
    /// twice yields the same sequence. Fails with
    /// [`MediaError::UnreadableMedia`] when the interval cannot be
    /// decoded.
    pub async fn sample(
        &self,
        path: &Path,
        start: f64,
        end: f64,
        cancel: Option<watch::Receiver<bool>>,
    ) -> MediaResult<Vec<FrameSample>> {
        let start = start.max(0.0);
        if end <= start {
            return Ok(Vec::new());
        }

        let tmp = tempfile::tempdir()?;
        let pattern = tmp.path().join("frame%05d.png");

        let cmd = FfmpegCommand::new(path, &pattern)
            .seek(start)
            .duration(end - start)
            .video_filter(format!(
                "fps={:.3},scale={}:-2,format=gray",
                self.sample_rate, ANALYSIS_WIDTH
            ))
            .no_audio();

        let mut runner = FfmpegRunner::new();
        if let Some(rx) = cancel {
            runner = runner.with_cancel(rx);
        }

        runner.run(&cmd).await.map_err(|e| match e {
            MediaError::FfmpegFailed { stderr, .. } => {
                MediaError::unreadable(path, stderr.unwrap_or_default())
            }
            other => other,
        })?;

        let mut frame_paths: Vec<_> = std::fs::read_dir(tmp.path())?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("png"))
            .collect();
        frame_paths.sort();

        if frame_paths.is_empty() {
            return Err(MediaError::unreadable(
                path,
                format!("no frames decoded in [{start:.2}, {end:.2}]"),
            ));
        }

        let mut samples = Vec::with_capacity(frame_paths.len());
        for (i, frame_path) in frame_paths.iter().enumerate() {
            let img = image::open(frame_path)
                .map_err(|e| MediaError::unreadable(path, format!("bad frame image: {e}")))?;
            samples.push(FrameSample {
                timestamp: start + i as f64 / self.sample_rate,
                luma: img.to_luma8(),
                ocr_text: None,
            });
        }

        debug!(
            frames = samples.len(),
            start, end, "Sampled interval at {:.1} fps", self.sample_rate
        );

        Ok(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_is_capped() {
        assert_eq!(FrameSampler::new(60.0).rate(), MAX_SAMPLE_RATE);
        assert_eq!(FrameSampler::new(2.0).rate(), 2.0);
    }

    #[tokio::test]
    async fn test_empty_interval_yields_no_frames() {
        let sampler = FrameSampler::new(5.0);
        let frames = sampler
            .sample(Path::new("/tmp/whatever.mp4"), 10.0, 10.0, None)
            .await
            .unwrap();
        assert!(frames.is_empty());
    }
}
