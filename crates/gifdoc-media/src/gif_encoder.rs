//! Looping GIF encoding via gifski.
//!
//! Frames are extracted with ffmpeg into a scoped temp directory and
//! handed to gifski for palette-optimized encoding. The temp directory
//! is dropped on every exit path.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use gifdoc_models::ClipWindow;

use crate::collaborators::{
    ClipEncoder, EncodeSettings, TARGET_ARTIFACT_MAX_BYTES, TARGET_ARTIFACT_MIN_BYTES,
};
use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

/// Encodes clip windows to looping GIFs with ffmpeg + gifski.
#[derive(Debug, Default, Clone, Copy)]
pub struct GifskiEncoder;

impl GifskiEncoder {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ClipEncoder for GifskiEncoder {
    async fn encode(
        &self,
        video: &Path,
        window: &ClipWindow,
        settings: &EncodeSettings,
    ) -> MediaResult<Vec<u8>> {
        which::which("gifski").map_err(|_| MediaError::GifskiNotFound)?;

        let tmp = tempfile::tempdir()?;
        let pattern = tmp.path().join("frame%05d.png");

        let mut filter = format!("fps={}", settings.fps);
        if let Some(width) = settings.width {
            filter.push_str(&format!(",scale={width}:-2"));
        }

        let extract = FfmpegCommand::new(video, &pattern)
            .seek(window.start_secs)
            .duration(window.duration())
            .video_filter(filter)
            .pixel_format("rgb24")
            .no_audio();
        FfmpegRunner::new().run(&extract).await?;

        let mut frames: Vec<_> = std::fs::read_dir(tmp.path())?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("png"))
            .collect();
        frames.sort();

        if frames.is_empty() {
            return Err(MediaError::unreadable(
                video,
                format!(
                    "no frames extracted for [{:.2}, {:.2}]",
                    window.start_secs, window.end_secs
                ),
            ));
        }

        let gif_path = tmp.path().join("clip.gif");
        let output = Command::new("gifski")
            .arg("--fps")
            .arg(settings.fps.to_string())
            .arg("--quality")
            .arg(settings.quality.to_string())
            .arg("-o")
            .arg(&gif_path)
            .args(&frames)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            return Err(MediaError::internal(format!(
                "gifski failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let bytes = std::fs::read(&gif_path)?;
        if bytes.len() < TARGET_ARTIFACT_MIN_BYTES || bytes.len() > TARGET_ARTIFACT_MAX_BYTES {
            warn!(
                size = bytes.len(),
                start = window.start_secs,
                end = window.end_secs,
                "Encoded GIF outside the preferred size band"
            );
        }

        debug!(
            size = bytes.len(),
            frames = frames.len(),
            start = window.start_secs,
            "Encoded clip window"
        );

        Ok(bytes)
    }
}
