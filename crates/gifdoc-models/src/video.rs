//! Video metadata and pre-flight validation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::timestamp::MAX_VIDEO_DURATION_SECS;

/// Container formats accepted for input videos.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoFormat {
    Mp4,
    Mov,
    Webm,
}

impl VideoFormat {
    /// Derive the format from a file extension, if accepted.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "mp4" => Some(Self::Mp4),
            "mov" => Some(Self::Mov),
            "webm" => Some(Self::Webm),
            _ => None,
        }
    }

    /// Derive the format from a file path's extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::Mov => "mov",
            Self::Webm => "webm",
        }
    }
}

impl fmt::Display for VideoFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Pre-flight validation failure for an input video.
///
/// These are fatal: nothing downstream runs until the source passes.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum VideoValidationError {
    #[error("Video duration {duration:.1}s exceeds the {max:.0}s limit")]
    DurationExceeded { duration: f64, max: f64 },

    #[error("Video duration is zero or unreadable")]
    EmptyDuration,

    #[error("Unsupported container format: {0}")]
    UnsupportedFormat(String),
}

/// Probed metadata for a decodable media source.
///
/// Immutable handle: the pipeline never mutates the underlying file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoMetadata {
    /// Path to the source file
    pub path: PathBuf,

    /// Duration in seconds
    pub duration_secs: f64,

    /// Source frame rate (fps)
    pub fps: f64,

    /// Width in pixels
    pub width: u32,

    /// Height in pixels
    pub height: u32,

    /// Container format
    pub format: VideoFormat,
}

impl VideoMetadata {
    /// Validate the source against pipeline constraints.
    ///
    /// Must be called before any downstream stage runs.
    pub fn validate(&self) -> Result<(), VideoValidationError> {
        if self.duration_secs <= 0.0 {
            return Err(VideoValidationError::EmptyDuration);
        }
        if self.duration_secs > MAX_VIDEO_DURATION_SECS {
            return Err(VideoValidationError::DurationExceeded {
                duration: self.duration_secs,
                max: MAX_VIDEO_DURATION_SECS,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(duration: f64) -> VideoMetadata {
        VideoMetadata {
            path: PathBuf::from("/tmp/in.mp4"),
            duration_secs: duration,
            fps: 30.0,
            width: 1280,
            height: 720,
            format: VideoFormat::Mp4,
        }
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(VideoFormat::from_extension("MP4"), Some(VideoFormat::Mp4));
        assert_eq!(VideoFormat::from_extension("webm"), Some(VideoFormat::Webm));
        assert_eq!(VideoFormat::from_extension("avi"), None);
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(
            VideoFormat::from_path(Path::new("clips/demo.mov")),
            Some(VideoFormat::Mov)
        );
        assert_eq!(VideoFormat::from_path(Path::new("noext")), None);
    }

    #[test]
    fn test_validate_duration() {
        assert!(meta(600.0).validate().is_ok());
        assert!(meta(900.0).validate().is_ok());
        assert!(matches!(
            meta(901.0).validate(),
            Err(VideoValidationError::DurationExceeded { .. })
        ));
        assert!(matches!(
            meta(0.0).validate(),
            Err(VideoValidationError::EmptyDuration)
        ));
    }
}
