//! Transcript line model.

use serde::{Deserialize, Serialize};

/// One timestamped transcript line.
///
/// Lines arrive ordered by `start_secs` from the ASR/classifier
/// collaborator. Non-instructional lines (greetings, closings) are
/// filtered out before the detection core ever sees them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptLine {
    /// Zero-based position within the transcript
    pub index: usize,

    /// Cue start in seconds
    pub start_secs: f64,

    /// Cue end in seconds
    pub end_secs: f64,

    /// Spoken text
    pub text: String,

    /// Whether the line describes an instructional step
    pub is_instructional: bool,
}

impl TranscriptLine {
    /// Create a line, clamping a reversed end time up to the start.
    pub fn new(index: usize, start_secs: f64, end_secs: f64, text: impl Into<String>) -> Self {
        Self {
            index,
            start_secs,
            end_secs: end_secs.max(start_secs),
            text: text.into(),
            is_instructional: true,
        }
    }

    /// Mark the line as non-instructional.
    pub fn non_instructional(mut self) -> Self {
        self.is_instructional = false;
        self
    }

    /// Temporal midpoint of the cue.
    pub fn midpoint(&self) -> f64 {
        (self.start_secs + self.end_secs) / 2.0
    }

    /// Cue duration in seconds.
    pub fn duration(&self) -> f64 {
        self.end_secs - self.start_secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_midpoint_and_duration() {
        let line = TranscriptLine::new(0, 10.0, 14.0, "Whisk the eggs");
        assert_eq!(line.midpoint(), 12.0);
        assert_eq!(line.duration(), 4.0);
        assert!(line.is_instructional);
    }

    #[test]
    fn test_reversed_end_clamped() {
        let line = TranscriptLine::new(1, 8.0, 5.0, "bad cue");
        assert_eq!(line.end_secs, 8.0);
        assert_eq!(line.duration(), 0.0);
    }

    #[test]
    fn test_non_instructional() {
        let line = TranscriptLine::new(0, 0.0, 2.0, "hey everyone").non_instructional();
        assert!(!line.is_instructional);
    }
}
