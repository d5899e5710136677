//! Clip window selection.
//!
//! Three selection paths share one geometric primitive, [`fit_window`]:
//! anchored search around a transcript timestamp, deterministic
//! fallback, and transcript-independent candidate-pool detection.
//! Whatever path runs, the caller gets exactly one window per line.

use tracing::debug;

use gifdoc_models::{ChangeScore, ClipSource, ClipWindow, LineDiagnostic, SelectionMode};

use crate::config::DetectorConfig;
use crate::sampler::FrameSample;

/// Place a window of `len` seconds centered on `center` inside
/// `[0, duration]`.
///
/// The window is shifted into bounds rather than shortened; it only
/// shrinks when the video itself is shorter than `len`.
pub fn fit_window(center: f64, len: f64, duration: f64) -> (f64, f64) {
    if duration <= len {
        return (0.0, duration.max(0.0));
    }
    let mut start = center - len / 2.0;
    if start < 0.0 {
        start = 0.0;
    } else if start + len > duration {
        start = duration - len;
    }
    (start, start + len)
}

/// One anchored-search candidate, kept for tie-breaking.
struct Candidate {
    start: f64,
    end: f64,
    aggregate: f64,
    ocr_bonus: f64,
    peak: f64,
}

/// Selects clip windows from scored frame sequences.
#[derive(Debug, Clone)]
pub struct EventClipSelector {
    search_pad_secs: f64,
    min_clip_secs: f64,
    target_clip_secs: f64,
    ocr_bonus: f64,
    peak_threshold: f64,
}

impl EventClipSelector {
    pub fn new(config: &DetectorConfig) -> Self {
        Self {
            search_pad_secs: config.search_pad_secs,
            min_clip_secs: config.min_clip_secs,
            target_clip_secs: config.target_clip(),
            ocr_bonus: config.ocr_bonus,
            peak_threshold: config.peak_threshold,
        }
    }

    /// Deterministic signal-free window centered on the line midpoint.
    ///
    /// Pure arithmetic; always yields a window, even when the video is
    /// shorter than the target length.
    pub fn fallback_window(&self, midpoint: f64, video_duration: f64) -> ClipWindow {
        let (start, end) = fit_window(midpoint, self.target_clip_secs, video_duration);
        ClipWindow::new(start, end, 0.0, ClipSource::FallbackUniform)
    }

    /// Pick the best-scoring window near a line's midpoint.
    ///
    /// Falls back to [`Self::fallback_window`] when the search band
    /// carries no scores or is shorter than the minimum clip length.
    pub fn select_anchored(
        &self,
        line_index: usize,
        midpoint: f64,
        scores: &[ChangeScore],
        frames: &[FrameSample],
        video_duration: f64,
    ) -> (ClipWindow, LineDiagnostic) {
        let search_start = (midpoint - self.search_pad_secs).max(0.0);
        let search_end = (midpoint + self.search_pad_secs).min(video_duration);

        let in_band: Vec<&ChangeScore> = scores
            .iter()
            .filter(|s| s.timestamp >= search_start && s.timestamp <= search_end)
            .collect();

        if in_band.is_empty() || search_end - search_start < self.min_clip_secs {
            debug!(
                line_index,
                scores = in_band.len(),
                "No usable signal in search band, taking fallback window"
            );
            let window = self.fallback_window(midpoint, video_duration);
            let diagnostic = LineDiagnostic {
                line_index,
                mode: SelectionMode::Fallback,
                search_start,
                search_end,
                aggregate_score: 0.0,
                ocr_bonus: 0.0,
                compatibility: None,
            };
            return (window, diagnostic);
        }

        let mut best: Option<Candidate> = None;
        for anchor in &in_band {
            let (start, end) = fit_window(anchor.timestamp, self.target_clip_secs, video_duration);
            let candidate = self.evaluate(start, end, scores, frames);
            let better = match &best {
                None => true,
                Some(current) => Self::beats(&candidate, current, midpoint),
            };
            if better {
                best = Some(candidate);
            }
        }

        // in_band is non-empty, so a candidate always exists
        let winner = match best {
            Some(c) => c,
            None => {
                let window = self.fallback_window(midpoint, video_duration);
                return (
                    window,
                    LineDiagnostic {
                        line_index,
                        mode: SelectionMode::Fallback,
                        search_start,
                        search_end,
                        aggregate_score: 0.0,
                        ocr_bonus: 0.0,
                        compatibility: None,
                    },
                );
            }
        };

        let window = ClipWindow::new(
            winner.start,
            winner.end,
            winner.peak,
            ClipSource::TranscriptAnchored,
        );
        let diagnostic = LineDiagnostic {
            line_index,
            mode: SelectionMode::Anchored,
            search_start,
            search_end,
            aggregate_score: winner.aggregate,
            ocr_bonus: winner.ocr_bonus,
            compatibility: None,
        };
        (window, diagnostic)
    }

    /// Detect transcript-independent candidate windows at local score
    /// maxima above the peak threshold.
    ///
    /// Overlapping candidates (≥ 50% overlap) are deduplicated in
    /// favor of the higher peak. Output is sorted by start time.
    pub fn detect_candidate_pool(
        &self,
        scores: &[ChangeScore],
        video_duration: f64,
    ) -> Vec<ClipWindow> {
        let mut peaks: Vec<&ChangeScore> = Vec::new();
        for (i, s) in scores.iter().enumerate() {
            if s.score <= self.peak_threshold {
                continue;
            }
            let rises = i == 0 || scores[i - 1].score < s.score;
            let falls = i + 1 == scores.len() || scores[i + 1].score <= s.score;
            if rises && falls {
                peaks.push(s);
            }
        }

        // Higher peaks claim their neighborhood first
        peaks.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(
                    a.timestamp
                        .partial_cmp(&b.timestamp)
                        .unwrap_or(std::cmp::Ordering::Equal),
                )
        });

        let mut pool: Vec<ClipWindow> = Vec::new();
        for peak in peaks {
            let (start, end) = fit_window(peak.timestamp, self.target_clip_secs, video_duration);
            let window = ClipWindow::new(start, end, peak.score, ClipSource::MotionDetected);
            if pool.iter().all(|kept| kept.overlap_fraction(&window) < 0.5) {
                pool.push(window);
            }
        }

        pool.sort_by(|a, b| {
            a.start_secs
                .partial_cmp(&b.start_secs)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        pool
    }

    fn evaluate(
        &self,
        start: f64,
        end: f64,
        scores: &[ChangeScore],
        frames: &[FrameSample],
    ) -> Candidate {
        let mut aggregate = 0.0;
        let mut peak = 0.0_f64;
        for s in scores {
            if s.timestamp >= start && s.timestamp <= end {
                aggregate += s.score;
                peak = peak.max(s.score);
            }
        }

        let flagged = frames
            .iter()
            .filter(|f| {
                f.timestamp >= start
                    && f.timestamp <= end
                    && f.ocr_text.as_deref().is_some_and(|t| !t.trim().is_empty())
            })
            .count();
        let ocr_bonus = self.ocr_bonus * flagged as f64;

        Candidate {
            start,
            end,
            aggregate: aggregate + ocr_bonus,
            ocr_bonus,
            peak,
        }
    }

    /// Candidate ordering: aggregate score, then proximity to the line
    /// midpoint, then earlier start.
    fn beats(candidate: &Candidate, current: &Candidate, midpoint: f64) -> bool {
        if (candidate.aggregate - current.aggregate).abs() > 1e-9 {
            return candidate.aggregate > current.aggregate;
        }
        let cand_dist = ((candidate.start + candidate.end) / 2.0 - midpoint).abs();
        let curr_dist = ((current.start + current.end) / 2.0 - midpoint).abs();
        if (cand_dist - curr_dist).abs() > 1e-9 {
            return cand_dist < curr_dist;
        }
        candidate.start < current.start
    }
}
