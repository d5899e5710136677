//! Clip–text alignment.
//!
//! Assigns transcript lines to candidate clips by a weighted
//! compatibility score, greedily from the highest-compatibility pair
//! down. The mapping is injective over clips; lines left without a
//! clip are the caller's to fall back on.

use tracing::debug;

use gifdoc_models::{ClipWindow, TranscriptLine};

use crate::config::AlignerWeights;

/// Collaborator-derived signals for one (line, clip) pair.
#[derive(Debug, Clone, Copy, Default)]
pub struct PairSignals {
    /// Cosine similarity between the line text embedding and the clip
    /// embedding; `None` when the embedding collaborator is absent or
    /// failed
    pub embedding_similarity: Option<f64>,

    /// On-screen-text hint match in [0, 1]
    pub ocr_match: f64,
}

/// A line-to-clip assignment with its compatibility score.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub line_index: usize,
    pub clip: ClipWindow,
    pub compatibility: f64,
}

/// Inverse-distance proximity between a line midpoint and a clip
/// midpoint, in (0, 1].
pub fn temporal_proximity(line_mid: f64, clip_mid: f64) -> f64 {
    1.0 / (1.0 + (line_mid - clip_mid).abs())
}

/// Greedy bipartite matcher between transcript lines and a clip pool.
#[derive(Debug, Clone)]
pub struct ClipTextAligner {
    weights: AlignerWeights,
}

impl ClipTextAligner {
    pub fn new(weights: AlignerWeights) -> Self {
        Self { weights }
    }

    /// Weighted compatibility of one (line, clip) pair.
    ///
    /// A missing embedding signal contributes zero, degrading the
    /// score to its temporal and OCR terms.
    pub fn compatibility(&self, line_mid: f64, clip: &ClipWindow, signals: PairSignals) -> f64 {
        self.weights.temporal * temporal_proximity(line_mid, clip.midpoint())
            + self.weights.embedding * signals.embedding_similarity.unwrap_or(0.0)
            + self.weights.ocr * signals.ocr_match
    }

    /// Assign each line its best non-conflicting clip.
    ///
    /// `signals` is consulted once per (line index, pool index) pair.
    /// The result is line-ordered; `None` marks a line no clip was
    /// left for. No clip appears in more than one assignment.
    pub fn align(
        &self,
        lines: &[TranscriptLine],
        pool: &[ClipWindow],
        signals: impl Fn(usize, usize) -> PairSignals,
    ) -> Vec<Option<Assignment>> {
        let mut pairs: Vec<(f64, usize, usize)> = Vec::with_capacity(lines.len() * pool.len());
        for (li, line) in lines.iter().enumerate() {
            for (ci, clip) in pool.iter().enumerate() {
                let score = self.compatibility(line.midpoint(), clip, signals(li, ci));
                pairs.push((score, li, ci));
            }
        }

        // Highest compatibility first; ties by earlier line, then
        // earlier clip start
        pairs.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.1.cmp(&b.1))
                .then_with(|| {
                    pool[a.2]
                        .start_secs
                        .partial_cmp(&pool[b.2].start_secs)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
        });

        let mut assignments: Vec<Option<Assignment>> = vec![None; lines.len()];
        let mut clip_taken = vec![false; pool.len()];
        for (score, li, ci) in pairs {
            if assignments[li].is_some() || clip_taken[ci] {
                continue;
            }
            clip_taken[ci] = true;
            assignments[li] = Some(Assignment {
                line_index: li,
                clip: pool[ci].clone(),
                compatibility: score,
            });
        }

        let assigned = assignments.iter().filter(|a| a.is_some()).count();
        debug!(
            lines = lines.len(),
            pool = pool.len(),
            assigned,
            "Aligned transcript lines to candidate pool"
        );

        assignments
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gifdoc_models::ClipSource;

    fn line(index: usize, start: f64, end: f64) -> TranscriptLine {
        TranscriptLine::new(index, start, end, format!("step {index}"))
    }

    fn clip(start: f64, end: f64) -> ClipWindow {
        ClipWindow::new(start, end, 0.5, ClipSource::MotionDetected)
    }

    #[test]
    fn test_weighted_sum_decides_winner() {
        // Clip A: far but visually similar (0.9); clip B: adjacent but
        // dissimilar (0.2). Under the default temporal 1.0 / embedding
        // 0.5 weights, B's proximity term dominates.
        let aligner = ClipTextAligner::new(AlignerWeights::default());
        let lines = vec![line(0, 99.0, 101.0)]; // midpoint 100
        let pool = vec![clip(128.5, 131.5), clip(99.5, 102.5)]; // mids 130, 101

        let sims = [0.9, 0.2];
        let result = aligner.align(&lines, &pool, |_, ci| PairSignals {
            embedding_similarity: Some(sims[ci]),
            ocr_match: 0.0,
        });

        let expected_a = 1.0 / 31.0 + 0.5 * 0.9;
        let expected_b = 1.0 / 2.0 + 0.5 * 0.2;
        assert!(expected_b > expected_a);

        let assignment = result[0].as_ref().unwrap();
        assert_eq!(assignment.clip, pool[1]);
        assert!((assignment.compatibility - expected_b).abs() < 1e-9);
    }

    #[test]
    fn test_embedding_weight_can_overcome_proximity() {
        let weights = AlignerWeights {
            temporal: 1.0,
            embedding: 2.0,
            ocr: 0.0,
        };
        let aligner = ClipTextAligner::new(weights);
        let lines = vec![line(0, 99.0, 101.0)];
        let pool = vec![clip(128.5, 131.5), clip(99.5, 102.5)];

        let sims = [0.9, 0.2];
        let result = aligner.align(&lines, &pool, |_, ci| PairSignals {
            embedding_similarity: Some(sims[ci]),
            ocr_match: 0.0,
        });

        // 1/31 + 1.8 beats 1/2 + 0.4
        assert_eq!(result[0].as_ref().unwrap().clip, pool[0]);
    }

    #[test]
    fn test_missing_embedding_degrades_to_temporal() {
        let aligner = ClipTextAligner::new(AlignerWeights::default());
        let lines = vec![line(0, 9.0, 11.0)];
        let pool = vec![clip(8.5, 11.5)];

        let result = aligner.align(&lines, &pool, |_, _| PairSignals::default());
        let assignment = result[0].as_ref().unwrap();
        assert!((assignment.compatibility - temporal_proximity(10.0, 10.0)).abs() < 1e-9);
    }

    #[test]
    fn test_mapping_is_injective() {
        let aligner = ClipTextAligner::new(AlignerWeights::default());
        let lines: Vec<_> = (0..4).map(|i| line(i, i as f64 * 30.0, i as f64 * 30.0 + 2.0)).collect();
        let pool = vec![clip(0.0, 3.0), clip(30.0, 33.0), clip(60.0, 63.0)];

        let result = aligner.align(&lines, &pool, |_, _| PairSignals::default());

        let mut used: Vec<&ClipWindow> = Vec::new();
        for assignment in result.iter().flatten() {
            assert!(!used.contains(&&assignment.clip), "clip assigned twice");
            used.push(&assignment.clip);
        }
        // Three clips for four lines: exactly one line left unassigned
        assert_eq!(result.iter().filter(|a| a.is_none()).count(), 1);
    }

    #[test]
    fn test_output_is_line_ordered() {
        let aligner = ClipTextAligner::new(AlignerWeights::default());
        let lines = vec![line(0, 5.0, 7.0), line(1, 50.0, 52.0)];
        let pool = vec![clip(49.5, 52.5), clip(4.5, 7.5)];

        let result = aligner.align(&lines, &pool, |_, _| PairSignals::default());
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].as_ref().unwrap().line_index, 0);
        assert_eq!(result[0].as_ref().unwrap().clip, pool[1]);
        assert_eq!(result[1].as_ref().unwrap().clip, pool[0]);
    }

    #[test]
    fn test_empty_pool_assigns_nothing() {
        let aligner = ClipTextAligner::new(AlignerWeights::default());
        let lines = vec![line(0, 5.0, 7.0)];
        let result = aligner.align(&lines, &[], |_, _| PairSignals::default());
        assert_eq!(result, vec![None]);
    }
}
