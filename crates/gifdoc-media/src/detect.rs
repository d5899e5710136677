//! Detection pipeline entry point.
//!
//! Orchestrates sampling, scoring, selection, and optional pool
//! alignment into one call: exactly one clip per transcript line,
//! fully computed before returning. Soft failures degrade to fallback
//! selection and accumulate as warnings; only an unreadable source,
//! cancellation, or a broken structural invariant aborts.

use std::collections::HashSet;
use std::path::Path;

use tokio::sync::{watch, Semaphore};
use tracing::{debug, error, info, warn};

use gifdoc_models::{
    AlignedStep, ClipWindow, LineDiagnostic, SelectionMode, StepWarning, TranscriptLine,
    VideoMetadata, WarningKind,
};

use crate::aligner::{ClipTextAligner, PairSignals};
use crate::collaborators::{cosine_similarity, Collaborators};
use crate::config::DetectorConfig;
use crate::error::{MediaError, MediaResult};
use crate::probe::validate_source;
use crate::sampler::{FrameSample, FrameSampler};
use crate::scorer::ChangeScorer;
use crate::selector::EventClipSelector;

/// Everything one detection run produced.
#[derive(Debug, Clone)]
pub struct DetectionReport {
    /// One step per input line, in line order
    pub steps: Vec<AlignedStep>,
    /// Soft failures encountered along the way
    pub warnings: Vec<StepWarning>,
    /// Validated source metadata
    pub video: VideoMetadata,
}

/// Detect one clip window per transcript line.
///
/// The source is validated before any processing; an unreadable or
/// over-long video is fatal. Decode concurrency is bounded by
/// `config.max_decode_handles`, and cancellation is honored between
/// per-line searches.
pub async fn detect_clips(
    source: impl AsRef<Path>,
    lines: &[TranscriptLine],
    config: &DetectorConfig,
    collaborators: &Collaborators,
    cancel: watch::Receiver<bool>,
) -> MediaResult<DetectionReport> {
    let source = source.as_ref();
    let video = validate_source(source).await?;

    if video.duration_secs < config.min_clip_secs {
        return Err(MediaError::InvalidVideo(format!(
            "duration {:.1}s is shorter than the minimum clip length {:.1}s",
            video.duration_secs, config.min_clip_secs
        )));
    }

    info!(
        source = %source.display(),
        duration = video.duration_secs,
        lines = lines.len(),
        pool_detection = config.pool_detection,
        "Starting clip detection"
    );

    if lines.is_empty() {
        return Ok(DetectionReport {
            steps: Vec::new(),
            warnings: Vec::new(),
            video,
        });
    }

    let mut report = if config.pool_detection {
        detect_pool_aligned(source, lines, config, collaborators, &cancel, &video).await?
    } else {
        detect_anchored(source, lines, config, collaborators, &cancel, &video).await?
    };

    if let Some(warning) = ocr_unavailable(config, collaborators) {
        report.warnings.insert(0, warning);
    }

    if report.steps.len() != lines.len() {
        error!(
            steps = report.steps.len(),
            lines = lines.len(),
            "Clip count does not match line count after fallback"
        );
        return Err(MediaError::internal(
            "detection produced a step count different from the line count",
        ));
    }

    info!(
        steps = report.steps.len(),
        warnings = report.warnings.len(),
        "Clip detection complete"
    );
    Ok(report)
}

/// Per-line anchored search, data-parallel across lines with decode
/// concurrency bounded by a semaphore.
async fn detect_anchored(
    source: &Path,
    lines: &[TranscriptLine],
    config: &DetectorConfig,
    collaborators: &Collaborators,
    cancel: &watch::Receiver<bool>,
    video: &VideoMetadata,
) -> MediaResult<DetectionReport> {
    let semaphore = Semaphore::new(config.max_decode_handles.max(1));
    let sampler = FrameSampler::new(config.effective_sample_rate());
    let scorer = ChangeScorer::new(config.weights, config.high_fidelity, config.motion_budget);
    let selector = EventClipSelector::new(config);

    let tasks = lines.iter().enumerate().map(|(idx, line)| {
        let semaphore = &semaphore;
        let sampler = &sampler;
        let scorer = &scorer;
        let selector = &selector;
        let cancel = cancel.clone();
        async move {
            let _permit = semaphore
                .acquire()
                .await
                .map_err(|_| MediaError::internal("decode semaphore closed"))?;
            if *cancel.borrow() {
                return Err(MediaError::Cancelled);
            }

            let midpoint = line.midpoint();
            let search_start = (midpoint - config.search_pad_secs).max(0.0);
            let search_end = (midpoint + config.search_pad_secs).min(video.duration_secs);
            let mut warnings = Vec::new();

            let sampled = sampler
                .sample(source, search_start, search_end, Some(cancel.clone()))
                .await;

            let (window, diagnostic) = match sampled {
                Ok(mut frames) => {
                    if let Some(ocr) = &collaborators.ocr {
                        for frame in frames.iter_mut() {
                            let text = ocr.detect_text(frame).await;
                            frame.ocr_text = text;
                        }
                    }

                    let outcome = scorer.score(&frames);
                    if outcome.motion_budget_exceeded {
                        warnings.push(StepWarning::new(
                            idx,
                            WarningKind::MotionBudgetExceeded,
                            "motion scoring degraded to pixel and histogram signals",
                        ));
                    }

                    selector.select_anchored(
                        idx,
                        midpoint,
                        &outcome.scores,
                        &frames,
                        video.duration_secs,
                    )
                }
                Err(MediaError::Cancelled) => return Err(MediaError::Cancelled),
                Err(e) => {
                    warn!(
                        line_index = idx,
                        error = %e,
                        "Sampling failed, taking fallback window"
                    );
                    warnings.push(StepWarning::new(idx, WarningKind::ScoringFailed, e.to_string()));
                    let window = selector.fallback_window(midpoint, video.duration_secs);
                    let diagnostic = LineDiagnostic {
                        line_index: idx,
                        mode: SelectionMode::Fallback,
                        search_start,
                        search_end,
                        aggregate_score: 0.0,
                        ocr_bonus: 0.0,
                        compatibility: None,
                    };
                    (window, diagnostic)
                }
            };

            debug!(
                line_index = idx,
                start = window.start_secs,
                end = window.end_secs,
                mode = %diagnostic.mode,
                "Selected clip window"
            );

            Ok::<_, MediaError>((
                AlignedStep {
                    line: line.clone(),
                    clip: window,
                    diagnostic,
                },
                warnings,
            ))
        }
    });

    let results = futures::future::try_join_all(tasks).await?;

    let mut steps = Vec::with_capacity(lines.len());
    let mut warnings = Vec::new();
    for (step, step_warnings) in results {
        steps.push(step);
        warnings.extend(step_warnings);
    }

    Ok(DetectionReport {
        steps,
        warnings,
        video: video.clone(),
    })
}

/// Transcript-independent candidate pool plus aligner assignment.
///
/// One full-video sampling pass feeds both the pool detection and the
/// per-clip embedding and OCR signals. When the pool comes out smaller
/// than the line count the anchored path runs instead.
async fn detect_pool_aligned(
    source: &Path,
    lines: &[TranscriptLine],
    config: &DetectorConfig,
    collaborators: &Collaborators,
    cancel: &watch::Receiver<bool>,
    video: &VideoMetadata,
) -> MediaResult<DetectionReport> {
    let sampler = FrameSampler::new(config.effective_sample_rate());
    let scorer = ChangeScorer::new(config.weights, config.high_fidelity, config.motion_budget);
    let selector = EventClipSelector::new(config);

    if *cancel.borrow() {
        return Err(MediaError::Cancelled);
    }

    let mut warnings = Vec::new();

    let mut frames = match sampler
        .sample(source, 0.0, video.duration_secs, Some(cancel.clone()))
        .await
    {
        Ok(frames) => frames,
        Err(MediaError::Cancelled) => return Err(MediaError::Cancelled),
        Err(e) => {
            // No signal at all: every line takes its fallback window
            warn!(error = %e, "Full-video sampling failed, all lines fall back");
            let mut report = fallback_report(lines, &selector, video);
            report.warnings.insert(
                0,
                StepWarning::run_scoped(WarningKind::ScoringFailed, e.to_string()),
            );
            return Ok(report);
        }
    };

    if let Some(ocr) = &collaborators.ocr {
        for frame in frames.iter_mut() {
            let text = ocr.detect_text(frame).await;
            frame.ocr_text = text;
        }
    }

    let outcome = scorer.score(&frames);
    if outcome.motion_budget_exceeded {
        warnings.push(StepWarning::run_scoped(
            WarningKind::MotionBudgetExceeded,
            "motion scoring degraded during pool detection",
        ));
    }

    let pool = selector.detect_candidate_pool(&outcome.scores, video.duration_secs);
    debug!(pool = pool.len(), lines = lines.len(), "Detected candidate pool");

    if pool.len() < lines.len() {
        info!(
            pool = pool.len(),
            lines = lines.len(),
            "Candidate pool smaller than line count, using anchored search"
        );
        let mut report =
            detect_anchored(source, lines, config, collaborators, cancel, video).await?;
        warnings.append(&mut report.warnings);
        report.warnings = warnings;
        return Ok(report);
    }

    if *cancel.borrow() {
        return Err(MediaError::Cancelled);
    }

    // Precompute collaborator signals for the sync compatibility closure
    let (line_embeddings, clip_embeddings, embedding_warning) =
        embed_pairs(lines, &pool, &frames, collaborators).await;
    if let Some(warning) = embedding_warning {
        warnings.push(warning);
    }

    let line_tokens: Vec<HashSet<String>> = lines.iter().map(|l| tokenize(&l.text)).collect();
    let clip_tokens: Vec<HashSet<String>> = pool
        .iter()
        .map(|clip| {
            let mut tokens = HashSet::new();
            for frame in frames_in_window(&frames, clip) {
                if let Some(text) = &frame.ocr_text {
                    tokens.extend(tokenize(text));
                }
            }
            tokens
        })
        .collect();

    let aligner = ClipTextAligner::new(config.aligner);
    let assignments = aligner.align(lines, &pool, |li, ci| PairSignals {
        embedding_similarity: match (&line_embeddings[li], &clip_embeddings[ci]) {
            (Some(a), Some(b)) => Some(cosine_similarity(a, b)),
            _ => None,
        },
        ocr_match: token_overlap(&line_tokens[li], &clip_tokens[ci]),
    });

    let mut steps = Vec::with_capacity(lines.len());
    for (idx, (line, assignment)) in lines.iter().zip(assignments).enumerate() {
        let (window, diagnostic) = match assignment {
            Some(assignment) => {
                let diagnostic = LineDiagnostic {
                    line_index: idx,
                    mode: SelectionMode::PoolAligned,
                    search_start: 0.0,
                    search_end: video.duration_secs,
                    aggregate_score: assignment.clip.peak_score,
                    ocr_bonus: 0.0,
                    compatibility: Some(assignment.compatibility),
                };
                (assignment.clip, diagnostic)
            }
            None => {
                let window = selector.fallback_window(line.midpoint(), video.duration_secs);
                let diagnostic = LineDiagnostic {
                    line_index: idx,
                    mode: SelectionMode::Fallback,
                    search_start: 0.0,
                    search_end: video.duration_secs,
                    aggregate_score: 0.0,
                    ocr_bonus: 0.0,
                    compatibility: None,
                };
                (window, diagnostic)
            }
        };
        steps.push(AlignedStep {
            line: line.clone(),
            clip: window,
            diagnostic,
        });
    }

    Ok(DetectionReport {
        steps,
        warnings,
        video: video.clone(),
    })
}

/// Embed every line text and every pool clip. Any collaborator error
/// disables the embedding signal for the whole run and surfaces as a
/// single warning.
async fn embed_pairs(
    lines: &[TranscriptLine],
    pool: &[ClipWindow],
    frames: &[FrameSample],
    collaborators: &Collaborators,
) -> (
    Vec<Option<Vec<f32>>>,
    Vec<Option<Vec<f32>>>,
    Option<StepWarning>,
) {
    let embedder = match &collaborators.embedder {
        Some(embedder) => embedder,
        None => {
            return (vec![None; lines.len()], vec![None; pool.len()], None);
        }
    };

    let mut line_embeddings = Vec::with_capacity(lines.len());
    for line in lines {
        match embedder.embed_text(&line.text).await {
            Ok(embedding) => line_embeddings.push(Some(embedding)),
            Err(e) => {
                warn!(error = %e, "Text embedding failed, aligning without similarity");
                return (
                    vec![None; lines.len()],
                    vec![None; pool.len()],
                    Some(StepWarning::run_scoped(
                        WarningKind::EmbeddingUnavailable,
                        e.to_string(),
                    )),
                );
            }
        }
    }

    let mut clip_embeddings = Vec::with_capacity(pool.len());
    for clip in pool {
        let clip_frames = frames_in_window(frames, clip);
        match embedder.embed_frames(&clip_frames).await {
            Ok(embedding) => clip_embeddings.push(Some(embedding)),
            Err(e) => {
                warn!(error = %e, "Clip embedding failed, aligning without similarity");
                return (
                    vec![None; lines.len()],
                    vec![None; pool.len()],
                    Some(StepWarning::run_scoped(
                        WarningKind::EmbeddingUnavailable,
                        e.to_string(),
                    )),
                );
            }
        }
    }

    (line_embeddings, clip_embeddings, None)
}

/// Fallback windows for every line, with no scoring signal at all.
fn fallback_report(
    lines: &[TranscriptLine],
    selector: &EventClipSelector,
    video: &VideoMetadata,
) -> DetectionReport {
    let steps = lines
        .iter()
        .enumerate()
        .map(|(idx, line)| {
            let window = selector.fallback_window(line.midpoint(), video.duration_secs);
            AlignedStep {
                line: line.clone(),
                clip: window,
                diagnostic: LineDiagnostic {
                    line_index: idx,
                    mode: SelectionMode::Fallback,
                    search_start: 0.0,
                    search_end: video.duration_secs,
                    aggregate_score: 0.0,
                    ocr_bonus: 0.0,
                    compatibility: None,
                },
            }
        })
        .collect();
    DetectionReport {
        steps,
        warnings: Vec::new(),
        video: video.clone(),
    }
}

fn frames_in_window(frames: &[FrameSample], window: &ClipWindow) -> Vec<FrameSample> {
    frames
        .iter()
        .filter(|f| f.timestamp >= window.start_secs && f.timestamp <= window.end_secs)
        .cloned()
        .collect()
}

fn tokenize(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 3)
        .map(|t| t.to_lowercase())
        .collect()
}

/// On-screen text carries weight in this run but no OCR engine is
/// configured, so the text signals stay at zero.
fn ocr_unavailable(config: &DetectorConfig, collaborators: &Collaborators) -> Option<StepWarning> {
    let text_weighted = config.ocr_bonus > 0.0 || (config.pool_detection && config.aligner.ocr > 0.0);
    if text_weighted && collaborators.ocr.is_none() {
        return Some(StepWarning::run_scoped(
            WarningKind::OcrUnavailable,
            "no OCR engine configured, on-screen text signals not applied",
        ));
    }
    None
}

/// Fraction of the line's tokens present in the clip's on-screen text.
fn token_overlap(line_tokens: &HashSet<String>, clip_tokens: &HashSet<String>) -> f64 {
    if line_tokens.is_empty() || clip_tokens.is_empty() {
        return 0.0;
    }
    let hits = line_tokens.intersection(clip_tokens).count();
    hits as f64 / line_tokens.len() as f64
}
