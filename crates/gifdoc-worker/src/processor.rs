//! Job processing pipeline.
//!
//! One job turns a video plus transcript into a step document:
//! parse and classify the transcript, detect one clip per line,
//! encode each clip to a GIF, assemble the document. Encoder failures
//! degrade to placeholder artifacts; only validation and cancellation
//! abort the job.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::warn;

use gifdoc_media::{
    detect_clips, Collaborators, DetectionReport, DetectorConfig, EncodeSettings, GifskiEncoder,
    MediaError, MediaResult,
};
use gifdoc_models::{AlignedStep, StepArtifact, StepWarning, TranscriptLine, WarningKind};

use crate::config::WorkerConfig;
use crate::document::{DocumentSink, HtmlDocumentSink, RenderedStep};
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::transcript::{default_classifier, instructional_lines, parse_transcript};

/// Everything needed to run one job.
#[derive(Debug, Clone)]
pub struct JobRequest {
    /// Document title
    pub title: String,
    /// Source video path
    pub video_path: PathBuf,
    /// Raw transcript text (bracketed or WebVTT)
    pub transcript: String,
    /// Output directory for the document and its artifacts
    pub output_dir: PathBuf,
    /// Detection configuration
    pub detector: DetectorConfig,
}

/// What a finished job produced.
#[derive(Debug, Clone)]
pub struct JobOutcome {
    /// Path of the assembled document
    pub document_path: PathBuf,
    /// Number of steps in the document
    pub step_count: usize,
    /// Soft failures accumulated across the run
    pub warnings: Vec<StepWarning>,
}

/// Seam over the detection core so the job layer can be exercised
/// without decoding real video.
#[async_trait]
pub trait StepDetector: Send + Sync {
    async fn detect(
        &self,
        video: &Path,
        lines: &[TranscriptLine],
        config: &DetectorConfig,
        collaborators: &Collaborators,
        cancel: watch::Receiver<bool>,
    ) -> MediaResult<DetectionReport>;
}

/// Production detector backed by [`gifdoc_media::detect_clips`].
#[derive(Debug, Default, Clone, Copy)]
pub struct MediaDetector;

#[async_trait]
impl StepDetector for MediaDetector {
    async fn detect(
        &self,
        video: &Path,
        lines: &[TranscriptLine],
        config: &DetectorConfig,
        collaborators: &Collaborators,
        cancel: watch::Receiver<bool>,
    ) -> MediaResult<DetectionReport> {
        detect_clips(video, lines, config, collaborators, cancel).await
    }
}

/// Shared state for job processing.
#[derive(Clone)]
pub struct ProcessingContext {
    pub config: WorkerConfig,
    pub collaborators: Collaborators,
    pub detector: Arc<dyn StepDetector>,
    pub sink: Arc<dyn DocumentSink>,
}

impl ProcessingContext {
    /// Context with the production detector, gifski encoder, and HTML
    /// sink.
    pub fn new(config: WorkerConfig, collaborators: Collaborators) -> Self {
        let collaborators = if collaborators.encoder.is_none() {
            collaborators.with_encoder(Arc::new(GifskiEncoder::new()))
        } else {
            collaborators
        };
        Self {
            config,
            collaborators,
            detector: Arc::new(MediaDetector),
            sink: Arc::new(HtmlDocumentSink::new()),
        }
    }

    pub fn with_detector(mut self, detector: Arc<dyn StepDetector>) -> Self {
        self.detector = detector;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn DocumentSink>) -> Self {
        self.sink = sink;
        self
    }
}

/// Run one job end to end.
///
/// `on_progress` is called with a fraction in [0, 1] at phase
/// boundaries. Returns the document path and accumulated warnings;
/// a cancellation surfaces as `WorkerError::Media(Cancelled)`.
pub async fn process_job(
    ctx: &ProcessingContext,
    logger: &JobLogger,
    request: &JobRequest,
    cancel: watch::Receiver<bool>,
    on_progress: impl Fn(f64),
) -> WorkerResult<JobOutcome> {
    logger.log_start(&format!("processing {}", request.video_path.display()));
    on_progress(0.0);

    let all_lines = parse_transcript(&request.transcript, &default_classifier)?;
    let lines = instructional_lines(&all_lines);
    if lines.is_empty() {
        return Err(WorkerError::job_failed(
            "transcript has no instructional lines",
        ));
    }
    logger.log_progress(&format!(
        "{} instructional lines of {}",
        lines.len(),
        all_lines.len()
    ));
    on_progress(0.1);

    tokio::fs::create_dir_all(&request.output_dir).await?;

    let mut config = request.detector.clone();
    config.max_decode_handles = ctx.config.max_decode_handles;

    let report = ctx
        .detector
        .detect(
            &request.video_path,
            &lines,
            &config,
            &ctx.collaborators,
            cancel.clone(),
        )
        .await?;
    let mut warnings = report.warnings.clone();
    logger.log_progress(&format!("{} clip windows selected", report.steps.len()));
    on_progress(0.5);

    let (artifacts, mut encode_warnings) = encode_steps(
        &ctx.collaborators,
        &request.video_path,
        &report.steps,
        &cancel,
    )
    .await?;
    warnings.append(&mut encode_warnings);
    on_progress(0.9);

    let mut rendered = Vec::with_capacity(artifacts.len());
    for (step, artifact) in report.steps.iter().zip(&artifacts) {
        let artifact_name = format!("step-{:02}.gif", step.line.index + 1);
        if !artifact.placeholder {
            tokio::fs::write(request.output_dir.join(&artifact_name), &artifact.bytes).await?;
        }
        rendered.push(RenderedStep {
            index: step.line.index,
            text: step.line.text.clone(),
            artifact_name,
            placeholder: artifact.placeholder,
        });
    }

    let document_path = ctx
        .sink
        .assemble(&request.title, &rendered, &request.output_dir)
        .await?;
    on_progress(1.0);

    logger.log_completion(&format!(
        "{} steps, {} warnings",
        rendered.len(),
        warnings.len()
    ));

    Ok(JobOutcome {
        document_path,
        step_count: rendered.len(),
        warnings,
    })
}

/// Encode every step's clip window.
///
/// A failed or missing encoder yields a placeholder artifact and an
/// `EncoderFailed` warning for that step alone. Cancellation between
/// steps aborts.
pub async fn encode_steps(
    collaborators: &Collaborators,
    video: &Path,
    steps: &[AlignedStep],
    cancel: &watch::Receiver<bool>,
) -> WorkerResult<(Vec<StepArtifact>, Vec<StepWarning>)> {
    let settings = EncodeSettings::default();
    let mut artifacts = Vec::with_capacity(steps.len());
    let mut warnings = Vec::new();

    for step in steps {
        if *cancel.borrow() {
            return Err(WorkerError::Media(MediaError::Cancelled));
        }

        let index = step.line.index;
        match &collaborators.encoder {
            Some(encoder) => match encoder.encode(video, &step.clip, &settings).await {
                Ok(bytes) => artifacts.push(StepArtifact::encoded(index, bytes)),
                Err(MediaError::Cancelled) => {
                    return Err(WorkerError::Media(MediaError::Cancelled));
                }
                Err(e) => {
                    warn!(line_index = index, error = %e, "Clip encoding failed");
                    warnings.push(StepWarning::new(
                        index,
                        WarningKind::EncoderFailed,
                        e.to_string(),
                    ));
                    artifacts.push(StepArtifact::placeholder(index));
                }
            },
            None => {
                warnings.push(StepWarning::new(
                    index,
                    WarningKind::EncoderFailed,
                    "no encoder configured",
                ));
                artifacts.push(StepArtifact::placeholder(index));
            }
        }
    }

    Ok((artifacts, warnings))
}
