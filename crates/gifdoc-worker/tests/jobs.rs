//! Job lifecycle scenarios with stubbed detection and encoding.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;

use gifdoc_media::{
    ClipEncoder, Collaborators, DetectionReport, DetectorConfig, EncodeSettings, MediaError,
    MediaResult,
};
use gifdoc_models::{
    AlignedStep, ClipSource, ClipWindow, JobState, LineDiagnostic, SelectionMode, TranscriptLine,
    VideoFormat, VideoMetadata, WarningKind,
};
use gifdoc_worker::{
    JobRequest, JobRunner, ProcessingContext, StepDetector, WorkerConfig,
};

const TRANSCRIPT: &str = "\
[00:00:05] Cut the dough in half
[00:00:15] Fold each piece twice
[00:00:25] Press the seam closed
";

fn stub_metadata(path: &Path) -> VideoMetadata {
    VideoMetadata {
        path: path.to_path_buf(),
        duration_secs: 60.0,
        fps: 30.0,
        width: 1280,
        height: 720,
        format: VideoFormat::Mp4,
    }
}

/// Detector that selects a deterministic window per line without
/// touching the file system.
struct StubDetector;

#[async_trait]
impl StepDetector for StubDetector {
    async fn detect(
        &self,
        video: &Path,
        lines: &[TranscriptLine],
        _config: &DetectorConfig,
        _collaborators: &Collaborators,
        _cancel: watch::Receiver<bool>,
    ) -> MediaResult<DetectionReport> {
        let steps = lines
            .iter()
            .enumerate()
            .map(|(idx, line)| {
                let mid = line.midpoint();
                AlignedStep {
                    line: line.clone(),
                    clip: ClipWindow::new(mid - 1.5, mid + 1.5, 0.5, ClipSource::TranscriptAnchored),
                    diagnostic: LineDiagnostic {
                        line_index: idx,
                        mode: SelectionMode::Anchored,
                        search_start: mid - 2.0,
                        search_end: mid + 2.0,
                        aggregate_score: 0.5,
                        ocr_bonus: 0.0,
                        compatibility: None,
                    },
                }
            })
            .collect();
        Ok(DetectionReport {
            steps,
            warnings: Vec::new(),
            video: stub_metadata(video),
        })
    }
}

/// Detector that blocks until cancelled.
struct BlockingDetector;

#[async_trait]
impl StepDetector for BlockingDetector {
    async fn detect(
        &self,
        _video: &Path,
        _lines: &[TranscriptLine],
        _config: &DetectorConfig,
        _collaborators: &Collaborators,
        mut cancel: watch::Receiver<bool>,
    ) -> MediaResult<DetectionReport> {
        loop {
            if *cancel.borrow_and_update() {
                return Err(MediaError::Cancelled);
            }
            if cancel.changed().await.is_err() {
                return Err(MediaError::Cancelled);
            }
        }
    }
}

/// Encoder that fails for the window near 17s and succeeds elsewhere.
struct FlakyEncoder;

#[async_trait]
impl ClipEncoder for FlakyEncoder {
    async fn encode(
        &self,
        _video: &Path,
        window: &ClipWindow,
        _settings: &EncodeSettings,
    ) -> MediaResult<Vec<u8>> {
        if (window.midpoint() - 17.0).abs() < 0.5 {
            return Err(MediaError::internal("simulated encoder crash"));
        }
        Ok(vec![0u8; 1024])
    }
}

fn request(output_dir: PathBuf) -> JobRequest {
    JobRequest {
        title: "Bread".to_string(),
        video_path: PathBuf::from("/tmp/bread.mp4"),
        transcript: TRANSCRIPT.to_string(),
        output_dir,
        detector: DetectorConfig::default(),
    }
}

async fn wait_terminal(runner: &Arc<JobRunner>, id: &gifdoc_models::JobId) -> gifdoc_models::JobRecord {
    let mut updates = runner.subscribe(id).await.expect("job registered");
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            {
                let record = updates.borrow_and_update().clone();
                if record.state.is_terminal() {
                    return record;
                }
            }
            updates.changed().await.expect("record channel open");
        }
    })
    .await
    .expect("job reached a terminal state")
}

#[tokio::test]
async fn encoder_failure_keeps_job_done_with_placeholder() {
    let dir = tempfile::tempdir().unwrap();

    let collaborators = Collaborators::new().with_encoder(Arc::new(FlakyEncoder));
    let ctx = ProcessingContext::new(WorkerConfig::default(), collaborators)
        .with_detector(Arc::new(StubDetector));
    let runner = JobRunner::new(ctx);

    let id = runner.submit(request(dir.path().to_path_buf())).await;
    let record = wait_terminal(&runner, &id).await;

    assert_eq!(record.state, JobState::Done);
    assert_eq!(record.warnings.len(), 1);
    assert_eq!(record.warnings[0].kind, WarningKind::EncoderFailed);
    assert_eq!(record.warnings[0].line_index, Some(1));

    // The failed step has no artifact file, the others do
    assert!(dir.path().join("step-01.gif").exists());
    assert!(!dir.path().join("step-02.gif").exists());
    assert!(dir.path().join("step-03.gif").exists());

    let html = std::fs::read_to_string(dir.path().join("document.html")).unwrap();
    assert!(html.contains("Cut the dough in half"));
    assert!(html.contains("clip unavailable"));
}

#[tokio::test]
async fn clean_run_completes_without_warnings() {
    struct OkEncoder;

    #[async_trait]
    impl ClipEncoder for OkEncoder {
        async fn encode(
            &self,
            _video: &Path,
            _window: &ClipWindow,
            _settings: &EncodeSettings,
        ) -> MediaResult<Vec<u8>> {
            Ok(vec![0u8; 2048])
        }
    }

    let dir = tempfile::tempdir().unwrap();
    let collaborators = Collaborators::new().with_encoder(Arc::new(OkEncoder));
    let ctx = ProcessingContext::new(WorkerConfig::default(), collaborators)
        .with_detector(Arc::new(StubDetector));
    let runner = JobRunner::new(ctx);

    let id = runner.submit(request(dir.path().to_path_buf())).await;
    let record = wait_terminal(&runner, &id).await;

    assert_eq!(record.state, JobState::Done);
    assert_eq!(record.progress, 100);
    assert!(record.warnings.is_empty());
    assert!(record.started_at.is_some());
    assert!(record.completed_at.is_some());
    assert!(dir.path().join("document.html").exists());
}

#[tokio::test]
async fn cancellation_reaches_terminal_cancelled_state() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = ProcessingContext::new(WorkerConfig::default(), Collaborators::new())
        .with_detector(Arc::new(BlockingDetector));
    let runner = JobRunner::new(ctx);

    let id = runner.submit(request(dir.path().to_path_buf())).await;

    // Let the job get past the queued state before cancelling
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(runner.cancel(&id).await);

    let record = wait_terminal(&runner, &id).await;
    assert_eq!(record.state, JobState::Cancelled);
    assert!(!dir.path().join("document.html").exists());
}

#[tokio::test]
async fn unknown_job_is_not_cancellable() {
    let ctx = ProcessingContext::new(WorkerConfig::default(), Collaborators::new());
    let runner = JobRunner::new(ctx);
    assert!(!runner.cancel(&gifdoc_models::JobId::new()).await);
}

#[tokio::test]
async fn transcript_without_instructions_fails_the_job() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = ProcessingContext::new(WorkerConfig::default(), Collaborators::new())
        .with_detector(Arc::new(StubDetector));
    let runner = JobRunner::new(ctx);

    let mut req = request(dir.path().to_path_buf());
    req.transcript = "[00:00:01] Welcome back everyone\n[00:00:30] Thanks for watching\n".to_string();

    let id = runner.submit(req).await;
    let record = wait_terminal(&runner, &id).await;

    assert_eq!(record.state, JobState::Failed);
    assert!(record
        .error_message
        .as_deref()
        .unwrap_or_default()
        .contains("instructional"));
}
