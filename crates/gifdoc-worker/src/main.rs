//! Step document worker binary.
//!
//! Usage: gifdoc-worker <video> <transcript> <output-dir> [title]

use std::path::PathBuf;

use tracing::{error, info};

use gifdoc_media::{Collaborators, DetectorConfig};
use gifdoc_worker::{
    init_tracing, JobRequest, JobRunner, ProcessingContext, WorkerConfig,
};
use gifdoc_models::JobState;

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();
    init_tracing();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 4 {
        eprintln!("usage: {} <video> <transcript> <output-dir> [title]", args[0]);
        std::process::exit(2);
    }

    let video_path = PathBuf::from(&args[1]);
    let transcript_path = PathBuf::from(&args[2]);
    let output_dir = PathBuf::from(&args[3]);
    let title = args
        .get(4)
        .cloned()
        .unwrap_or_else(|| "Step document".to_string());

    let transcript = match tokio::fs::read_to_string(&transcript_path).await {
        Ok(content) => content,
        Err(e) => {
            error!(path = %transcript_path.display(), "Failed to read transcript: {}", e);
            std::process::exit(1);
        }
    };

    let config = WorkerConfig::from_env();
    info!("Starting gifdoc-worker");
    info!("Worker config: {:?}", config);

    let ctx = ProcessingContext::new(config, Collaborators::new());
    let runner = JobRunner::new(ctx);

    let request = JobRequest {
        title,
        video_path,
        transcript,
        output_dir,
        detector: DetectorConfig::default(),
    };

    let job_id = runner.submit(request).await;
    let mut updates = match runner.subscribe(&job_id).await {
        Some(rx) => rx,
        None => {
            error!("Job vanished after submission");
            std::process::exit(1);
        }
    };

    let outcome = loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break updates.borrow().clone();
                }
                let record = updates.borrow_and_update().clone();
                if record.state.is_terminal() {
                    break record;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal");
                runner.cancel(&job_id).await;
                runner.shutdown().await;
                break updates.borrow().clone();
            }
        }
    };

    match outcome.state {
        JobState::Done => {
            info!(
                job_id = %job_id,
                warnings = outcome.warnings.len(),
                "Document generated"
            );
        }
        state => {
            error!(
                job_id = %job_id,
                state = %state,
                error = outcome.error_message.as_deref().unwrap_or("unknown"),
                "Job did not complete"
            );
            std::process::exit(1);
        }
    }
}
