//! In-process job registry and execution.
//!
//! Jobs run as spawned tasks behind a concurrency semaphore. Each job
//! owns a pair of watch channels: one publishing its [`JobRecord`] to
//! subscribers, one carrying the cooperative cancellation signal into
//! the pipeline.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{watch, Mutex, Semaphore};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use gifdoc_models::{JobId, JobRecord};

use crate::error::WorkerError;
use crate::logging::JobLogger;
use crate::processor::{process_job, JobRequest, ProcessingContext};

struct JobHandle {
    record_rx: watch::Receiver<JobRecord>,
    cancel_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Runs jobs and tracks their lifecycle.
pub struct JobRunner {
    ctx: Arc<ProcessingContext>,
    semaphore: Arc<Semaphore>,
    jobs: Mutex<HashMap<JobId, JobHandle>>,
}

impl JobRunner {
    pub fn new(ctx: ProcessingContext) -> Arc<Self> {
        let semaphore = Arc::new(Semaphore::new(ctx.config.max_concurrent_jobs.max(1)));
        Arc::new(Self {
            ctx: Arc::new(ctx),
            semaphore,
            jobs: Mutex::new(HashMap::new()),
        })
    }

    /// Queue a job and return its id immediately.
    ///
    /// The job starts once a concurrency permit is free; its record
    /// moves Queued → Running → Done/Failed/Cancelled.
    pub async fn submit(self: &Arc<Self>, request: JobRequest) -> JobId {
        let id = JobId::new();
        let (record_tx, record_rx) = watch::channel(JobRecord::new(id.clone()));
        let (cancel_tx, cancel_rx) = watch::channel(false);

        let runner = Arc::clone(self);
        let job_id = id.clone();
        let task = tokio::spawn(async move {
            runner.run_job(job_id, request, record_tx, cancel_rx).await;
        });

        self.jobs.lock().await.insert(
            id.clone(),
            JobHandle {
                record_rx,
                cancel_tx,
                task,
            },
        );

        info!(job_id = %id, "Job submitted");
        id
    }

    /// Current record of a job, if known.
    pub async fn record(&self, id: &JobId) -> Option<JobRecord> {
        let jobs = self.jobs.lock().await;
        jobs.get(id).map(|h| h.record_rx.borrow().clone())
    }

    /// Subscribe to a job's record updates.
    pub async fn subscribe(&self, id: &JobId) -> Option<watch::Receiver<JobRecord>> {
        let jobs = self.jobs.lock().await;
        jobs.get(id).map(|h| h.record_rx.clone())
    }

    /// Request cooperative cancellation of a running job.
    ///
    /// Returns whether the job was known and not yet terminal.
    pub async fn cancel(&self, id: &JobId) -> bool {
        let jobs = self.jobs.lock().await;
        match jobs.get(id) {
            Some(handle) if !handle.record_rx.borrow().state.is_terminal() => {
                info!(job_id = %id, "Cancellation requested");
                handle.cancel_tx.send_replace(true);
                true
            }
            _ => false,
        }
    }

    /// Drain in-flight jobs, cancelling whatever outlives the
    /// shutdown timeout.
    pub async fn shutdown(&self) {
        let handles: Vec<(JobId, JobHandle)> = self.jobs.lock().await.drain().collect();
        if handles.is_empty() {
            return;
        }

        info!(jobs = handles.len(), "Draining jobs before shutdown");

        let mut tasks = Vec::with_capacity(handles.len());
        for (id, handle) in handles {
            tasks.push((id, handle.cancel_tx, handle.task));
        }

        let drain = async {
            for (_, _, task) in &mut tasks {
                let _ = task.await;
            }
        };

        if tokio::time::timeout(self.ctx.config.shutdown_timeout, drain)
            .await
            .is_err()
        {
            warn!("Shutdown timeout reached, cancelling remaining jobs");
            for (id, cancel_tx, task) in &mut tasks {
                if !task.is_finished() {
                    warn!(job_id = %id, "Cancelling job at shutdown");
                    cancel_tx.send_replace(true);
                }
            }
            // Handles drained before the timeout are already consumed
            for (_, _, task) in &mut tasks {
                if !task.is_finished() {
                    let _ = task.await;
                }
            }
        }

        info!("All jobs drained");
    }

    async fn run_job(
        &self,
        id: JobId,
        request: JobRequest,
        record_tx: watch::Sender<JobRecord>,
        cancel_rx: watch::Receiver<bool>,
    ) {
        let permit = match self.semaphore.acquire().await {
            Ok(permit) => permit,
            Err(_) => {
                let record = record_tx.borrow().clone();
                record_tx.send_replace(record.fail("worker shutting down"));
                return;
            }
        };

        if *cancel_rx.borrow() {
            let record = record_tx.borrow().clone();
            record_tx.send_replace(record.cancel());
            drop(permit);
            return;
        }

        let record = record_tx.borrow().clone();
        record_tx.send_replace(record.start());

        let logger = JobLogger::new(&id, "document_generation");
        let progress_tx = record_tx.clone();
        let on_progress = move |fraction: f64| {
            let record = progress_tx.borrow().clone();
            progress_tx.send_replace(record.with_progress((fraction * 100.0) as u8));
        };

        let result = tokio::time::timeout(
            self.ctx.config.job_timeout,
            process_job(&self.ctx, &logger, &request, cancel_rx, on_progress),
        )
        .await;

        let record = record_tx.borrow().clone();
        let finished = match result {
            Ok(Ok(outcome)) => {
                let mut record = record;
                for warning in outcome.warnings {
                    record = record.with_warning(warning);
                }
                record.complete()
            }
            Ok(Err(e)) if e.is_cancellation() => {
                logger.log_warning("job cancelled");
                record.cancel()
            }
            Ok(Err(e)) => {
                logger.log_error(&e.to_string());
                record.fail(e.to_string())
            }
            Err(_) => {
                let e = WorkerError::job_failed(format!(
                    "timed out after {}s",
                    self.ctx.config.job_timeout.as_secs()
                ));
                logger.log_error(&e.to_string());
                record.fail(e.to_string())
            }
        };
        record_tx.send_replace(finished);

        drop(permit);
    }
}
