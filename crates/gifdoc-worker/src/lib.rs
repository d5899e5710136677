//! Step document worker.
//!
//! This crate provides:
//! - Transcript parsing and instructional classification
//! - The job processing pipeline (detect, encode, assemble)
//! - An in-process job runner with cancellation and graceful shutdown
//! - HTML step-document assembly

pub mod config;
pub mod document;
pub mod error;
pub mod logging;
pub mod processor;
pub mod runner;
pub mod transcript;

pub use config::WorkerConfig;
pub use document::{DocumentSink, HtmlDocumentSink, RenderedStep};
pub use error::{WorkerError, WorkerResult};
pub use logging::{init_tracing, JobLogger};
pub use processor::{
    encode_steps, process_job, JobOutcome, JobRequest, MediaDetector, ProcessingContext,
    StepDetector,
};
pub use runner::JobRunner;
pub use transcript::{default_classifier, instructional_lines, parse_transcript};
