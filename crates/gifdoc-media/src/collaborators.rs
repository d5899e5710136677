//! External collaborator seams.
//!
//! OCR, visual embeddings, and clip encoding are injected behind
//! object-safe traits. Every collaborator is optional: detection
//! degrades to its signal-free paths when one is absent, and
//! collaborator failures are soft by contract.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use gifdoc_models::ClipWindow;

use crate::error::MediaResult;
use crate::sampler::FrameSample;

/// Lower edge of the preferred encoded-artifact size, in bytes.
pub const TARGET_ARTIFACT_MIN_BYTES: usize = 100_000;

/// Upper edge of the preferred encoded-artifact size, in bytes.
pub const TARGET_ARTIFACT_MAX_BYTES: usize = 300_000;

/// On-screen text detection.
///
/// Infallible by contract: an engine that cannot read a frame returns
/// `None` rather than an error.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn detect_text(&self, frame: &FrameSample) -> Option<String>;
}

/// OCR engine that never detects anything. Stands in when no real
/// engine is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopOcr;

#[async_trait]
impl OcrEngine for NoopOcr {
    async fn detect_text(&self, _frame: &FrameSample) -> Option<String> {
        None
    }
}

/// Text and clip embedding for the aligner's similarity term.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a transcript line's text.
    async fn embed_text(&self, text: &str) -> MediaResult<Vec<f32>>;

    /// Embed the visual content of a clip's sampled frames.
    async fn embed_frames(&self, frames: &[FrameSample]) -> MediaResult<Vec<f32>>;
}

/// Cosine similarity between two embedding vectors, 0.0 for empty or
/// mismatched inputs.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let mut dot = 0.0_f64;
    let mut norm_a = 0.0_f64;
    let mut norm_b = 0.0_f64;
    for (&x, &y) in a.iter().zip(b.iter()) {
        dot += x as f64 * y as f64;
        norm_a += x as f64 * x as f64;
        norm_b += y as f64 * y as f64;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom > 0.0 {
        dot / denom
    } else {
        0.0
    }
}

/// Settings for encoding one clip window to a looping artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeSettings {
    /// Output frame rate
    pub fps: u32,
    /// Output width in pixels; source width when `None`
    pub width: Option<u32>,
    /// Encoder quality, 1-100
    pub quality: u8,
}

impl Default for EncodeSettings {
    fn default() -> Self {
        Self {
            fps: 15,
            width: None,
            quality: 80,
        }
    }
}

/// Renders a selected clip window to encoded bytes.
#[async_trait]
pub trait ClipEncoder: Send + Sync {
    async fn encode(
        &self,
        video: &Path,
        window: &ClipWindow,
        settings: &EncodeSettings,
    ) -> MediaResult<Vec<u8>>;
}

/// The set of injected collaborators for one detection run.
#[derive(Default, Clone)]
pub struct Collaborators {
    pub ocr: Option<Arc<dyn OcrEngine>>,
    pub embedder: Option<Arc<dyn EmbeddingProvider>>,
    pub encoder: Option<Arc<dyn ClipEncoder>>,
}

impl Collaborators {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ocr(mut self, ocr: Arc<dyn OcrEngine>) -> Self {
        self.ocr = Some(ocr);
        self
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn with_encoder(mut self, encoder: Arc<dyn ClipEncoder>) -> Self {
        self.encoder = Some(encoder);
        self
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators")
            .field("ocr", &self.ocr.is_some())
            .field("embedder", &self.embedder.is_some())
            .field("encoder", &self.encoder.is_some())
            .finish()
    }
}
