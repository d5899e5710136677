//! Step document assembly.
//!
//! The assembler sits behind a seam so the rendered output format can
//! be swapped without touching the pipeline. The provided
//! [`HtmlDocumentSink`] writes a single self-contained HTML page
//! referencing the GIF artifacts by file name.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::info;

use crate::error::WorkerResult;

/// One step ready for document assembly.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedStep {
    /// Step number, zero-based
    pub index: usize,
    /// Instructional text
    pub text: String,
    /// Artifact file name relative to the output directory
    pub artifact_name: String,
    /// Whether the artifact is a placeholder after an encoder failure
    pub placeholder: bool,
}

/// Assembles the final step document from rendered steps.
#[async_trait]
pub trait DocumentSink: Send + Sync {
    /// Write the document into `out_dir` and return its path.
    async fn assemble(
        &self,
        title: &str,
        steps: &[RenderedStep],
        out_dir: &Path,
    ) -> WorkerResult<PathBuf>;
}

/// Minimal HTML renderer: an ordered step list with embedded GIFs and
/// inline placeholder markers.
#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlDocumentSink;

impl HtmlDocumentSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DocumentSink for HtmlDocumentSink {
    async fn assemble(
        &self,
        title: &str,
        steps: &[RenderedStep],
        out_dir: &Path,
    ) -> WorkerResult<PathBuf> {
        let mut html = String::new();
        html.push_str("<!DOCTYPE html>\n<html>\n<head>\n");
        html.push_str("<meta charset=\"utf-8\">\n");
        html.push_str(&format!("<title>{}</title>\n", escape(title)));
        html.push_str("</head>\n<body>\n");
        html.push_str(&format!("<h1>{}</h1>\n<ol>\n", escape(title)));

        for step in steps {
            html.push_str("<li>\n");
            html.push_str(&format!("<p>{}</p>\n", escape(&step.text)));
            if step.placeholder {
                html.push_str(&format!(
                    "<p class=\"placeholder\">[clip unavailable: {}]</p>\n",
                    escape(&step.artifact_name)
                ));
            } else {
                html.push_str(&format!(
                    "<img src=\"{}\" alt=\"Step {}\" loading=\"lazy\">\n",
                    escape(&step.artifact_name),
                    step.index + 1
                ));
            }
            html.push_str("</li>\n");
        }

        html.push_str("</ol>\n</body>\n</html>\n");

        let path = out_dir.join("document.html");
        tokio::fs::write(&path, html).await?;
        info!(path = %path.display(), steps = steps.len(), "Assembled step document");
        Ok(path)
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
