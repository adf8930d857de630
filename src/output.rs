//! Report types returned by the conversion entry points.

use crate::error::EnrichError;
use crate::pipeline::detection::{Detection, ParseMode};
use crate::pipeline::ingest::DocumentKind;
use serde::Serialize;
use std::path::PathBuf;

/// Outcome of converting one file.
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub input: PathBuf,
    /// The written `name.md`.
    pub output: PathBuf,
    pub kind: DocumentKind,
    pub mode: ParseMode,
    pub pages: usize,
    /// `![..](images/..)` references in the intermediate markdown.
    pub images_found: usize,
    pub images_enriched: usize,
    /// Per-image problems that degraded, but did not stop, the file.
    pub issues: Vec<EnrichError>,
    pub duration_ms: u64,
}

/// A file that failed as a whole.
#[derive(Debug, Clone, Serialize)]
pub struct FailedFile {
    pub path: PathBuf,
    pub error: String,
}

/// Outcome of a batch run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub succeeded: Vec<FileReport>,
    pub failed: Vec<FailedFile>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }
}

/// Result of analysing a single image without enrichment.
#[derive(Debug, Clone, Serialize)]
pub struct OcrDump {
    pub input: PathBuf,
    /// Image size as loaded.
    pub image_size: (u32, u32),
    /// Largest polygon coordinates before any rescaling.
    pub extent: (u32, u32),
    /// Detections, rescaled into the image if the extent exceeded it.
    pub detections: Vec<Detection>,
    /// Linearised text.
    pub text: String,
}
