//! # edgequake-doc2md
//!
//! Convert PDFs, Office documents and images to Markdown, with every figure
//! replaced by a model-written description and the text recognised inside it.
//!
//! ## Pipeline Overview
//!
//! ```text
//! file
//!  │
//!  ├─ 1. Ingest    route by extension: PDF (text or OCR mode), Office → PDF, image
//!  ├─ 2. Analyse   layout/OCR collaborator → detections per page
//!  ├─ 3. Dump      detections in reading order → markdown, figures → images/
//!  ├─ 4. Scan      find every ![..](images/..) reference with its byte span
//!  ├─ 5. Enrich    right to left: OCR the figure + caption it, replace the span
//!  └─ 6. Output    normalised output/<name>.md, _temp/<name>/ removed
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_doc2md::{convert_path, ConversionConfig, Session};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let session = Session::from_config(ConversionConfig::default())?;
//!     let report = convert_path("./resource", "output", &session).await?;
//!     eprintln!("{} converted, {} failed", report.succeeded.len(), report.failed.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Bringing your own models
//!
//! The layout analyzer and the captioner are traits. Implement
//! [`LayoutAnalyzer`] and [`Captioner`] and hand them to
//! [`Session::with_collaborators`] to run the pipeline against local models.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `doc2md` binary (clap + anyhow + indicatif + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod session;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionConfig, ConversionConfigBuilder};
pub use convert::{collect_inputs, convert_file, convert_path, ocr_image};
pub use error::{Doc2MdError, EnrichError};
pub use output::{BatchReport, FailedFile, FileReport, OcrDump};
pub use pipeline::caption::Captioner;
pub use pipeline::detection::{Category, Detection, ParseMode, Point, Polygon};
pub use pipeline::enrich::{enrich_markdown, enrichment_block, Enrichment};
pub use pipeline::ingest::{DocumentKind, SUPPORTED_EXTENSIONS};
pub use pipeline::layout::LayoutAnalyzer;
pub use pipeline::order::{bounding_extent, linearize, reading_order};
pub use pipeline::scan::{scan_image_refs, ImageRef};
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback};
pub use session::Session;
