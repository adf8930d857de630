//! Pipeline stages for document-to-Markdown conversion.
//!
//! Each submodule implements one transformation step, so each can be tested
//! on its own and the model-backed collaborators can be swapped for fakes.
//!
//! ## Data Flow
//!
//! ```text
//! file ──▶ ingest ──▶ layout ──▶ markdown ──▶ scan ──▶ enrich ──▶ postprocess
//!          (pdfium,    (VLM →     (dump +      (refs)   (OCR +     (cleanup)
//!           soffice,   detections) crops)               caption)
//!           image)
//! ```
//!
//! 1. [`ingest`]   — pick a route by extension; rasterise PDFs in
//!    `spawn_blocking`, read their text layer, convert Office files to PDF
//! 2. [`layout`]   — detection sets from the analysis collaborator
//! 3. [`order`]    — reading order, bounding extent, working-resolution fit
//! 4. [`markdown`] — render detections to markdown, crop figures to `images/`
//! 5. [`scan`]     — locate `![..](images/..)` references with their spans
//! 6. [`enrich`]   — replace each reference with caption + OCR text, right to left
//! 7. [`postprocess`] — whitespace normalisation of model text and the final file
//!
//! [`llm`] and [`encode`] are shared by the two VLM-backed collaborators,
//! [`layout::VlmLayoutAnalyzer`] and [`caption::VlmCaptioner`].

pub mod caption;
pub mod detection;
pub mod encode;
pub mod enrich;
pub mod ingest;
pub mod layout;
pub mod llm;
pub mod markdown;
pub mod order;
pub mod postprocess;
pub mod scan;
