//! Error types for the edgequake-doc2md library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Doc2MdError`] — **Fatal** for the current unit of work: one file in a
//!   batch, or the whole run when the top-level input path is missing.
//!   Returned as `Err(Doc2MdError)` from the `convert*` functions.
//!
//! * [`EnrichError`] — **Non-fatal**: a single image reference could not be
//!   fully enriched (unreadable file, OCR or captioning failure) but the rest
//!   of the document is fine. Stored inside [`crate::output::FileReport`]
//!   so callers can inspect degraded output instead of losing the file.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-doc2md library.
///
/// Per-image failures use [`EnrichError`] and never surface here.
#[derive(Debug, Error)]
pub enum Doc2MdError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input path does not exist.
    #[error("Input path not found: '{path}'")]
    InputNotFound { path: PathBuf },

    /// File extension is outside the supported set.
    #[error("Unsupported file type '{extension}' for '{path}'")]
    UnsupportedType { path: PathBuf, extension: String },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// pdfium-render returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Place libpdfium next to the binary, install it system-wide, or set PDFIUM_LIB_PATH."
    )]
    PdfiumBindingFailed(String),

    // ── Office / image errors ─────────────────────────────────────────────
    /// LibreOffice could not convert an Office document to PDF.
    #[error("Office conversion failed for '{path}': {detail}")]
    OfficeConversionFailed { path: PathBuf, detail: String },

    /// An input image could not be decoded.
    #[error("Failed to decode image '{path}': {detail}")]
    ImageDecode { path: PathBuf, detail: String },

    // ── Collaborator errors ───────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The LLM API returned an error after all retries.
    #[error("LLM API error: {message}")]
    LlmApiError { message: String },

    /// A single VLM call exceeded the configured timeout.
    #[error("API call timed out after {secs}s")]
    ApiTimeout { secs: u64 },

    /// The layout/OCR analysis returned something that is not a detection set.
    #[error("Layout analysis failed: {detail}")]
    AnalysisFailed { detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output Markdown file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Any other filesystem failure, tagged with the path involved.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Doc2MdError {
    /// Wrap an `io::Error` with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Doc2MdError::Io {
            path: path.into(),
            source,
        }
    }
}

/// A non-fatal error for a single image reference.
///
/// The reference is either left untouched ([`EnrichError::UnreadableImage`])
/// or enriched with a placeholder in place of the failed part.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum EnrichError {
    /// The referenced image could not be loaded; the markdown reference was kept.
    #[error("{file}: image could not be read: {detail}")]
    UnreadableImage { file: String, detail: String },

    /// OCR re-analysis failed; the OCR section holds the no-text placeholder.
    #[error("{file}: OCR failed: {detail}")]
    OcrFailed { file: String, detail: String },

    /// Captioning failed; the caption section holds the failure marker.
    #[error("{file}: captioning failed: {detail}")]
    CaptionFailed { file: String, detail: String },
}

impl EnrichError {
    /// Whether the reference was left in place as markdown image syntax.
    pub fn left_unmodified(&self) -> bool {
        matches!(self, EnrichError::UnreadableImage { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_type_display() {
        let e = Doc2MdError::UnsupportedType {
            path: PathBuf::from("notes.txt"),
            extension: ".txt".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains(".txt"), "got: {msg}");
        assert!(msg.contains("notes.txt"), "got: {msg}");
    }

    #[test]
    fn api_timeout_display() {
        let e = Doc2MdError::ApiTimeout { secs: 30 };
        assert!(e.to_string().contains("30s"));
    }

    #[test]
    fn io_helper_keeps_path() {
        let e = Doc2MdError::io("/tmp/x", std::io::Error::other("boom"));
        let msg = e.to_string();
        assert!(msg.contains("/tmp/x"));
        assert!(msg.contains("boom"));
    }

    #[test]
    fn only_unreadable_image_leaves_reference() {
        let unreadable = EnrichError::UnreadableImage {
            file: "a.png".into(),
            detail: "missing".into(),
        };
        let caption = EnrichError::CaptionFailed {
            file: "a.png".into(),
            detail: "503".into(),
        };
        assert!(unreadable.left_unmodified());
        assert!(!caption.left_unmodified());
    }
}
