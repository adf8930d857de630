//! Document ingestion: file kind detection, PDF classification and page
//! rasterisation, PDF text layer, Office → PDF, image loading.
//!
//! ## Why spawn_blocking?
//!
//! `pdfium-render` wraps the pdfium C++ library, which keeps thread-local
//! state and is CPU-bound. All pdfium work runs inside
//! `tokio::task::spawn_blocking` so the runtime's worker threads never stall.
//!
//! ## Page size
//!
//! Pages are rendered at `dpi`, then shrunk so the longest edge is at most
//! `max_rendered_pixels`. An A0 poster at 150 DPI would otherwise produce a
//! 7,000 × 10,000 px image.

use crate::config::ConversionConfig;
use crate::error::Doc2MdError;
use crate::pipeline::detection::{Category, Detection, ParseMode, Polygon};
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

/// Extensions accepted in batch mode, lowercase, without the dot.
pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "jpg", "jpeg", "png", "bmp", "tiff", "tif",
];

/// Ingestion route chosen from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Pdf,
    /// Word, Excel or PowerPoint; converted to PDF first.
    Office,
    Image,
}

impl DocumentKind {
    /// Case-insensitive lookup of an extension without the dot.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(DocumentKind::Pdf),
            "doc" | "docx" | "xls" | "xlsx" | "ppt" | "pptx" => Some(DocumentKind::Office),
            "jpg" | "jpeg" | "png" | "bmp" | "tiff" | "tif" => Some(DocumentKind::Image),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, Doc2MdError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        Self::from_extension(ext).ok_or_else(|| Doc2MdError::UnsupportedType {
            path: path.to_path_buf(),
            extension: format!(".{ext}"),
        })
    }
}

/// One rasterised PDF page.
pub struct RenderedPage {
    /// 1-based page number.
    pub number: usize,
    pub image: DynamicImage,
    /// Text-layer segments in image pixel space. Empty in OCR mode.
    pub text_layer: Vec<Detection>,
}

/// A loaded PDF: how it should be analysed, and its pages.
pub struct PdfPages {
    pub mode: ParseMode,
    pub pages: Vec<RenderedPage>,
}

/// Load a PDF, classify it and render every page.
///
/// `force_ocr` skips classification; converted Office documents use it.
pub async fn load_pdf(
    path: &Path,
    config: &ConversionConfig,
    force_ocr: bool,
) -> Result<PdfPages, Doc2MdError> {
    let path = path.to_path_buf();
    let password = config.password.clone();
    let dpi = config.dpi;
    let max_pixels = config.max_rendered_pixels;
    let threshold = config.min_text_chars_per_page;

    tokio::task::spawn_blocking(move || {
        load_pdf_blocking(
            &path,
            password.as_deref(),
            dpi,
            max_pixels,
            threshold,
            force_ocr,
        )
    })
    .await
    .map_err(|e| Doc2MdError::Internal(format!("PDF task panicked: {}", e)))?
}

fn load_pdf_blocking(
    path: &Path,
    password: Option<&str>,
    dpi: u32,
    max_pixels: u32,
    threshold: usize,
    force_ocr: bool,
) -> Result<PdfPages, Doc2MdError> {
    let pdfium = bind_pdfium()?;
    let document = pdfium
        .load_pdf_from_file(path, password)
        .map_err(|e| map_open_error(path, password.is_some(), e))?;

    let pages = document.pages();
    let total = pages.len() as usize;

    let mode = if force_ocr {
        ParseMode::Ocr
    } else {
        let mut chars = 0usize;
        for page in pages.iter() {
            if let Ok(text) = page.text() {
                chars += text.all().chars().filter(|c| !c.is_whitespace()).count();
            }
        }
        classify_by_density(chars, total, threshold)
    };
    info!("PDF loaded: {} pages, {} mode", total, mode);

    let mut rendered = Vec::with_capacity(total);
    for (idx, page) in pages.iter().enumerate() {
        let number = idx + 1;
        let (w, h) = target_size(page.width().value, page.height().value, dpi, max_pixels);
        let render_config = PdfRenderConfig::new()
            .set_target_width(w)
            .set_target_height(h);
        let image = page
            .render_with_config(&render_config)
            .map_err(|e| Doc2MdError::RasterisationFailed {
                page: number,
                detail: format!("{:?}", e),
            })?
            .as_image();
        debug!(
            "Rendered page {} → {}x{} px",
            number,
            image.width(),
            image.height()
        );

        let text_layer = match mode {
            ParseMode::Text => text_layer(&page, image.width(), image.height())?,
            ParseMode::Ocr => Vec::new(),
        };
        rendered.push(RenderedPage {
            number,
            image,
            text_layer,
        });
    }

    Ok(PdfPages {
        mode,
        pages: rendered,
    })
}

/// Bind pdfium: `PDFIUM_LIB_PATH`, then the working directory, then the system.
pub fn bind_pdfium() -> Result<Pdfium, Doc2MdError> {
    let bindings = match std::env::var("PDFIUM_LIB_PATH") {
        Ok(dir) => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(&dir)),
        Err(_) => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library()),
    }
    .map_err(|e| Doc2MdError::PdfiumBindingFailed(format!("{:?}", e)))?;
    Ok(Pdfium::new(bindings))
}

fn map_open_error(path: &Path, had_password: bool, e: PdfiumError) -> Doc2MdError {
    let detail = format!("{:?}", e);
    if detail.contains("Password") || detail.contains("password") {
        if had_password {
            Doc2MdError::WrongPassword {
                path: path.to_path_buf(),
            }
        } else {
            Doc2MdError::PasswordRequired {
                path: path.to_path_buf(),
            }
        }
    } else {
        Doc2MdError::CorruptPdf {
            path: path.to_path_buf(),
            detail,
        }
    }
}

/// A PDF averaging fewer than `threshold` non-space characters per page is
/// a scan and needs OCR.
pub fn classify_by_density(chars: usize, pages: usize, threshold: usize) -> ParseMode {
    if pages == 0 || chars / pages < threshold {
        ParseMode::Ocr
    } else {
        ParseMode::Text
    }
}

/// Pixel size for a page of `width_pts` x `height_pts` points at `dpi`,
/// shrunk to fit within `max_pixels` on the longest edge.
pub fn target_size(width_pts: f32, height_pts: f32, dpi: u32, max_pixels: u32) -> (i32, i32) {
    let scale = dpi as f32 / 72.0;
    let (mut w, mut h) = (width_pts * scale, height_pts * scale);
    let longest = w.max(h);
    if longest > max_pixels as f32 {
        let shrink = max_pixels as f32 / longest;
        w *= shrink;
        h *= shrink;
    }
    ((w.round() as i32).max(1), (h.round() as i32).max(1))
}

/// Text-layer segments as `text` detections in rendered-image pixel space.
fn text_layer(
    page: &PdfPage,
    image_width: u32,
    image_height: u32,
) -> Result<Vec<Detection>, Doc2MdError> {
    let page_w = page.width().value;
    let page_h = page.height().value;
    if page_w <= 0.0 || page_h <= 0.0 {
        return Ok(Vec::new());
    }
    let sx = (image_width as f32 / page_w) as f64;
    let sy = (image_height as f32 / page_h) as f64;

    let text = page
        .text()
        .map_err(|e| Doc2MdError::Internal(format!("failed to read text layer: {:?}", e)))?;

    let mut detections = Vec::new();
    for segment in text.segments().iter() {
        let content = segment.text();
        let content = content.trim();
        if content.is_empty() {
            continue;
        }
        // PDF space has its origin bottom-left.
        let b = segment.bounds();
        let x0 = b.left().value as f64 * sx;
        let x1 = b.right().value as f64 * sx;
        let y0 = (page_h - b.top().value) as f64 * sy;
        let y1 = (page_h - b.bottom().value) as f64 * sy;
        detections.push(Detection::text(
            Category::Text,
            Polygon::rect(x0, y0, x1, y1),
            content,
        ));
    }
    Ok(detections)
}

/// A PDF produced from an Office document. The PDF lives as long as this value.
#[derive(Debug)]
pub struct ConvertedPdf {
    pub path: PathBuf,
    _dir: TempDir,
}

/// Convert an Office document to PDF with LibreOffice in headless mode.
pub async fn office_to_pdf(path: &Path, converter: &Path) -> Result<ConvertedPdf, Doc2MdError> {
    let failed = |detail: String| Doc2MdError::OfficeConversionFailed {
        path: path.to_path_buf(),
        detail,
    };

    let dir = TempDir::new().map_err(|e| failed(e.to_string()))?;
    info!("Converting {} to PDF", path.display());

    let output = tokio::process::Command::new(converter)
        .arg("--headless")
        .arg("--convert-to")
        .arg("pdf")
        .arg("--outdir")
        .arg(dir.path())
        .arg(path)
        .output()
        .await
        .map_err(|e| failed(format!("could not run {}: {}", converter.display(), e)))?;

    if !output.status.success() {
        return Err(failed(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }

    let stem = path
        .file_stem()
        .ok_or_else(|| failed("input has no file name".into()))?;
    // `report.v2.docx` becomes `report.v2.pdf`; only the last extension is replaced.
    let mut name = stem.to_os_string();
    name.push(".pdf");
    let pdf = dir.path().join(name);
    if !pdf.exists() {
        return Err(failed(format!("no PDF produced at {}", pdf.display())));
    }
    Ok(ConvertedPdf {
        path: pdf,
        _dir: dir,
    })
}

/// Decode an image file.
pub async fn load_image(path: &Path) -> Result<DynamicImage, Doc2MdError> {
    let owned = path.to_path_buf();
    tokio::task::spawn_blocking(move || image::open(&owned))
        .await
        .map_err(|e| Doc2MdError::Internal(format!("image task panicked: {}", e)))?
        .map_err(|e| Doc2MdError::ImageDecode {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_from_extension_is_case_insensitive() {
        assert_eq!(DocumentKind::from_extension("PDF"), Some(DocumentKind::Pdf));
        assert_eq!(
            DocumentKind::from_extension("Docx"),
            Some(DocumentKind::Office)
        );
        assert_eq!(DocumentKind::from_extension("tif"), Some(DocumentKind::Image));
        assert_eq!(DocumentKind::from_extension("txt"), None);
    }

    #[test]
    fn every_supported_extension_has_a_kind() {
        for ext in SUPPORTED_EXTENSIONS {
            assert!(DocumentKind::from_extension(ext).is_some(), "{ext}");
        }
    }

    #[test]
    fn unsupported_path_names_extension() {
        let err = DocumentKind::from_path(Path::new("notes/readme.md")).unwrap_err();
        match err {
            Doc2MdError::UnsupportedType { extension, .. } => assert_eq!(extension, ".md"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn density_classification() {
        assert_eq!(classify_by_density(0, 3, 50), ParseMode::Ocr);
        assert_eq!(classify_by_density(149, 3, 50), ParseMode::Ocr);
        assert_eq!(classify_by_density(150, 3, 50), ParseMode::Text);
        assert_eq!(classify_by_density(10, 0, 50), ParseMode::Ocr);
    }

    #[test]
    fn target_size_scales_and_caps() {
        // US Letter at 144 DPI: 1224 x 1584.
        assert_eq!(target_size(612.0, 792.0, 144, 2000), (1224, 1584));
        // Capped on the longest edge, aspect kept.
        assert_eq!(target_size(612.0, 792.0, 300, 1000), (773, 1000));
    }

    #[tokio::test]
    async fn load_image_reports_decode_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"not a png").unwrap();
        let err = load_image(&path).await.unwrap_err();
        assert!(matches!(err, Doc2MdError::ImageDecode { .. }));
    }

    #[tokio::test]
    async fn missing_converter_is_an_office_error() {
        let dir = tempfile::tempdir().unwrap();
        let doc = dir.path().join("report.docx");
        std::fs::write(&doc, b"PK").unwrap();
        let err = office_to_pdf(&doc, Path::new("/nonexistent/soffice"))
            .await
            .unwrap_err();
        assert!(matches!(err, Doc2MdError::OfficeConversionFailed { .. }));
    }

    /// Stand-in for `soffice`: writes `<outdir>/<name without last extension>.pdf`.
    #[cfg(unix)]
    fn fake_converter(dir: &Path) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let script = dir.join("fake-soffice");
        std::fs::write(
            &script,
            "#!/bin/sh\nname=$(basename \"$6\")\nprintf '%%PDF-1.4' > \"$5/${name%.*}.pdf\"\n",
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        script
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn office_output_keeps_dotted_stem() {
        let dir = tempfile::tempdir().unwrap();
        let converter = fake_converter(dir.path());
        for name in ["report.docx", "report.v2.docx"] {
            let doc = dir.path().join(name);
            std::fs::write(&doc, b"PK").unwrap();
            let pdf = office_to_pdf(&doc, &converter).await.unwrap();
            let expected = format!("{}.pdf", name.trim_end_matches(".docx"));
            assert_eq!(pdf.path.file_name().unwrap().to_str(), Some(expected.as_str()));
            assert!(pdf.path.exists());
        }
    }
}
