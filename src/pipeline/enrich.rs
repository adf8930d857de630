//! Image enrichment: replace each `![..](images/..)` reference with a block
//! holding a caption and the OCR transcript of that image.
//!
//! References are processed right to left. Each replacement only changes
//! bytes at or after its own span, so the spans of references further left,
//! taken from the single up-front scan, are still valid when their turn comes.
//! Replacement is by span, never by searching for the matched text, so two
//! byte-identical references are each replaced exactly once.

use crate::error::EnrichError;
use crate::pipeline::caption::Captioner;
use crate::pipeline::detection::ParseMode;
use crate::pipeline::ingest;
use crate::pipeline::layout::LayoutAnalyzer;
use crate::pipeline::order::{fit_to_image, linearize};
use crate::pipeline::scan::ImageRef;
use crate::prompts::{
    caption_failure_marker, CAPTION_LABEL, NO_TEXT_PLACEHOLDER, OCR_LABEL, SECTION_DELIMITER,
};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};

/// Result of enriching one document.
#[derive(Debug, Clone)]
pub struct Enrichment {
    pub markdown: String,
    /// References found by the scan.
    pub found: usize,
    /// References replaced by an enrichment block.
    pub enriched: usize,
    /// Per-image problems, in document order.
    pub issues: Vec<EnrichError>,
}

/// The replacement text for one reference. Caption first, then OCR text.
pub fn enrichment_block(caption: &str, ocr_text: &str) -> String {
    format!(
        "\n\n{CAPTION_LABEL}\n\n{caption}\n\n{SECTION_DELIMITER}\n\n{OCR_LABEL}\n\n{ocr_text}\n\n"
    )
}

/// Enrich every reference in `refs`, which must come from scanning `markdown`.
///
/// Never fails: an unreadable image leaves its reference as it was, an OCR
/// failure yields the no-text placeholder and a captioning failure yields
/// the failure marker. Each is recorded in [`Enrichment::issues`].
pub async fn enrich_markdown(
    markdown: &str,
    refs: &[ImageRef],
    image_dir: &Path,
    analyzer: &dyn LayoutAnalyzer,
    captioner: &dyn Captioner,
) -> Enrichment {
    let mut doc = markdown.to_string();
    let mut enriched = 0usize;
    let mut per_ref = Vec::with_capacity(refs.len());

    for r in refs.iter().rev() {
        let (block, problems) = enrich_one(r, image_dir, analyzer, captioner).await;
        if let Some(block) = block {
            doc.replace_range(r.span.clone(), &block);
            enriched += 1;
        }
        per_ref.push(problems);
    }
    let issues: Vec<EnrichError> = per_ref.into_iter().rev().flatten().collect();

    info!(
        "Enriched {}/{} image references ({} issues)",
        enriched,
        refs.len(),
        issues.len()
    );
    Enrichment {
        markdown: doc,
        found: refs.len(),
        enriched,
        issues,
    }
}

/// Build the block for one reference. `None` leaves the reference untouched.
async fn enrich_one(
    r: &ImageRef,
    image_dir: &Path,
    analyzer: &dyn LayoutAnalyzer,
    captioner: &dyn Captioner,
) -> (Option<String>, Vec<EnrichError>) {
    let file = r.filename.clone();
    let mut issues = Vec::new();

    let image = match resolve_image_path(image_dir, &file) {
        Some(path) => ingest::load_image(&path).await.map_err(|e| e.to_string()),
        None => Err("path escapes the image directory".to_string()),
    };
    let image = match image {
        Ok(img) => img,
        Err(detail) => {
            warn!("Skipping image {}: {}", file, detail);
            return (None, vec![EnrichError::UnreadableImage { file, detail }]);
        }
    };

    let rgb = image.to_rgb8();
    let ocr_text = match analyzer.analyze(&rgb, ParseMode::Ocr, &file).await {
        Ok(mut detections) => {
            let factor = fit_to_image(&mut detections, rgb.width(), rgb.height());
            if factor != 1.0 {
                debug!("{}: detections rescaled by {:.3}", file, factor);
            }
            linearize(&detections)
        }
        Err(e) => {
            warn!("OCR failed for {}: {}", file, e);
            issues.push(EnrichError::OcrFailed {
                file: file.clone(),
                detail: e.to_string(),
            });
            String::new()
        }
    };

    let caption = match captioner.describe(&image, &file).await {
        Ok(text) => text,
        Err(e) => {
            warn!("Captioning failed for {}: {}", file, e);
            let reason = e.to_string();
            issues.push(EnrichError::CaptionFailed {
                file: file.clone(),
                detail: reason.clone(),
            });
            caption_failure_marker(&reason)
        }
    };

    let ocr_text = if ocr_text.trim().is_empty() {
        NO_TEXT_PLACEHOLDER
    } else {
        ocr_text.as_str()
    };

    (Some(enrichment_block(&caption, ocr_text)), issues)
}

/// Join `filename` onto `image_dir`, refusing anything that could leave it.
fn resolve_image_path(image_dir: &Path, filename: &str) -> Option<PathBuf> {
    let rel = Path::new(filename);
    let safe = rel
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    safe.then(|| image_dir.join(rel))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_layout() {
        let block = enrichment_block("A cat.", "MEOW");
        assert_eq!(
            block,
            format!(
                "\n\n{CAPTION_LABEL}\n\nA cat.\n\n{SECTION_DELIMITER}\n\n{OCR_LABEL}\n\nMEOW\n\n"
            )
        );
        assert!(block.find("A cat.").unwrap() < block.find("MEOW").unwrap());
    }

    #[test]
    fn rejects_escaping_paths() {
        let dir = Path::new("/tmp/work/images");
        assert_eq!(
            resolve_image_path(dir, "a/b.png"),
            Some(dir.join("a/b.png"))
        );
        assert!(resolve_image_path(dir, "../secret.png").is_none());
        assert!(resolve_image_path(dir, "a/../../x.png").is_none());
        assert!(resolve_image_path(dir, "/etc/passwd").is_none());
    }
}
