//! Markdown dump of analysed pages.
//!
//! Detections are emitted in reading order, one block per detection. Figures
//! are cropped out of the page image and saved under `images/`, so the
//! enrichment pass can find them again through their `![](images/..)`
//! references.

use crate::error::Doc2MdError;
use crate::pipeline::detection::{Category, Detection};
use crate::pipeline::order::reading_order;
use image::DynamicImage;
use std::path::Path;
use tracing::{debug, warn};

/// A page image plus the detections found on it, in its pixel space.
pub struct AnalyzedPage {
    /// 1-based page number, used in figure file names.
    pub number: usize,
    pub image: DynamicImage,
    pub detections: Vec<Detection>,
}

/// Render analysed pages to markdown, writing figure crops to `image_dir`.
///
/// `image_dir` must exist. Figures are saved as `page<NNN>_<KK>.png`.
pub fn render_document(pages: &[AnalyzedPage], image_dir: &Path) -> Result<String, Doc2MdError> {
    let mut blocks: Vec<String> = Vec::new();

    for page in pages {
        let mut figure = 0usize;
        for det in reading_order(&page.detections) {
            let block = match det.category {
                Category::Abandon => None,
                Category::Title => det.content().map(|t| format!("# {}", t.trim())),
                Category::Table => non_empty(det.markup.as_deref())
                    .or_else(|| non_empty(det.text.as_deref()))
                    .map(|t| t.trim().to_string()),
                Category::Formula => det.content().map(|t| format!("$$\n{}\n$$", t.trim())),
                Category::Figure => {
                    figure += 1;
                    save_figure(page, det, figure, image_dir)?
                        .map(|name| format!("![](images/{name})"))
                }
                Category::Text | Category::Other => det.content().map(|t| t.trim().to_string()),
            };
            if let Some(b) = block.filter(|b| !b.is_empty()) {
                blocks.push(b);
            }
        }
        debug!(
            "Page {}: {} detections, {} figures",
            page.number,
            page.detections.len(),
            figure
        );
    }

    Ok(blocks.join("\n\n"))
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|s| !s.trim().is_empty())
}

/// Crop a figure's bounds out of the page and save it. `None` if the
/// region is empty after clamping to the page.
fn save_figure(
    page: &AnalyzedPage,
    det: &Detection,
    index: usize,
    image_dir: &Path,
) -> Result<Option<String>, Doc2MdError> {
    let Some(poly) = det.polygon else {
        return Ok(None);
    };
    let (w, h) = (page.image.width(), page.image.height());
    let (x0, y0, x1, y1) = poly.bounds();
    let clamp = |v: f64, max: u32| v.max(0.0).min(max as f64) as u32;
    let (left, top) = (clamp(x0, w), clamp(y0, h));
    let (right, bottom) = (clamp(x1.ceil(), w), clamp(y1.ceil(), h));
    if right <= left || bottom <= top {
        warn!(
            "Page {}: figure {} has an empty crop, skipped",
            page.number, index
        );
        return Ok(None);
    }

    let crop = page
        .image
        .crop_imm(left, top, right - left, bottom - top);
    let name = figure_name(page.number, index);
    let path = image_dir.join(&name);
    crop.save_with_format(&path, image::ImageFormat::Png)
        .map_err(|e| Doc2MdError::Internal(format!("failed to save {}: {}", path.display(), e)))?;
    Ok(Some(name))
}

/// `page<NNN>_<KK>.png`
pub fn figure_name(page: usize, index: usize) -> String {
    format!("page{:03}_{:02}.png", page, index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::detection::Polygon;
    use crate::pipeline::scan::scan_image_refs;
    use image::{Rgb, RgbImage};

    fn page(detections: Vec<Detection>) -> AnalyzedPage {
        AnalyzedPage {
            number: 1,
            image: DynamicImage::ImageRgb8(RgbImage::from_pixel(200, 100, Rgb([255, 255, 255]))),
            detections,
        }
    }

    #[test]
    fn renders_blocks_in_reading_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut table = Detection::region(Category::Table, Polygon::rect(0.0, 60.0, 200.0, 80.0));
        table.markup = Some("<table><tr><td>1</td></tr></table>".into());
        let dets = vec![
            Detection::text(Category::Text, Polygon::rect(0.0, 30.0, 200.0, 40.0), "body"),
            Detection::text(Category::Title, Polygon::rect(0.0, 0.0, 200.0, 10.0), "Heading"),
            Detection::text(Category::Abandon, Polygon::rect(0.0, 90.0, 20.0, 100.0), "7"),
            table,
            Detection::text(Category::Formula, Polygon::rect(0.0, 45.0, 50.0, 55.0), "E=mc^2"),
        ];
        let md = render_document(&[page(dets)], dir.path()).unwrap();
        assert_eq!(
            md,
            "# Heading\n\nbody\n\n$$\nE=mc^2\n$$\n\n<table><tr><td>1</td></tr></table>"
        );
    }

    #[test]
    fn figures_are_cropped_and_referenced() {
        let dir = tempfile::tempdir().unwrap();
        let dets = vec![
            Detection::region(Category::Figure, Polygon::rect(10.0, 10.0, 60.0, 40.0)),
            // Partly off the page: clamped.
            Detection::region(Category::Figure, Polygon::rect(150.0, 50.0, 260.0, 130.0)),
        ];
        let md = render_document(&[page(dets)], dir.path()).unwrap();
        let refs = scan_image_refs(&md);
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].filename, "page001_01.png");
        assert_eq!(refs[1].filename, "page001_02.png");

        let first = image::open(dir.path().join("page001_01.png")).unwrap();
        assert_eq!((first.width(), first.height()), (50, 30));
        let second = image::open(dir.path().join("page001_02.png")).unwrap();
        assert_eq!((second.width(), second.height()), (50, 50));
    }

    #[test]
    fn degenerate_figure_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let dets = vec![Detection::region(
            Category::Figure,
            Polygon::rect(300.0, 300.0, 400.0, 400.0),
        )];
        assert_eq!(render_document(&[page(dets)], dir.path()).unwrap(), "");
    }

    #[test]
    fn figure_names_are_zero_padded() {
        assert_eq!(figure_name(3, 12), "page003_12.png");
    }
}
