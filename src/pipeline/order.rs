//! Reading-order linearisation and bounding extent estimation.
//!
//! Detections are ordered by the centre of their polygon's first/third
//! diagonal: top-to-bottom first, then left-to-right. There is no column
//! detection, so true multi-column layouts may interleave. Detections
//! without a polygon have no key and are dropped.

use crate::pipeline::detection::{Detection, Point};
use std::cmp::Ordering;
use tracing::debug;

/// `(center_y, center_x)` of a detection's diagonal. Used only for sorting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReadingKey {
    pub y: f64,
    pub x: f64,
}

impl ReadingKey {
    pub fn of(detection: &Detection) -> Option<Self> {
        let Point { x, y } = detection.polygon?.center();
        Some(Self { y, x })
    }

    fn compare(&self, other: &Self) -> Ordering {
        self.y.total_cmp(&other.y).then(self.x.total_cmp(&other.x))
    }
}

/// Detections with a polygon, in reading order. Stable for equal keys.
pub fn reading_order(detections: &[Detection]) -> Vec<&Detection> {
    let mut keyed: Vec<(ReadingKey, &Detection)> = detections
        .iter()
        .filter_map(|d| ReadingKey::of(d).map(|k| (k, d)))
        .collect();
    keyed.sort_by(|a, b| a.0.compare(&b.0));
    keyed.into_iter().map(|(_, d)| d).collect()
}

/// Join each detection's preferred content, one item per line, in reading order.
///
/// An empty set gives an empty string.
pub fn linearize(detections: &[Detection]) -> String {
    let lines: Vec<&str> = reading_order(detections)
        .into_iter()
        .filter_map(Detection::content)
        .collect();
    debug!(
        "Linearised {} of {} detections",
        lines.len(),
        detections.len()
    );
    lines.join("\n")
}

/// Largest x and y reached by any polygon point, truncated to integers.
///
/// This is the resolution the analysis collaborator actually worked at,
/// which may differ from the source image. An empty set gives `(0, 0)`.
pub fn bounding_extent(detections: &[Detection]) -> (u32, u32) {
    let (w, h) = detections
        .iter()
        .filter_map(|d| d.polygon.as_ref())
        .flat_map(|p| p.points.iter())
        .fold((0.0_f64, 0.0_f64), |(w, h), p| (w.max(p.x), h.max(p.y)));
    (w as u32, h as u32)
}

/// Map detections back into a `width` x `height` image.
///
/// Points cannot legitimately lie outside the image, so an extent larger
/// than the image means the collaborator resized it first. Polygons are then
/// scaled uniformly by the tighter of the two ratios. Returns the factor used.
pub fn fit_to_image(detections: &mut [Detection], width: u32, height: u32) -> f64 {
    let (ew, eh) = bounding_extent(detections);
    if ew <= width && eh <= height {
        return 1.0;
    }
    let factor = ratio(width, ew).min(ratio(height, eh));
    debug!(
        "Detection extent {}x{} exceeds image {}x{}; scaling by {:.4}",
        ew, eh, width, height, factor
    );
    for d in detections.iter_mut() {
        if let Some(p) = d.polygon.as_mut() {
            *p = p.scaled(factor);
        }
    }
    factor
}

fn ratio(target: u32, extent: u32) -> f64 {
    if extent == 0 {
        1.0
    } else {
        (target as f64 / extent as f64).min(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::detection::{Category, Polygon};

    fn line(x0: f64, y0: f64, x1: f64, y1: f64, text: &str) -> Detection {
        Detection::text(Category::Text, Polygon::rect(x0, y0, x1, y1), text)
    }

    #[test]
    fn empty_set_gives_empty_string() {
        assert_eq!(linearize(&[]), "");
    }

    #[test]
    fn sorts_top_to_bottom_then_left_to_right() {
        let dets = vec![
            line(0.0, 100.0, 50.0, 120.0, "third"),
            line(60.0, 0.0, 100.0, 20.0, "second"),
            line(0.0, 0.0, 50.0, 20.0, "first"),
        ];
        assert_eq!(linearize(&dets), "first\nsecond\nthird");
    }

    #[test]
    fn equal_vertical_centre_orders_by_x() {
        let dets = vec![
            line(200.0, 10.0, 300.0, 30.0, "right"),
            line(0.0, 15.0, 100.0, 25.0, "left"),
        ];
        assert_eq!(linearize(&dets), "left\nright");
    }

    #[test]
    fn line_count_matches_polygon_and_content() {
        let dets = vec![
            line(0.0, 0.0, 10.0, 10.0, "a"),
            Detection::region(Category::Figure, Polygon::rect(0.0, 20.0, 10.0, 30.0)),
            Detection {
                category: Category::Text,
                polygon: None,
                text: Some("no polygon".into()),
                markup: None,
            },
            Detection {
                category: Category::Table,
                polygon: Some(Polygon::rect(0.0, 40.0, 10.0, 50.0)),
                text: None,
                markup: Some("<table/>".into()),
            },
        ];
        let out = linearize(&dets);
        assert_eq!(out.lines().count(), 2);
        assert_eq!(out, "a\n<table/>");
    }

    #[test]
    fn linearize_is_deterministic() {
        let dets = vec![
            line(0.0, 0.0, 10.0, 10.0, "x"),
            line(0.0, 0.0, 10.0, 10.0, "y"),
            line(5.0, 5.0, 6.0, 6.0, "z"),
        ];
        let first = linearize(&dets);
        assert_eq!(first, linearize(&dets));
        // identical keys keep input order
        assert!(first.starts_with("x\ny"));
    }

    #[test]
    fn extent_of_empty_set_is_zero() {
        assert_eq!(bounding_extent(&[]), (0, 0));
    }

    #[test]
    fn extent_of_single_polygon() {
        let dets = vec![line(10.0, 5.0, 100.0, 50.0, "a")];
        assert_eq!(bounding_extent(&dets), (100, 50));
    }

    #[test]
    fn extent_skips_missing_polygons() {
        let dets = vec![
            line(0.0, 0.0, 40.7, 30.2, "a"),
            Detection {
                text: Some("floating".into()),
                ..Default::default()
            },
        ];
        assert_eq!(bounding_extent(&dets), (40, 30));
    }

    #[test]
    fn fit_leaves_in_bounds_detections_alone() {
        let mut dets = vec![line(0.0, 0.0, 100.0, 50.0, "a")];
        assert_eq!(fit_to_image(&mut dets, 200, 100), 1.0);
        assert_eq!(bounding_extent(&dets), (100, 50));
    }

    #[test]
    fn fit_scales_oversized_extent() {
        let mut dets = vec![line(0.0, 0.0, 2000.0, 1000.0, "a")];
        let factor = fit_to_image(&mut dets, 1000, 800);
        assert!((factor - 0.5).abs() < 1e-9);
        assert_eq!(bounding_extent(&dets), (1000, 500));
    }
}
