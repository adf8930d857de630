//! Detection set data model.
//!
//! A [`Detection`] is one region the layout/OCR analysis found on a page:
//! a quadrilateral, a category, and optional recognised content. The JSON
//! shape (`poly` as eight flat numbers, `text`, `html`) matches what the
//! analysis collaborator emits, so a detection set can be dumped and reloaded
//! verbatim.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// How a document's content is extracted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseMode {
    /// Content is recognised from page pixels.
    Ocr,
    /// Text comes from the PDF text layer; analysis supplies figure/table regions.
    Text,
}

impl fmt::Display for ParseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseMode::Ocr => f.write_str("ocr"),
            ParseMode::Text => f.write_str("text"),
        }
    }
}

/// A corner of a polygon in image pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Four corners, clockwise from top-left. May be skewed.
///
/// Serialises as `[x1, y1, x2, y2, x3, y3, x4, y4]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct Polygon {
    pub points: [Point; 4],
}

impl Polygon {
    pub fn new(points: [Point; 4]) -> Self {
        Self { points }
    }

    /// Axis-aligned rectangle from its top-left and bottom-right corners.
    pub fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self::new([
            Point::new(x0, y0),
            Point::new(x1, y0),
            Point::new(x1, y1),
            Point::new(x0, y1),
        ])
    }

    /// Midpoint of the diagonal between the first and third corners.
    pub fn center(&self) -> Point {
        let [a, _, c, _] = self.points;
        Point::new((a.x + c.x) / 2.0, (a.y + c.y) / 2.0)
    }

    /// `(min_x, min_y, max_x, max_y)` over all corners.
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        self.points.iter().fold(
            (f64::MAX, f64::MAX, f64::MIN, f64::MIN),
            |(x0, y0, x1, y1), p| (x0.min(p.x), y0.min(p.y), x1.max(p.x), y1.max(p.y)),
        )
    }

    /// Whether `p` lies inside the axis-aligned bounds of this polygon.
    pub fn contains(&self, p: Point) -> bool {
        let (x0, y0, x1, y1) = self.bounds();
        p.x >= x0 && p.x <= x1 && p.y >= y0 && p.y <= y1
    }

    /// Multiply every coordinate by `factor`.
    pub fn scaled(&self, factor: f64) -> Self {
        Self::new(self.points.map(|p| Point::new(p.x * factor, p.y * factor)))
    }
}

impl TryFrom<Vec<f64>> for Polygon {
    type Error = String;

    fn try_from(v: Vec<f64>) -> Result<Self, Self::Error> {
        if v.len() < 8 {
            return Err(format!("polygon needs 8 coordinates, got {}", v.len()));
        }
        Ok(Self::new([
            Point::new(v[0], v[1]),
            Point::new(v[2], v[3]),
            Point::new(v[4], v[5]),
            Point::new(v[6], v[7]),
        ]))
    }
}

impl From<Polygon> for Vec<f64> {
    fn from(p: Polygon) -> Self {
        p.points.iter().flat_map(|pt| [pt.x, pt.y]).collect()
    }
}

/// Region classification reported by the analysis collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Title,
    #[default]
    Text,
    Table,
    #[serde(alias = "image", alias = "picture")]
    Figure,
    #[serde(alias = "equation")]
    Formula,
    /// Page furniture: page numbers, running headers and footers.
    Abandon,
    #[serde(other)]
    Other,
}

/// One recognised region on a page.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Detection {
    #[serde(default)]
    pub category: Category,

    /// `None` when the collaborator gave no usable polygon.
    #[serde(
        rename = "poly",
        default,
        deserialize_with = "lenient_polygon",
        skip_serializing_if = "Option::is_none"
    )]
    pub polygon: Option<Polygon>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Structured markup, e.g. a table as HTML.
    #[serde(rename = "html", default, skip_serializing_if = "Option::is_none")]
    pub markup: Option<String>,
}

impl Detection {
    pub fn text(category: Category, polygon: Polygon, text: impl Into<String>) -> Self {
        Self {
            category,
            polygon: Some(polygon),
            text: Some(text.into()),
            markup: None,
        }
    }

    pub fn region(category: Category, polygon: Polygon) -> Self {
        Self {
            category,
            polygon: Some(polygon),
            text: None,
            markup: None,
        }
    }

    /// Text if non-empty, else markup if non-empty.
    pub fn content(&self) -> Option<&str> {
        non_empty(self.text.as_deref()).or_else(|| non_empty(self.markup.as_deref()))
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|s| !s.is_empty())
}

/// Accept short or malformed `poly` arrays as "no polygon" instead of
/// rejecting the whole detection set.
fn lenient_polygon<'de, D>(deserializer: D) -> Result<Option<Polygon>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Vec<f64>> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|v| Polygon::try_from(v).ok()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_collaborator_json() {
        let json = r#"[
            {"category": "text", "poly": [0, 0, 10, 0, 10, 5, 0, 5], "text": "hello"},
            {"category": "table", "poly": [0, 10, 10, 10, 10, 20, 0, 20], "html": "<table></table>"},
            {"category": "image", "poly": [1, 2, 3]},
            {"category": "chart"}
        ]"#;
        let dets: Vec<Detection> = serde_json::from_str(json).unwrap();
        assert_eq!(dets.len(), 4);
        assert_eq!(dets[0].content(), Some("hello"));
        assert_eq!(dets[1].content(), Some("<table></table>"));
        assert_eq!(dets[2].category, Category::Figure);
        assert!(dets[2].polygon.is_none(), "short poly is dropped");
        assert_eq!(dets[3].category, Category::Other);
    }

    #[test]
    fn polygon_serialises_flat() {
        let d = Detection::text(Category::Text, Polygon::rect(1.0, 2.0, 3.0, 4.0), "x");
        let v = serde_json::to_value(&d).unwrap();
        assert_eq!(v["poly"], serde_json::json!([1.0, 2.0, 3.0, 2.0, 3.0, 4.0, 1.0, 4.0]));
        assert!(v.get("html").is_none());
    }

    #[test]
    fn empty_text_falls_back_to_markup() {
        let d = Detection {
            text: Some(String::new()),
            markup: Some("<b>x</b>".into()),
            ..Default::default()
        };
        assert_eq!(d.content(), Some("<b>x</b>"));

        let blank = Detection {
            text: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(blank.content(), None);
    }

    #[test]
    fn center_uses_diagonal() {
        let p = Polygon::rect(10.0, 20.0, 30.0, 60.0);
        assert_eq!(p.center(), Point::new(20.0, 40.0));
        assert!(p.contains(Point::new(15.0, 59.0)));
        assert!(!p.contains(Point::new(31.0, 40.0)));
    }
}
