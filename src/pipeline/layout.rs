//! Layout/OCR collaborator: one RGB image in, a detection set out.
//!
//! [`VlmLayoutAnalyzer`] asks a vision model for a JSON array of regions and
//! parses it leniently. In [`ParseMode::Text`] the page text already comes
//! from the PDF text layer, so the model is only asked for figure and table
//! regions, which [`merge_text_layer`] then combines with the text.

use crate::config::ConversionConfig;
use crate::error::Doc2MdError;
use crate::pipeline::detection::{Category, Detection, ParseMode};
use crate::pipeline::{encode, llm, postprocess};
use crate::prompts;
use async_trait::async_trait;
use edgequake_llm::LLMProvider;
use image::{DynamicImage, RgbImage};
use std::sync::Arc;
use tracing::debug;

/// Finds regions on a page or picture.
#[async_trait]
pub trait LayoutAnalyzer: Send + Sync {
    /// Analyse `image` in `mode`. `label` identifies the image in logs.
    async fn analyze(
        &self,
        image: &RgbImage,
        mode: ParseMode,
        label: &str,
    ) -> Result<Vec<Detection>, Doc2MdError>;
}

/// [`LayoutAnalyzer`] backed by a vision-capable chat model.
pub struct VlmLayoutAnalyzer {
    provider: Arc<dyn LLMProvider>,
    config: ConversionConfig,
}

impl VlmLayoutAnalyzer {
    pub fn new(provider: Arc<dyn LLMProvider>, config: ConversionConfig) -> Self {
        Self { provider, config }
    }

    fn system_prompt(&self, mode: ParseMode) -> &str {
        self.config
            .layout_prompt
            .as_deref()
            .unwrap_or_else(|| prompts::layout_prompt(mode))
    }
}

#[async_trait]
impl LayoutAnalyzer for VlmLayoutAnalyzer {
    async fn analyze(
        &self,
        image: &RgbImage,
        mode: ParseMode,
        label: &str,
    ) -> Result<Vec<Detection>, Doc2MdError> {
        let dynamic = DynamicImage::ImageRgb8(image.clone());
        let data = encode::encode_image(&dynamic).map_err(|e| Doc2MdError::ImageDecode {
            path: label.into(),
            detail: format!("PNG encoding failed: {e}"),
        })?;
        let hint = prompts::image_size_hint(image.width(), image.height());
        let reply = llm::ask_about_image(
            &self.provider,
            Some(self.system_prompt(mode)),
            &hint,
            data,
            &self.config,
            label,
        )
        .await?;

        let detections = parse_detections(&reply)?;
        debug!("{}: {} detections ({} mode)", label, detections.len(), mode);
        Ok(detections)
    }
}

/// Parse a model reply into detections.
///
/// Tolerates code fences and prose around the array: everything between the
/// first `[` and the last `]` is parsed. An empty reply is an empty set.
pub fn parse_detections(raw: &str) -> Result<Vec<Detection>, Doc2MdError> {
    let cleaned = postprocess::strip_code_fences(raw);
    if cleaned.is_empty() {
        return Ok(Vec::new());
    }
    let (start, end) = match (cleaned.find('['), cleaned.rfind(']')) {
        (Some(s), Some(e)) if s < e => (s, e),
        _ => {
            return Err(Doc2MdError::AnalysisFailed {
                detail: format!("no JSON array in reply: {}", preview(&cleaned)),
            })
        }
    };
    serde_json::from_str(&cleaned[start..=end]).map_err(|e| Doc2MdError::AnalysisFailed {
        detail: format!("malformed detection JSON: {e}"),
    })
}

/// Combine text-layer detections with figure/table regions.
///
/// Text whose centre falls inside a table or figure region is dropped; that
/// content is reproduced by the region itself (markup or cropped image).
pub fn merge_text_layer(text: Vec<Detection>, regions: Vec<Detection>) -> Vec<Detection> {
    let blocks: Vec<_> = regions
        .iter()
        .filter(|r| matches!(r.category, Category::Table | Category::Figure))
        .filter_map(|r| r.polygon)
        .collect();

    let mut merged: Vec<Detection> = text
        .into_iter()
        .filter(|t| match t.polygon {
            Some(p) => !blocks.iter().any(|b| b.contains(p.center())),
            None => true,
        })
        .collect();
    merged.extend(regions);
    merged
}

fn preview(s: &str) -> String {
    let mut p: String = s.chars().take(80).collect();
    if p.len() < s.len() {
        p.push('…');
    }
    p
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::detection::Polygon;

    #[test]
    fn parses_fenced_reply() {
        let raw = "```json\n[{\"category\":\"title\",\"poly\":[0,0,10,0,10,5,0,5],\"text\":\"Intro\"}]\n```";
        let dets = parse_detections(raw).unwrap();
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].category, Category::Title);
        assert_eq!(dets[0].text.as_deref(), Some("Intro"));
        assert!(dets[0].polygon.is_some());
    }

    #[test]
    fn tolerates_prose_and_short_polygons() {
        let raw = "Here you go:\n[{\"category\":\"text\",\"poly\":[1,2,3],\"text\":\"x\"},\
                   {\"category\":\"picture\",\"poly\":[0,0,4,0,4,4,0,4]}]\nDone.";
        let dets = parse_detections(raw).unwrap();
        assert_eq!(dets.len(), 2);
        assert!(dets[0].polygon.is_none());
        assert_eq!(dets[1].category, Category::Figure);
    }

    #[test]
    fn empty_reply_is_empty_set() {
        assert!(parse_detections("  ").unwrap().is_empty());
        assert!(parse_detections("[]").unwrap().is_empty());
    }

    #[test]
    fn reply_without_array_fails() {
        let err = parse_detections("I cannot read this image.").unwrap_err();
        assert!(matches!(err, Doc2MdError::AnalysisFailed { .. }));
    }

    #[test]
    fn merge_drops_text_inside_figures() {
        let text = vec![
            Detection::text(Category::Text, Polygon::rect(0.0, 0.0, 100.0, 10.0), "above"),
            Detection::text(Category::Text, Polygon::rect(20.0, 40.0, 60.0, 50.0), "axis label"),
            Detection {
                text: Some("floating".into()),
                ..Default::default()
            },
        ];
        let regions = vec![Detection::region(
            Category::Figure,
            Polygon::rect(0.0, 20.0, 100.0, 80.0),
        )];
        let merged = merge_text_layer(text, regions);
        let texts: Vec<_> = merged.iter().filter_map(|d| d.text.as_deref()).collect();
        assert_eq!(texts, vec!["above", "floating"]);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged[2].category, Category::Figure);
    }

    #[test]
    fn merge_keeps_text_near_titles() {
        let text = vec![Detection::text(
            Category::Text,
            Polygon::rect(0.0, 0.0, 10.0, 10.0),
            "body",
        )];
        let regions = vec![Detection::region(
            Category::Title,
            Polygon::rect(0.0, 0.0, 10.0, 10.0),
        )];
        assert_eq!(merge_text_layer(text, regions).len(), 2);
    }
}
