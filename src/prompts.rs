//! Model prompts and the fixed strings of an enrichment block.
//!
//! Every prompt and every literal that ends up in the output document lives
//! here, so changing wording touches exactly one place and tests can assert
//! against the same constants the pipeline uses.
//!
//! Callers can override the prompts via
//! [`crate::config::ConversionConfig::caption_prompt`] and
//! [`crate::config::ConversionConfig::layout_prompt`].

use crate::pipeline::detection::ParseMode;

/// Default prompt for describing one extracted image.
pub const CAPTION_PROMPT: &str = "Describe the content of this image in detail, \
covering its features and fine details. Be thorough and complete. \
Answer with the description only.";

/// Layout + OCR prompt: every region, text transcribed.
pub const LAYOUT_OCR_PROMPT: &str = r#"You are a document layout and OCR engine.

Detect every content region in the image and return them as a JSON array. Each element is an object:

  {"category": "<title|text|table|figure|formula|abandon>",
   "poly": [x1, y1, x2, y2, x3, y3, x4, y4],
   "text": "<recognised plain text>",
   "html": "<table markup, tables only>"}

Rules:
- "poly" lists the four corners clockwise from top-left, in pixel coordinates of the image you were given.
- Transcribe text exactly; one element per text line or paragraph.
- For tables put the full table as HTML in "html" and omit "text".
- For figures (photos, charts, diagrams) omit both "text" and "html".
- Use "abandon" for page numbers, running headers and footers.
- Output ONLY the JSON array. No commentary, no markdown fences."#;

/// Layout-only prompt used when the text comes from the PDF text layer.
pub const LAYOUT_REGIONS_PROMPT: &str = r#"You are a document layout engine.

Find only the figure regions (photos, charts, diagrams) and table regions in the image and return them as a JSON array. Each element is an object:

  {"category": "<table|figure>",
   "poly": [x1, y1, x2, y2, x3, y3, x4, y4],
   "html": "<table markup, tables only>"}

Rules:
- "poly" lists the four corners clockwise from top-left, in pixel coordinates of the image you were given.
- For tables put the full table as HTML in "html".
- Return [] when there are no figures or tables.
- Output ONLY the JSON array. No commentary, no markdown fences."#;

/// Pick the built-in layout prompt for a parse mode.
pub fn layout_prompt(mode: ParseMode) -> &'static str {
    match mode {
        ParseMode::Ocr => LAYOUT_OCR_PROMPT,
        ParseMode::Text => LAYOUT_REGIONS_PROMPT,
    }
}

/// Tell the model the pixel size of the image it is looking at.
pub fn image_size_hint(width: u32, height: u32) -> String {
    format!("The image is {width} x {height} pixels.")
}

/// Heading of the caption section of an enrichment block.
pub const CAPTION_LABEL: &str = "- Image description:";

/// Heading of the OCR section of an enrichment block.
pub const OCR_LABEL: &str = "- Image content:";

/// Delimiter line between the caption and OCR sections.
pub const SECTION_DELIMITER: &str = "-------------------";

/// OCR section body when no text was recognised.
pub const NO_TEXT_PLACEHOLDER: &str = "No text was recognized in this image";

/// Caption section body when captioning failed.
pub fn caption_failure_marker(reason: &str) -> String {
    format!("[Image description failed: {reason}]")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_prompt_depends_on_mode() {
        assert!(layout_prompt(ParseMode::Ocr).contains("OCR"));
        assert!(layout_prompt(ParseMode::Text).contains("figure"));
        assert_ne!(layout_prompt(ParseMode::Ocr), layout_prompt(ParseMode::Text));
    }

    #[test]
    fn failure_marker_carries_reason() {
        let m = caption_failure_marker("connection refused");
        assert!(m.starts_with('['));
        assert!(m.contains("connection refused"));
    }
}
