//! Markdown image-reference scanning.
//!
//! Only `![alt](images/<file>)` is recognised: references to absolute paths,
//! URLs or anything outside the `images/` directory are left alone. Each
//! match keeps its byte span so the enrichment pass can replace exactly that
//! occurrence, even when the same reference text appears more than once.

use once_cell::sync::Lazy;
use regex::Regex;
use std::ops::Range;

static RE_IMAGE_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"!\[(.*?)\]\(images/([^)]+)\)").unwrap());

/// One `![alt](images/<filename>)` occurrence in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    /// Byte range of the full match in the scanned document.
    pub span: Range<usize>,
    pub alt: String,
    /// Path fragment after `images/`.
    pub filename: String,
}

impl ImageRef {
    /// The matched text, given the document it was scanned from.
    pub fn matched<'a>(&self, document: &'a str) -> &'a str {
        &document[self.span.clone()]
    }
}

/// Every image reference in `markdown`, left to right, non-overlapping.
pub fn scan_image_refs(markdown: &str) -> Vec<ImageRef> {
    RE_IMAGE_REF
        .captures_iter(markdown)
        .filter_map(|caps| {
            let full = caps.get(0)?;
            Some(ImageRef {
                span: full.range(),
                alt: caps[1].to_string(),
                filename: caps[2].to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_refs_left_to_right() {
        let md = "see ![cat](images/a.png) and ![dog](images/b.jpg)";
        let refs = scan_image_refs(md);
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].filename, "a.png");
        assert_eq!(refs[0].alt, "cat");
        assert_eq!(refs[1].filename, "b.jpg");
        assert_eq!(refs[1].alt, "dog");
        assert_eq!(refs[0].matched(md), "![cat](images/a.png)");
        assert!(refs[0].span.end <= refs[1].span.start);
    }

    #[test]
    fn ignores_refs_outside_images_dir() {
        let md = "![a](/abs/images/x.png) ![b](https://example.com/images/y.png) \
                  ![c](figures/z.png) ![d](./images/w.png)";
        assert!(scan_image_refs(md).is_empty());
    }

    #[test]
    fn empty_alt_and_duplicates() {
        let md = "![](images/p.png)\n\n![](images/p.png)";
        let refs = scan_image_refs(md);
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].alt, "");
        assert_ne!(refs[0].span, refs[1].span);
        assert_eq!(refs[0].matched(md), refs[1].matched(md));
    }

    #[test]
    fn alt_is_non_greedy() {
        let md = "![one](images/1.png)](images/2.png)";
        let refs = scan_image_refs(md);
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].alt, "one");
        assert_eq!(refs[0].filename, "1.png");
    }

    #[test]
    fn subdirectory_filenames_are_kept() {
        let refs = scan_image_refs("![x](images/page001/fig 1.png)");
        assert_eq!(refs[0].filename, "page001/fig 1.png");
    }
}
