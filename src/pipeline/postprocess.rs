//! Post-processing: deterministic cleanup of model text and the final document.
//!
//! Three entry points:
//!
//! * [`clean_model_text`] runs on every caption before it is used. Models
//!   wrap output in code fences, emit CRLF and sprinkle zero-width
//!   characters even when told not to.
//! * [`tidy_markdown`] runs on the page dump before image references are
//!   scanned. It only touches whitespace, never `![..](..)` references.
//! * [`finalize_markdown`] runs once on the enriched document before it is
//!   written. Inserted OCR text keeps its own spacing, so only line endings
//!   and the final newline change.

use once_cell::sync::Lazy;
use regex::Regex;

/// Clean a raw model reply.
///
/// Rules (applied in order):
/// 1. Normalise line endings (CRLF → LF)
/// 2. Strip an outer code fence, with or without a language tag
/// 3. Trim trailing whitespace per line
/// 4. Collapse 3+ consecutive blank lines down to 2
/// 5. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 6. Trim leading and trailing blank space
pub fn clean_model_text(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = strip_code_fences(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    let s = remove_invisible_chars(&s);
    s.trim().to_string()
}

/// Normalise the page dump: LF line endings, no trailing spaces, no runs of
/// more than two blank lines, exactly one final newline.
pub fn tidy_markdown(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    ensure_final_newline(&s)
}

/// LF line endings and exactly one final newline. Nothing inside lines changes.
pub fn finalize_markdown(input: &str) -> String {
    ensure_final_newline(&normalise_line_endings(input))
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: Strip outer code fences ──────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z0-9_-]*\n(.*)\n```\s*$").unwrap());

/// Remove a fence wrapping the whole input (```` ```json ```` , ```` ```markdown ````, …).
pub fn strip_code_fences(input: &str) -> String {
    let trimmed = input.trim();
    match RE_OUTER_FENCES.captures(trimmed) {
        Some(caps) => caps[1].to_string(),
        None => trimmed.to_string(),
    }
}

// ── Rule 3: Trim trailing whitespace per line ────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 4: Collapse excessive blank lines ───────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{4,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n\n").to_string()
}

// ── Rule 5: Remove invisible Unicode characters ──────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Final newline ────────────────────────────────────────────────────────────

fn ensure_final_newline(input: &str) -> String {
    let trimmed = input.trim_end_matches(['\n', ' ', '\t']);
    if trimmed.is_empty() {
        String::from("\n")
    } else {
        format!("{}\n", trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_json_fence() {
        let input = "```json\n[{\"a\": 1}]\n```";
        assert_eq!(strip_code_fences(input), "[{\"a\": 1}]");
    }

    #[test]
    fn test_strip_fence_without_lang() {
        assert_eq!(strip_code_fences("```\nhello\n```"), "hello");
    }

    #[test]
    fn test_no_fence_passthrough() {
        assert_eq!(strip_code_fences("  plain text \n"), "plain text");
    }

    #[test]
    fn test_clean_model_text_with_crlf_fence() {
        let input = "```markdown\r\nA red\u{200B} bar chart.   \r\n\r\n\r\n\r\n\r\nTwo series.\r\n```";
        assert_eq!(clean_model_text(input), "A red bar chart.\n\n\nTwo series.");
    }

    #[test]
    fn test_tidy_keeps_image_refs() {
        let input = "# T\r\n\r\n![](images/a.png)   \n\n\n\n\n\nend\n\n\n";
        let out = tidy_markdown(input);
        assert_eq!(out, "# T\n\n![](images/a.png)\n\n\nend\n");
    }

    #[test]
    fn test_finalize_keeps_inserted_spacing() {
        // Hard break (two trailing spaces) and a long blank run inside a transcript.
        let input = "line one  \r\nline two\n\n\n\n\n| a |   \n\n\n";
        assert_eq!(
            finalize_markdown(input),
            "line one  \nline two\n\n\n\n\n| a |\n"
        );
    }

    #[test]
    fn test_finalize_empty() {
        assert_eq!(finalize_markdown(""), "\n");
        assert_eq!(tidy_markdown(""), "\n");
    }
}
