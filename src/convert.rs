//! Conversion entry points: the batch driver, the per-file pipeline and the
//! single-image OCR dump.
//!
//! Files are processed one at a time, start to finish. A failure inside one
//! file is logged, reported through the progress callback and recorded in
//! the [`BatchReport`]; the batch then moves on. Only a missing top-level
//! input path is fatal for the whole run.

use crate::error::Doc2MdError;
use crate::output::{BatchReport, FailedFile, FileReport, OcrDump};
use crate::pipeline::detection::ParseMode;
use crate::pipeline::enrich::enrich_markdown;
use crate::pipeline::ingest::{self, DocumentKind};
use crate::pipeline::layout::merge_text_layer;
use crate::pipeline::markdown::{self, AnalyzedPage};
use crate::pipeline::order::{bounding_extent, fit_to_image, linearize};
use crate::pipeline::postprocess::{finalize_markdown, tidy_markdown};
use crate::pipeline::scan::scan_image_refs;
use crate::session::Session;
use glob::{glob_with, MatchOptions, Pattern};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Name of the per-run scratch directory inside the output directory.
pub const TEMP_DIR_NAME: &str = "_temp";

/// Convert a file, or every supported file under a directory, into
/// `output_dir/<name>.md`.
///
/// # Errors
/// Only [`Doc2MdError::InputNotFound`] and failures to enumerate the input
/// or create `output_dir`. Per-file failures land in [`BatchReport::failed`].
pub async fn convert_path(
    input: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    session: &Session,
) -> Result<BatchReport, Doc2MdError> {
    let input = input.as_ref();
    let output_dir = output_dir.as_ref();

    if !input.exists() {
        return Err(Doc2MdError::InputNotFound {
            path: input.to_path_buf(),
        });
    }

    let files = if input.is_dir() {
        collect_inputs(input)?
    } else {
        vec![input.to_path_buf()]
    };
    info!("{} file(s) to convert from {}", files.len(), input.display());

    tokio::fs::create_dir_all(output_dir)
        .await
        .map_err(|e| Doc2MdError::io(output_dir, e))?;

    let callback = session.config().progress_callback.clone();
    let total = files.len();
    if let Some(ref cb) = callback {
        cb.on_batch_start(total);
    }

    let mut report = BatchReport::default();
    for (idx, file) in files.iter().enumerate() {
        let index = idx + 1;
        if let Some(ref cb) = callback {
            cb.on_file_start(index, total, file);
        }
        match convert_file(file, output_dir, session).await {
            Ok(file_report) => {
                info!(
                    "Converted {} → {} ({}/{} images enriched)",
                    file.display(),
                    file_report.output.display(),
                    file_report.images_enriched,
                    file_report.images_found
                );
                if let Some(ref cb) = callback {
                    cb.on_file_complete(index, total, file);
                }
                report.succeeded.push(file_report);
            }
            Err(e) => {
                warn!("Failed to convert {}: {}", file.display(), e);
                let error = e.to_string();
                if let Some(ref cb) = callback {
                    cb.on_file_error(index, total, file, &error);
                }
                report.failed.push(FailedFile {
                    path: file.clone(),
                    error,
                });
            }
        }
    }

    if let Some(ref cb) = callback {
        cb.on_batch_complete(total, report.succeeded.len());
    }
    Ok(report)
}

/// Every file under `dir` with a supported extension, recursively, sorted.
///
/// Extensions match case-insensitively. Anything inside a `_temp` directory
/// is skipped so a previous run's leftovers are never picked up as input.
pub fn collect_inputs(dir: &Path) -> Result<Vec<PathBuf>, Doc2MdError> {
    let pattern = format!("{}/**/*", Pattern::escape(&dir.to_string_lossy()));
    let options = MatchOptions {
        case_sensitive: false,
        ..MatchOptions::new()
    };
    let entries = glob_with(&pattern, options)
        .map_err(|e| Doc2MdError::Internal(format!("invalid glob pattern {pattern}: {e}")))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = match entry {
            Ok(p) => p,
            Err(e) => {
                warn!("Skipping unreadable entry: {}", e);
                continue;
            }
        };
        let in_temp = path
            .strip_prefix(dir)
            .map(|rel| rel.components().any(|c| c.as_os_str() == TEMP_DIR_NAME))
            .unwrap_or(false);
        let supported = path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(DocumentKind::from_extension)
            .is_some();
        if path.is_file() && supported && !in_temp {
            files.push(path);
        }
    }
    files.sort();
    debug!("Collected {} inputs under {}", files.len(), dir.display());
    Ok(files)
}

/// Run the full pipeline on one file and write `output_dir/<stem>.md`.
///
/// The working directory `output_dir/_temp/<stem>/` is removed on success
/// unless `keep_temp` is set, and left behind on failure for inspection.
pub async fn convert_file(
    path: &Path,
    output_dir: &Path,
    session: &Session,
) -> Result<FileReport, Doc2MdError> {
    let start = Instant::now();
    let config = session.config();
    let kind = DocumentKind::from_path(path)?;
    let stem = file_stem(path)?;

    let temp_root = output_dir.join(TEMP_DIR_NAME);
    let work_dir = temp_root.join(&stem);
    let image_dir = work_dir.join("images");
    tokio::fs::create_dir_all(&image_dir)
        .await
        .map_err(|e| Doc2MdError::io(&image_dir, e))?;
    info!("Converting {} ({:?})", path.display(), kind);

    // ── Analyse and dump ─────────────────────────────────────────────────
    let (mode, pages) = analyze_document(path, kind, session).await?;
    let page_count = pages.len();
    let raw = tidy_markdown(&markdown::render_document(&pages, &image_dir)?);
    drop(pages);

    let intermediate = work_dir.join(format!("{stem}.md"));
    tokio::fs::write(&intermediate, &raw)
        .await
        .map_err(|e| Doc2MdError::io(&intermediate, e))?;

    // ── Enrich ───────────────────────────────────────────────────────────
    let refs = scan_image_refs(&raw);
    if !refs.is_empty() {
        info!("Found {} image reference(s) to enrich", refs.len());
    }
    let enrichment = enrich_markdown(
        &raw,
        &refs,
        &image_dir,
        session.analyzer(),
        session.captioner(),
    )
    .await;

    // ── Write ────────────────────────────────────────────────────────────
    let output = output_dir.join(format!("{stem}.md"));
    write_atomic(&output, &finalize_markdown(&enrichment.markdown)).await?;

    if !config.keep_temp {
        remove_work_dir(&work_dir, &temp_root).await;
    }

    Ok(FileReport {
        input: path.to_path_buf(),
        output,
        kind,
        mode,
        pages: page_count,
        images_found: enrichment.found,
        images_enriched: enrichment.enriched,
        issues: enrichment.issues,
        duration_ms: start.elapsed().as_millis() as u64,
    })
}

/// Analyse a single image and write `<stem>.detections.json` and `<stem>.md`
/// to `output_dir`. No captioning, no enrichment.
pub async fn ocr_image(
    path: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    session: &Session,
) -> Result<OcrDump, Doc2MdError> {
    let path = path.as_ref();
    let output_dir = output_dir.as_ref();
    if !path.exists() {
        return Err(Doc2MdError::InputNotFound {
            path: path.to_path_buf(),
        });
    }
    let stem = file_stem(path)?;

    let rgb = ingest::load_image(path).await?.to_rgb8();
    let label = path.display().to_string();
    let mut detections = session
        .analyzer()
        .analyze(&rgb, ParseMode::Ocr, &label)
        .await?;
    let extent = bounding_extent(&detections);
    fit_to_image(&mut detections, rgb.width(), rgb.height());
    let text = linearize(&detections);

    let dump = OcrDump {
        input: path.to_path_buf(),
        image_size: (rgb.width(), rgb.height()),
        extent,
        detections,
        text,
    };

    tokio::fs::create_dir_all(output_dir)
        .await
        .map_err(|e| Doc2MdError::io(output_dir, e))?;
    let json = serde_json::to_string_pretty(&dump)
        .map_err(|e| Doc2MdError::Internal(format!("failed to serialise detections: {e}")))?;
    write_atomic(&output_dir.join(format!("{stem}.detections.json")), &json).await?;
    write_atomic(
        &output_dir.join(format!("{stem}.md")),
        &finalize_markdown(&dump.text),
    )
    .await?;

    info!(
        "OCR of {}: {} detections, extent {}x{}",
        path.display(),
        dump.detections.len(),
        extent.0,
        extent.1
    );
    Ok(dump)
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Produce page images and their detections, choosing the route by kind.
async fn analyze_document(
    path: &Path,
    kind: DocumentKind,
    session: &Session,
) -> Result<(ParseMode, Vec<AnalyzedPage>), Doc2MdError> {
    let config = session.config();
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let pdf = match kind {
        DocumentKind::Image => {
            let image = ingest::load_image(path).await?;
            let rgb = image.to_rgb8();
            let mut detections = session.analyzer().analyze(&rgb, ParseMode::Ocr, &name).await?;
            fit_to_image(&mut detections, rgb.width(), rgb.height());
            let page = AnalyzedPage {
                number: 1,
                image,
                detections,
            };
            return Ok((ParseMode::Ocr, vec![page]));
        }
        DocumentKind::Pdf => ingest::load_pdf(path, config, false).await?,
        DocumentKind::Office => {
            let converted = ingest::office_to_pdf(path, &config.office_converter).await?;
            ingest::load_pdf(&converted.path, config, true).await?
        }
    };

    let mode = pdf.mode;
    let total = pdf.pages.len();
    let mut analyzed = Vec::with_capacity(total);
    for page in pdf.pages {
        let label = format!("{} p{}/{}", name, page.number, total);
        let rgb = page.image.to_rgb8();
        let mut detections = session.analyzer().analyze(&rgb, mode, &label).await?;
        fit_to_image(&mut detections, rgb.width(), rgb.height());
        if mode == ParseMode::Text {
            detections = merge_text_layer(page.text_layer, detections);
        }
        analyzed.push(AnalyzedPage {
            number: page.number,
            image: page.image,
            detections,
        });
    }
    Ok((mode, analyzed))
}

fn file_stem(path: &Path) -> Result<String, Doc2MdError> {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Doc2MdError::Internal(format!("no file name in {}", path.display())))
}

/// Atomic write: write to `<path>.tmp`, then rename.
async fn write_atomic(path: &Path, contents: &str) -> Result<(), Doc2MdError> {
    let failed = |e| Doc2MdError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(failed)?;
    }
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);
    tokio::fs::write(&tmp_path, contents).await.map_err(failed)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(failed)
}

/// Remove a file's working directory, then `_temp` itself once it is empty.
async fn remove_work_dir(work_dir: &Path, temp_root: &Path) {
    if let Err(e) = tokio::fs::remove_dir_all(work_dir).await {
        warn!("Could not remove {}: {}", work_dir.display(), e);
        return;
    }
    // Fails while other files' work dirs remain; that is fine.
    let _ = tokio::fs::remove_dir(temp_root).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn collect_inputs_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("sub/deeper")).unwrap();
        fs::create_dir_all(root.join("_temp/old/images")).unwrap();
        for f in [
            "b.PDF",
            "a.png",
            "notes.txt",
            "sub/c.docx",
            "sub/deeper/d.TIF",
            "_temp/old/images/page001_01.png",
        ] {
            fs::write(root.join(f), b"x").unwrap();
        }

        let files = collect_inputs(root).unwrap();
        let rel: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(rel, vec!["a.png", "b.PDF", "sub/c.docx", "sub/deeper/d.TIF"]);
    }

    #[test]
    fn file_stem_of_nested_path() {
        assert_eq!(file_stem(Path::new("in/report.v2.pdf")).unwrap(), "report.v2");
    }

    #[tokio::test]
    async fn write_atomic_leaves_no_tmp() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested/out.md");
        write_atomic(&out, "# hi\n").await.unwrap();
        assert_eq!(fs::read_to_string(&out).unwrap(), "# hi\n");
        assert!(!dir.path().join("nested/out.md.tmp").exists());
    }
}
