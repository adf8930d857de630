//! CLI binary for edgequake-doc2md.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_doc2md::{
    convert_path, ocr_image, BatchProgressCallback, BatchReport, ConversionConfig,
    ProgressCallback, Session,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar over the files of the batch, one log
/// line per finished file.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Start of the file currently being converted.
    started: Mutex<Option<Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Scanning input…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            started: Mutex::new(None),
            errors: AtomicUsize::new(0),
        })
    }

    fn elapsed_secs(&self) -> f64 {
        self.started
            .lock()
            .ok()
            .and_then(|mut s| s.take())
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl BatchProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_files: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} files  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        self.bar.set_length(total_files as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Converting");
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Converting {total_files} file(s)…"))
        ));
    }

    fn on_file_start(&self, _index: usize, _total: usize, path: &Path) {
        if let Ok(mut s) = self.started.lock() {
            *s = Some(Instant::now());
        }
        self.bar.set_message(file_name(path));
    }

    fn on_file_complete(&self, index: usize, total: usize, path: &Path) {
        let secs = self.elapsed_secs();
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}  {}",
            green("✓"),
            index,
            total,
            file_name(path),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_file_error(&self, index: usize, total: usize, path: &Path, error: &str) {
        let secs = self.elapsed_secs();
        self.errors.fetch_add(1, Ordering::SeqCst);

        // Keep the log line on one row.
        let first_line = error.lines().next().unwrap_or_default();
        let msg = if first_line.chars().count() > 80 {
            format!("{}\u{2026}", first_line.chars().take(79).collect::<String>())
        } else {
            first_line.to_string()
        };

        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}  {}  {}",
            red("✗"),
            index,
            total,
            file_name(path),
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total_files: usize, success_count: usize) {
        let failed = total_files.saturating_sub(success_count);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} file(s) converted successfully",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} file(s) converted  ({} failed)",
                if failed == total_files {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&success_count.to_string()),
                total_files,
                red(&failed.to_string()),
            );
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert everything under ./resource into ./output
  doc2md

  # Convert one file
  doc2md report.pdf out/

  # Use a specific model
  doc2md --provider openai --model gpt-4.1-mini ./scans ./md

  # Local model through Ollama
  doc2md --provider ollama --model llava ./resource

  # Layout/OCR of a single image: writes <name>.detections.json and <name>.md
  doc2md --ocr-only figure.png out/

  # Machine-readable batch report
  doc2md --json ./resource output > report.json

SUPPORTED INPUTS:
  .pdf  .doc .docx .xls .xlsx .ppt .pptx  .jpg .jpeg .png .bmp .tiff .tif
  Office files need LibreOffice (`soffice`) on PATH, or --soffice <path>.

OUTPUT:
  <output>/<name>.md            final markdown, one per input file
  <output>/_temp/<name>/        working directory, removed after success

EXIT STATUS:
  1 if the input path does not exist, otherwise 0. Files that fail are
  listed on stderr (or under "failed" with --json).

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Directory containing libpdfium
"#;

/// Convert PDFs, Office documents and images to enriched Markdown.
#[derive(Parser, Debug)]
#[command(
    name = "doc2md",
    version,
    about = "Convert PDFs, Office documents and images to Markdown with OCR text and image descriptions",
    long_about = "Convert PDFs, Office documents and images to Markdown. Every figure is replaced \
by a description written by a vision LLM followed by the text recognised inside it. Supports \
OpenAI, Anthropic, Google Gemini, Azure OpenAI, and any OpenAI-compatible endpoint (Ollama, \
vLLM, LiteLLM, etc.).",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Input file or directory.
    #[arg(default_value = "./resource", env = "DOC2MD_INPUT")]
    input: PathBuf,

    /// Output directory.
    #[arg(default_value = "output", env = "DOC2MD_OUTPUT")]
    output: PathBuf,

    /// LLM model ID (e.g. gpt-4.1-nano, gpt-4.1, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(
        long,
        env = "EDGEQUAKE_PROVIDER",
        long_help = "LLM provider. Auto-detected from API key env vars if not set.\n\
          Supported: openai, anthropic, gemini, azure, ollama, or any OpenAI-compatible URL."
    )]
    provider: Option<String>,

    /// PDF rendering DPI (72–400).
    #[arg(long, env = "DOC2MD_DPI", default_value_t = 150,
          value_parser = clap::value_parser!(u32).range(72..=400))]
    dpi: u32,

    /// Longest rendered page edge in pixels.
    #[arg(long, env = "DOC2MD_MAX_PIXELS", default_value_t = 2000)]
    max_pixels: u32,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "DOC2MD_PASSWORD")]
    password: Option<String>,

    /// Path to a text file with a custom image-description prompt.
    #[arg(long, env = "DOC2MD_CAPTION_PROMPT")]
    caption_prompt: Option<PathBuf>,

    /// Path to a text file with a custom layout-analysis prompt.
    #[arg(long, env = "DOC2MD_LAYOUT_PROMPT")]
    layout_prompt: Option<PathBuf>,

    /// Max LLM output tokens per call.
    #[arg(long, env = "DOC2MD_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "DOC2MD_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Retries per LLM call on failure.
    #[arg(long, env = "DOC2MD_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Per-call LLM timeout in seconds.
    #[arg(long, env = "DOC2MD_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// Text-layer characters per page below which a PDF is OCR'd.
    #[arg(long, env = "DOC2MD_MIN_TEXT_CHARS", default_value_t = 50)]
    min_text_chars: usize,

    /// LibreOffice executable used for Office documents.
    #[arg(long, env = "DOC2MD_SOFFICE", default_value = "soffice")]
    soffice: PathBuf,

    /// Keep `<output>/_temp/<name>/` after a file succeeds.
    #[arg(long, env = "DOC2MD_KEEP_TEMP")]
    keep_temp: bool,

    /// Only run layout/OCR on a single image and dump the detections.
    #[arg(long)]
    ocr_only: bool,

    /// Print the run report as JSON on stdout.
    #[arg(long, env = "DOC2MD_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "DOC2MD_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DOC2MD_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "DOC2MD_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs while the progress bar is active.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.ocr_only;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    if !cli.input.exists() {
        eprintln!(
            "{} Input path not found: {}",
            red("✘"),
            bold(&cli.input.display().to_string())
        );
        std::process::exit(1);
    }

    // ── Build config and session ─────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn BatchProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb).await?;
    let session = Session::from_config(config).context("Failed to set up the LLM provider")?;

    // ── OCR-only mode ────────────────────────────────────────────────────
    if cli.ocr_only {
        let dump = ocr_image(&cli.input, &cli.output, &session)
            .await
            .context("OCR failed")?;
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&dump).context("Failed to serialise detections")?
            );
        } else {
            println!("{}", dump.text);
        }
        if !cli.quiet {
            eprintln!(
                "{}  {} detections  extent {}x{}  →  {}",
                green("✔"),
                dump.detections.len(),
                dump.extent.0,
                dump.extent.1,
                bold(&cli.output.display().to_string()),
            );
        }
        return Ok(());
    }

    // ── Run conversion ───────────────────────────────────────────────────
    let report = convert_path(&cli.input, &cli.output, &session)
        .await
        .context("Conversion failed")?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialise report")?
        );
    } else if !cli.quiet {
        print_summary(&report, show_progress);
    }

    Ok(())
}

/// Per-file lines when the progress bar was off, then failures and image issues.
fn print_summary(report: &BatchReport, progress_shown: bool) {
    if !progress_shown {
        for file in &report.succeeded {
            eprintln!(
                "{} {}  →  {}  {}",
                green("✓"),
                file.input.display(),
                bold(&file.output.display().to_string()),
                dim(&format!(
                    "{}/{} images, {}ms",
                    file.images_enriched, file.images_found, file.duration_ms
                )),
            );
        }
        for failed in &report.failed {
            eprintln!("{} {}  {}", red("✗"), failed.path.display(), red(&failed.error));
        }
    }
    for file in &report.succeeded {
        for issue in &file.issues {
            eprintln!("  {} {}: {}", cyan("⚠"), file.input.display(), issue);
        }
    }
    if !progress_shown {
        eprintln!(
            "Converted {}/{} file(s)",
            report.succeeded.len(),
            report.total()
        );
    }
}

/// Map CLI args to `ConversionConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .dpi(cli.dpi)
        .max_rendered_pixels(cli.max_pixels)
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .max_retries(cli.max_retries)
        .api_timeout_secs(cli.api_timeout)
        .min_text_chars_per_page(cli.min_text_chars)
        .office_converter(cli.soffice.clone())
        .keep_temp(cli.keep_temp);

    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(ref password) = cli.password {
        builder = builder.password(password.clone());
    }
    if let Some(ref path) = cli.caption_prompt {
        builder = builder.caption_prompt(read_prompt(path).await?);
    }
    if let Some(ref path) = cli.layout_prompt {
        builder = builder.layout_prompt(read_prompt(path).await?);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

async fn read_prompt(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read prompt from {:?}", path))
}
