//! Configuration types for document-to-Markdown conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. One struct holds every knob so a run
//! can be logged, shared with the [`crate::session::Session`], and reproduced.

use crate::error::Doc2MdError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Model used when a provider is named but no model is given.
pub const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// Configuration for a conversion run.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_doc2md::ConversionConfig;
///
/// let config = ConversionConfig::builder()
///     .dpi(200)
///     .model("gpt-4.1-mini")
///     .max_retries(2)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Rendering DPI used when rasterising PDF pages. Range: 72–400. Default: 150.
    pub dpi: u32,

    /// Maximum rendered page dimension (width or height) in pixels. Default: 2000.
    ///
    /// Caps memory for oversized pages (posters, drawings) independently of DPI.
    pub max_rendered_pixels: u32,

    /// LLM model identifier, e.g. "gpt-4.1-nano", "minicpm-v".
    /// If None, uses [`DEFAULT_MODEL`] or the provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature for every VLM call. Default: 0.1.
    pub temperature: f32,

    /// Maximum tokens the model may generate per call. Default: 4096.
    pub max_tokens: usize,

    /// Maximum retry attempts on a failed VLM call. Default: 3.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-VLM-call timeout in seconds. Default: 120.
    ///
    /// A hung call would otherwise block the whole sequential batch.
    pub api_timeout_secs: u64,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Custom captioning prompt. If None, uses [`crate::prompts::CAPTION_PROMPT`].
    pub caption_prompt: Option<String>,

    /// Custom layout-analysis prompt. If None, uses the built-in prompts.
    pub layout_prompt: Option<String>,

    /// Average text-layer characters per page below which a PDF is treated
    /// as scanned and analysed in OCR mode. Default: 50.
    pub min_text_chars_per_page: usize,

    /// LibreOffice executable used to turn Office documents into PDF. Default: `soffice`.
    pub office_converter: PathBuf,

    /// Keep `_temp/<name>/` after a file succeeds. Default: false.
    pub keep_temp: bool,

    /// Per-file progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            dpi: 150,
            max_rendered_pixels: 2000,
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.1,
            max_tokens: 4096,
            max_retries: 3,
            retry_backoff_ms: 500,
            api_timeout_secs: 120,
            password: None,
            caption_prompt: None,
            layout_prompt: None,
            min_text_chars_per_page: 50,
            office_converter: PathBuf::from("soffice"),
            keep_temp: false,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("dpi", &self.dpi)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("min_text_chars_per_page", &self.min_text_chars_per_page)
            .field("office_converter", &self.office_converter)
            .field("keep_temp", &self.keep_temp)
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ConversionConfig`].
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 400);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn caption_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.caption_prompt = Some(prompt.into());
        self
    }

    pub fn layout_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.layout_prompt = Some(prompt.into());
        self
    }

    pub fn min_text_chars_per_page(mut self, n: usize) -> Self {
        self.config.min_text_chars_per_page = n;
        self
    }

    pub fn office_converter(mut self, exe: impl Into<PathBuf>) -> Self {
        self.config.office_converter = exe.into();
        self
    }

    pub fn keep_temp(mut self, v: bool) -> Self {
        self.config.keep_temp = v;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Doc2MdError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 400 {
            return Err(Doc2MdError::InvalidConfig(format!(
                "DPI must be 72–400, got {}",
                c.dpi
            )));
        }
        if c.api_timeout_secs == 0 {
            return Err(Doc2MdError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        if c.office_converter.as_os_str().is_empty() {
            return Err(Doc2MdError::InvalidConfig(
                "Office converter executable must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}
