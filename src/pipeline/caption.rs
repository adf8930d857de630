//! Captioning collaborator: one image in, one natural-language description out.
//!
//! The orchestrator never lets a captioning error escape; it turns any `Err`
//! into the fixed failure marker. Implementations therefore just report
//! failures honestly and do not need their own fallback text.

use crate::config::ConversionConfig;
use crate::error::Doc2MdError;
use crate::pipeline::{encode, llm, postprocess};
use crate::prompts::CAPTION_PROMPT;
use async_trait::async_trait;
use edgequake_llm::LLMProvider;
use image::DynamicImage;
use std::sync::Arc;

/// Describes images.
#[async_trait]
pub trait Captioner: Send + Sync {
    /// Describe `image`. `label` identifies it in logs.
    async fn describe(&self, image: &DynamicImage, label: &str) -> Result<String, Doc2MdError>;
}

/// [`Captioner`] backed by a vision-capable chat model.
pub struct VlmCaptioner {
    provider: Arc<dyn LLMProvider>,
    config: ConversionConfig,
}

impl VlmCaptioner {
    pub fn new(provider: Arc<dyn LLMProvider>, config: ConversionConfig) -> Self {
        Self { provider, config }
    }

    fn prompt(&self) -> &str {
        self.config
            .caption_prompt
            .as_deref()
            .unwrap_or(CAPTION_PROMPT)
    }
}

#[async_trait]
impl Captioner for VlmCaptioner {
    async fn describe(&self, image: &DynamicImage, label: &str) -> Result<String, Doc2MdError> {
        let data = encode::encode_image(image).map_err(|e| Doc2MdError::ImageDecode {
            path: label.into(),
            detail: format!("PNG encoding failed: {e}"),
        })?;
        let reply =
            llm::ask_about_image(&self.provider, None, self.prompt(), data, &self.config, label)
                .await?;
        let text = postprocess::clean_model_text(&reply);
        if text.is_empty() {
            return Err(Doc2MdError::LlmApiError {
                message: "model returned an empty description".into(),
            });
        }
        Ok(text)
    }
}
