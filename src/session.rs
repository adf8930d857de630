//! The collaborator handle shared by every file in a run.
//!
//! A [`Session`] is built once, owns the layout analyzer and the captioner,
//! and is passed by reference into the batch driver. Nothing is global: two
//! sessions with different models can coexist in one process.

use crate::config::{ConversionConfig, DEFAULT_MODEL};
use crate::error::Doc2MdError;
use crate::pipeline::caption::{Captioner, VlmCaptioner};
use crate::pipeline::layout::{LayoutAnalyzer, VlmLayoutAnalyzer};
use edgequake_llm::{LLMProvider, ProviderFactory};
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// Analyzer, captioner and configuration for one run.
#[derive(Clone)]
pub struct Session {
    config: ConversionConfig,
    analyzer: Arc<dyn LayoutAnalyzer>,
    captioner: Arc<dyn Captioner>,
}

impl Session {
    /// Resolve an LLM provider and build the VLM-backed collaborators.
    pub fn from_config(config: ConversionConfig) -> Result<Self, Doc2MdError> {
        let provider = resolve_provider(&config)?;
        info!(
            "Using LLM provider: {} (model {})",
            provider.name(),
            provider.model()
        );
        let analyzer = Arc::new(VlmLayoutAnalyzer::new(
            Arc::clone(&provider),
            config.clone(),
        ));
        let captioner = Arc::new(VlmCaptioner::new(provider, config.clone()));
        Ok(Self {
            config,
            analyzer,
            captioner,
        })
    }

    /// Use caller-supplied collaborators, e.g. local models or test doubles.
    pub fn with_collaborators(
        config: ConversionConfig,
        analyzer: Arc<dyn LayoutAnalyzer>,
        captioner: Arc<dyn Captioner>,
    ) -> Self {
        Self {
            config,
            analyzer,
            captioner,
        }
    }

    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    pub fn analyzer(&self) -> &dyn LayoutAnalyzer {
        self.analyzer.as_ref()
    }

    pub fn captioner(&self) -> &dyn Captioner {
        self.captioner.as_ref()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, Doc2MdError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        Doc2MdError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider + model** (`config.provider_name`); the factory reads
///    the matching API key from the environment.
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`),
///    when both are set and non-empty.
/// 4. **OpenAI** when `OPENAI_API_KEY` is set.
/// 5. **Full auto-detection** (`ProviderFactory::from_env`).
fn resolve_provider(config: &ConversionConfig) -> Result<Arc<dyn LLMProvider>, Doc2MdError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_vision_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_vision_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
            return create_vision_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| Doc2MdError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or pass --provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}
