//! VLM interaction shared by the layout analyzer and the captioner.
//!
//! ## Retry Strategy
//!
//! HTTP 429 / 503 errors from LLM APIs are transient. Exponential backoff
//! (`retry_backoff_ms * 2^attempt`, saturating) gives 500 ms → 1 s → 2 s
//! with the defaults. Each attempt is bounded by `api_timeout_secs`; a timed-out
//! attempt counts as a failure and is retried like any other.

use crate::config::ConversionConfig;
use crate::error::Doc2MdError;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// Send one image plus instructions to the VLM, retrying on failure.
/// Returns the reply text.
///
/// `label` names the call in log lines (file name or page number).
pub async fn ask_about_image(
    provider: &Arc<dyn LLMProvider>,
    system_prompt: Option<&str>,
    user_prompt: &str,
    image: ImageData,
    config: &ConversionConfig,
    label: &str,
) -> Result<String, Doc2MdError> {
    let start = Instant::now();
    let mut messages = Vec::with_capacity(2);
    if let Some(system) = system_prompt {
        messages.push(ChatMessage::system(system));
    }
    messages.push(ChatMessage::user_with_images(user_prompt, vec![image]));

    let options = build_options(config);
    let per_call = Duration::from_secs(config.api_timeout_secs);
    let mut last_err = Doc2MdError::LlmApiError {
        message: "no attempt made".into(),
    };

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let backoff = backoff_ms(config.retry_backoff_ms, attempt);
            warn!(
                "{}: retry {}/{} after {}ms",
                label, attempt, config.max_retries, backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        match timeout(per_call, provider.chat(&messages, Some(&options))).await {
            Ok(Ok(response)) => {
                debug!(
                    "{}: {} input tokens, {} output tokens, {:?}",
                    label,
                    response.prompt_tokens,
                    response.completion_tokens,
                    start.elapsed()
                );
                return Ok(response.content);
            }
            Ok(Err(e)) => {
                warn!("{}: attempt {} failed: {}", label, attempt + 1, e);
                last_err = Doc2MdError::LlmApiError {
                    message: e.to_string(),
                };
            }
            Err(_) => {
                warn!(
                    "{}: attempt {} timed out after {}s",
                    label,
                    attempt + 1,
                    config.api_timeout_secs
                );
                last_err = Doc2MdError::ApiTimeout {
                    secs: config.api_timeout_secs,
                };
            }
        }
    }

    Err(last_err)
}

/// Delay before retry number `attempt` (1-based).
fn backoff_ms(base_ms: u64, attempt: u32) -> u64 {
    let factor = 2u64.checked_pow(attempt.saturating_sub(1)).unwrap_or(u64::MAX);
    base_ms.saturating_mul(factor)
}

/// Build `CompletionOptions` from the conversion config.
fn build_options(config: &ConversionConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_options_defaults() {
        let config = ConversionConfig::default();
        let opts = build_options(&config);
        assert_eq!(opts.temperature, Some(0.1));
        assert_eq!(opts.max_tokens, Some(4096));
    }

    #[test]
    fn backoff_doubles_then_saturates() {
        assert_eq!(backoff_ms(500, 1), 500);
        assert_eq!(backoff_ms(500, 2), 1000);
        assert_eq!(backoff_ms(500, 3), 2000);
        assert_eq!(backoff_ms(500, 64), u64::MAX);
        assert_eq!(backoff_ms(500, u32::MAX), u64::MAX);
    }
}
