//! Built-in step handlers.
//!
//! One handler per step type:
//! - `ai` -- text generation through the AI provider
//! - `html` -- HTML document generation, stored as an artifact
//! - `webhook` -- outgoing JSON webhook
//! - `browser` -- agent-driven browser session with screenshots
//! - `handoff` -- start a job for another workflow

use std::time::Duration;

use chrono::Utc;
use magnet_types::job::UsageInfo;

use crate::ports::{AiError, AiProvider, AiRequest, AiResponse, UsageRecord, UsageRecorder};

use super::error::StepError;
use super::registry::StepInvocation;

mod ai;
mod browser;
mod handoff;
mod html;
mod webhook;

pub use ai::AiGenerationHandler;
pub use browser::BrowserAutomationHandler;
pub use handoff::HandoffHandler;
pub use html::HtmlGenerationHandler;
pub use webhook::WebhookHandler;

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Call the provider under `timeout`. When the provider rejects an image
/// URL found in the input, strip that URL and retry exactly once.
pub(crate) async fn generate_with_image_retry(
    ai: &dyn AiProvider,
    mut request: AiRequest,
    timeout: Duration,
) -> Result<AiResponse, StepError> {
    match generate_once(ai, request.clone(), timeout).await {
        Err(StepError::Provider(AiError::InvalidImageUrl { url, message }))
            if !url.is_empty() && request.input.contains(&url) =>
        {
            tracing::warn!(url = %url, %message, "provider rejected image URL, retrying without it");
            request.input = request.input.replace(&url, "");
            generate_once(ai, request, timeout).await
        }
        other => other,
    }
}

async fn generate_once(
    ai: &dyn AiProvider,
    request: AiRequest,
    timeout: Duration,
) -> Result<AiResponse, StepError> {
    match tokio::time::timeout(timeout, ai.generate(request)).await {
        Ok(result) => result.map_err(StepError::from),
        Err(_elapsed) => Err(StepError::Timeout(timeout.as_secs())),
    }
}

/// Best-effort usage recording. Failures are logged and swallowed.
pub(crate) async fn record_usage(
    recorder: &dyn UsageRecorder,
    provider: &str,
    invocation: &StepInvocation,
    model: &str,
    usage: &UsageInfo,
) {
    let record = UsageRecord {
        tenant_id: invocation.tenant_id.clone(),
        job_id: invocation.job_id.clone(),
        step_order: invocation.step.step_order,
        provider: provider.to_string(),
        model: model.to_string(),
        usage: usage.clone(),
        recorded_at: Utc::now(),
    };
    if let Err(e) = recorder.record(record).await {
        tracing::warn!(
            job_id = %invocation.job_id,
            step_order = invocation.step.step_order,
            error = %e,
            "failed to record usage"
        );
    }
}

/// Truncate `text` to at most `max` bytes on a char boundary.
pub(crate) fn truncate(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
