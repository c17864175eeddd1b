use std::sync::Arc;
use std::time::Duration;

use magnet_types::config::AiConfig;
use magnet_types::job::{ExecutionStepRecord, StepDetails};

use crate::ports::{AiProvider, AiRequest, ArtifactStore, BoxFuture, NewArtifact, UsageRecorder};
use crate::workflow::error::StepError;
use crate::workflow::registry::{StepHandler, StepInvocation, StepOutcome};
use crate::workflow::tracking::strip_code_fences;

use super::{generate_with_image_retry, record_usage};

const DEFAULT_HTML_INSTRUCTIONS: &str =
    "Produce a complete, self-contained HTML document from the content below.";

/// Generates an HTML document from the accumulated context and stores it.
pub struct HtmlGenerationHandler {
    ai: Arc<dyn AiProvider>,
    artifacts: Arc<dyn ArtifactStore>,
    usage: Arc<dyn UsageRecorder>,
    default_model: String,
    timeout: Duration,
}

impl HtmlGenerationHandler {
    pub fn new(
        ai: Arc<dyn AiProvider>,
        artifacts: Arc<dyn ArtifactStore>,
        usage: Arc<dyn UsageRecorder>,
        config: &AiConfig,
    ) -> Self {
        Self {
            ai,
            artifacts,
            usage,
            default_model: config.default_model.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    async fn run(&self, invocation: StepInvocation) -> Result<StepOutcome, StepError> {
        let step = &invocation.step;
        let model = step
            .model
            .clone()
            .unwrap_or_else(|| self.default_model.clone());

        let mut input = invocation.input_text();
        if let Some(template) = step.template_html.as_deref().filter(|t| !t.trim().is_empty()) {
            input.push_str("\n\n--- HTML Template ---\n");
            input.push_str(template);
        }

        let request = AiRequest {
            model: model.clone(),
            instructions: step
                .instructions
                .clone()
                .unwrap_or_else(|| DEFAULT_HTML_INSTRUCTIONS.to_string()),
            input,
            tools: Vec::new(),
            tool_choice: None,
        };
        let response = generate_with_image_retry(self.ai.as_ref(), request, self.timeout).await?;
        record_usage(
            self.usage.as_ref(),
            self.ai.name(),
            &invocation,
            &model,
            &response.usage_info,
        )
        .await;

        let html = strip_code_fences(&response.output_text).to_string();
        let artifact_id = self
            .artifacts
            .store_artifact(NewArtifact::text(
                &invocation.tenant_id,
                &invocation.job_id,
                "html_step",
                &format!("step-{}.html", step.step_order),
                "text/html; charset=utf-8",
                &html,
            ))
            .await
            .map_err(StepError::artifact)?;

        tracing::debug!(
            job_id = %invocation.job_id,
            step_order = step.step_order,
            artifact_id = %artifact_id,
            "stored generated HTML"
        );

        let mut record = ExecutionStepRecord::completed(
            step.step_order,
            step.step_name.clone(),
            StepDetails::HtmlGeneration {
                model,
                usage_info: Some(response.usage_info),
            },
        );
        record.output = Some(html.clone());
        record.artifact_id = Some(artifact_id.clone());

        Ok(StepOutcome {
            output: html,
            artifact_ids: vec![artifact_id],
            record,
        })
    }
}

impl StepHandler for HtmlGenerationHandler {
    fn execute(&self, invocation: StepInvocation) -> BoxFuture<'_, Result<StepOutcome, StepError>> {
        Box::pin(self.run(invocation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::AiResponse;
    use crate::testing::{MemoryArtifacts, MockUsage, ScriptedAi, invocation, step};
    use magnet_types::workflow::StepType;

    #[tokio::test]
    async fn test_stores_unfenced_html_artifact() {
        let ai = ScriptedAi::new();
        ai.push(Ok(AiResponse {
            output_text: "```html\n<html><body>Guide</body></html>\n```".to_string(),
            ..Default::default()
        }));
        let artifacts = MemoryArtifacts::new();
        let handler =
            HtmlGenerationHandler::new(ai.clone(), artifacts.clone(), MockUsage::new(), &AiConfig::default());

        let mut s = step(3, StepType::HtmlGeneration);
        s.template_html = Some("<main>{{content}}</main>".to_string());
        let outcome = handler.execute(invocation(s)).await.unwrap();

        assert_eq!(outcome.output, "<html><body>Guide</body></html>");
        assert_eq!(outcome.artifact_ids.len(), 1);
        assert_eq!(outcome.record.artifact_id, Some(outcome.artifact_ids[0].clone()));
        let stored = artifacts.get(&outcome.artifact_ids[0]).unwrap();
        assert_eq!(stored.filename, "step-3.html");
        assert!(ai.requests()[0].input.contains("--- HTML Template ---"));
    }

    #[tokio::test]
    async fn test_artifact_failure_fails_step() {
        let artifacts = MemoryArtifacts::failing();
        let handler = HtmlGenerationHandler::new(
            ScriptedAi::new(),
            artifacts,
            MockUsage::new(),
            &AiConfig::default(),
        );
        let err = handler
            .execute(invocation(step(1, StepType::HtmlGeneration)))
            .await
            .unwrap_err();
        assert_eq!(err.error_type(), "ArtifactStorageError");
    }
}
