use std::sync::Arc;
use std::time::Duration;

use magnet_types::config::AiConfig;
use magnet_types::job::{ExecutionStepRecord, StepDetails};
use serde_json::json;
use tracing::Instrument;

use crate::ports::{AiProvider, AiRequest, BoxFuture, UsageRecorder};
use crate::workflow::error::StepError;
use crate::workflow::registry::{StepHandler, StepInvocation, StepOutcome};

use super::{generate_with_image_retry, record_usage};

/// Text generation through the AI provider.
pub struct AiGenerationHandler {
    ai: Arc<dyn AiProvider>,
    usage: Arc<dyn UsageRecorder>,
    default_model: String,
    timeout: Duration,
}

impl AiGenerationHandler {
    pub fn new(ai: Arc<dyn AiProvider>, usage: Arc<dyn UsageRecorder>, config: &AiConfig) -> Self {
        Self {
            ai,
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

        let request = AiRequest {
            model: model.clone(),
            instructions: step.instructions.clone().unwrap_or_default(),
            input: invocation.input_text(),
            tools: step.tools.clone(),
            tool_choice: step.tool_choice.clone(),
        };
        let request_details = json!({
            "model": request.model,
            "instructions": request.instructions,
            "input_length": request.input.len(),
            "tools": request.tools,
            "tool_choice": request.tool_choice,
        });

        let response = generate_with_image_retry(self.ai.as_ref(), request, self.timeout).await?;

        tracing::debug!(
            gen_ai.usage.input_tokens = response.usage_info.input_tokens,
            gen_ai.usage.output_tokens = response.usage_info.output_tokens,
            "generation complete"
        );

        record_usage(
            self.usage.as_ref(),
            self.ai.name(),
            &invocation,
            &model,
            &response.usage_info,
        )
        .await;

        let mut record = ExecutionStepRecord::completed(
            step.step_order,
            step.step_name.clone(),
            StepDetails::AiGeneration {
                model,
                request_details,
                response_details: json!({
                    "response_id": response.response_id,
                    "output_length": response.output_text.len(),
                }),
                usage_info: Some(response.usage_info),
            },
        );
        record.output = Some(response.output_text.clone());

        Ok(StepOutcome {
            output: response.output_text,
            artifact_ids: Vec::new(),
            record,
        })
    }
}

impl StepHandler for AiGenerationHandler {
    fn execute(&self, invocation: StepInvocation) -> BoxFuture<'_, Result<StepOutcome, StepError>> {
        let span = tracing::info_span!(
            "ai_generation",
            job_id = %invocation.job_id,
            step_order = invocation.step.step_order,
            gen_ai.operation.name = "chat",
            gen_ai.request.model = invocation.step.model.as_deref().unwrap_or(&self.default_model),
        );
        Box::pin(self.run(invocation).instrument(span))
    }
}
