use std::sync::Arc;

use magnet_types::job::{ExecutionStepRecord, StepDetails};
use magnet_types::workflow::HandoffPayloadMode;
use serde_json::{Value, json};

use crate::ports::{BoxFuture, HandoffRequest, HandoffTrigger};
use crate::workflow::error::StepError;
use crate::workflow::registry::{StepHandler, StepInvocation, StepOutcome};

/// Starts a job for another workflow.
pub struct HandoffHandler {
    trigger: Arc<dyn HandoffTrigger>,
}

impl HandoffHandler {
    pub fn new(trigger: Arc<dyn HandoffTrigger>) -> Self {
        Self { trigger }
    }

    async fn run(&self, invocation: StepInvocation) -> Result<StepOutcome, StepError> {
        let step = &invocation.step;
        let target = step
            .handoff_workflow_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| {
                StepError::InvalidConfig("handoff step has no handoff_workflow_id".to_string())
            })?
            .to_string();

        let payload = handoff_payload(&invocation);
        let target_job_id = self
            .trigger
            .trigger(HandoffRequest {
                tenant_id: invocation.tenant_id.clone(),
                source_job_id: invocation.job_id.clone(),
                target_workflow_id: target.clone(),
                payload,
            })
            .await
            .map_err(|e| StepError::Handoff(e.to_string()))?;

        tracing::info!(
            job_id = %invocation.job_id,
            target_workflow_id = %target,
            target_job_id = %target_job_id,
            "handed off to workflow"
        );

        let output = format!("Handed off to workflow {target} as job {target_job_id}");
        let mut record = ExecutionStepRecord::completed(
            step.step_order,
            step.step_name.clone(),
            StepDetails::Handoff {
                target_workflow_id: target,
                target_job_id: Some(target_job_id),
            },
        );
        record.output = Some(output.clone());

        Ok(StepOutcome {
            output,
            artifact_ids: Vec::new(),
            record,
        })
    }
}

impl StepHandler for HandoffHandler {
    fn execute(&self, invocation: StepInvocation) -> BoxFuture<'_, Result<StepOutcome, StepError>> {
        Box::pin(self.run(invocation))
    }
}

/// Submission data for the target job, per the step's payload mode.
fn handoff_payload(invocation: &StepInvocation) -> Value {
    match invocation.step.handoff_payload_mode {
        HandoffPayloadMode::PreviousStepOutput => json!({
            "input": invocation.previous_step_output().unwrap_or_default(),
            "source_job_id": invocation.job_id,
        }),
        HandoffPayloadMode::FullContext => json!({
            "context": invocation.previous_context,
            "submission_data": invocation.submission,
            "source_job_id": invocation.job_id,
        }),
        HandoffPayloadMode::SubmissionOnly => invocation.submission.clone(),
    }
}
