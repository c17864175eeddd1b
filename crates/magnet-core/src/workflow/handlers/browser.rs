use std::sync::Arc;
use std::time::Duration;

use magnet_types::config::BrowserSettings;
use magnet_types::job::{ExecutionStepRecord, StepDetails};
use serde_json::json;

use crate::ports::{ArtifactStore, BoxFuture, BrowserDriver, BrowserSession, NewArtifact};
use crate::workflow::error::StepError;
use crate::workflow::registry::{StepHandler, StepInvocation, StepOutcome};

/// Runs an agent-driven browser session and keeps its screenshots.
pub struct BrowserAutomationHandler {
    driver: Arc<dyn BrowserDriver>,
    artifacts: Arc<dyn ArtifactStore>,
    wait_budget: Duration,
    max_actions: u32,
}

impl BrowserAutomationHandler {
    pub fn new(
        driver: Arc<dyn BrowserDriver>,
        artifacts: Arc<dyn ArtifactStore>,
        settings: &BrowserSettings,
    ) -> Self {
        Self {
            driver,
            artifacts,
            wait_budget: Duration::from_secs(settings.wait_budget_secs),
            max_actions: settings.max_actions,
        }
    }

    async fn run(&self, invocation: StepInvocation) -> Result<StepOutcome, StepError> {
        let step = &invocation.step;
        let session = BrowserSession {
            job_id: invocation.job_id.clone(),
            instructions: step.instructions.clone().unwrap_or_default(),
            input: invocation.input_text(),
            start_url: step.browser_start_url.clone(),
            max_actions: step.browser_max_actions.unwrap_or(self.max_actions),
            wait_budget: self.wait_budget,
        };
        let request_details = json!({
            "start_url": session.start_url,
            "max_actions": session.max_actions,
            "wait_budget_secs": self.wait_budget.as_secs(),
        });

        let run = match tokio::time::timeout(self.wait_budget, self.driver.run(session)).await {
            Ok(result) => result.map_err(|e| StepError::Browser(e.to_string()))?,
            Err(_elapsed) => return Err(StepError::Timeout(self.wait_budget.as_secs())),
        };

        let mut artifact_ids = Vec::with_capacity(run.screenshots.len());
        for shot in &run.screenshots {
            let id = self
                .artifacts
                .store_artifact(NewArtifact {
                    tenant_id: invocation.tenant_id.clone(),
                    job_id: invocation.job_id.clone(),
                    artifact_type: "screenshot".to_string(),
                    filename: shot.filename.clone(),
                    content_type: "image/png".to_string(),
                    content: shot.png.clone(),
                })
                .await
                .map_err(StepError::artifact)?;
            artifact_ids.push(id);
        }

        let mut record = ExecutionStepRecord::completed(
            step.step_order,
            step.step_name.clone(),
            StepDetails::BrowserAutomation {
                request_details,
                response_details: json!({
                    "final_url": run.final_url,
                    "actions_taken": run.actions_taken,
                    "screenshot_ids": artifact_ids,
                }),
            },
        );
        record.output = Some(run.output_text.clone());
        record.artifact_id = artifact_ids.last().cloned();

        Ok(StepOutcome {
            output: run.output_text,
            artifact_ids,
            record,
        })
    }
}

impl StepHandler for BrowserAutomationHandler {
    fn execute(&self, invocation: StepInvocation) -> BoxFuture<'_, Result<StepOutcome, StepError>> {
        Box::pin(self.run(invocation))
    }
}
