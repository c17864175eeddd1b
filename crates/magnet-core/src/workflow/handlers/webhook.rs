use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use magnet_types::config::WebhookSettings;
use magnet_types::job::{ExecutionStepRecord, StepDetails};
use serde_json::{Map, Value, json};

use crate::ports::{BoxFuture, WebhookRequest, WebhookTransport};
use crate::workflow::error::StepError;
use crate::workflow::registry::{StepHandler, StepInvocation, StepOutcome};

use super::truncate;

/// Response bodies kept in records and error messages.
const MAX_RECORDED_BODY: usize = 4096;

/// Sends the step's JSON payload to its webhook URL.
pub struct WebhookHandler {
    transport: Arc<dyn WebhookTransport>,
    timeout: Duration,
}

impl WebhookHandler {
    pub fn new(transport: Arc<dyn WebhookTransport>, settings: &WebhookSettings) -> Self {
        Self {
            transport,
            timeout: Duration::from_secs(settings.timeout_secs),
        }
    }

    async fn run(&self, invocation: StepInvocation) -> Result<StepOutcome, StepError> {
        let step = &invocation.step;
        let url = step
            .webhook_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| StepError::InvalidConfig("webhook step has no webhook_url".to_string()))?
            .to_string();
        let method = step
            .webhook_method
            .as_deref()
            .unwrap_or("POST")
            .to_ascii_uppercase();

        let payload = build_payload(&invocation);
        let request = WebhookRequest {
            url: url.clone(),
            method: method.clone(),
            headers: step.webhook_headers.clone(),
            payload,
            timeout: self.timeout,
        };

        tracing::debug!(job_id = %invocation.job_id, step_order = step.step_order, url = %url, "sending webhook");

        let response = self
            .transport
            .send(request)
            .await
            .map_err(|e| StepError::WebhookDelivery(e.to_string()))?;

        let body = truncate(&response.body, MAX_RECORDED_BODY).to_string();
        if !response.is_success() {
            return Err(StepError::WebhookDelivery(format!(
                "{method} {url} returned HTTP {}: {body}",
                response.status
            )));
        }

        let mut record = ExecutionStepRecord::completed(
            step.step_order,
            step.step_name.clone(),
            StepDetails::Webhook {
                request_details: json!({
                    "url": url,
                    "method": method,
                    "include_submission": step.includes_submission(),
                    "include_context": step.webhook_include_context,
                }),
                response_details: json!({
                    "status": response.status,
                    "body": body,
                }),
            },
        );
        record.output = Some(body.clone());

        Ok(StepOutcome {
            output: body,
            artifact_ids: Vec::new(),
            record,
        })
    }
}

impl StepHandler for WebhookHandler {
    fn execute(&self, invocation: StepInvocation) -> BoxFuture<'_, Result<StepOutcome, StepError>> {
        Box::pin(self.run(invocation))
    }
}

/// JSON body: job/tenant/step identity, prior step outputs, plus the
/// submission and accumulated context when the step asks for them.
fn build_payload(invocation: &StepInvocation) -> Value {
    let step = &invocation.step;
    let mut payload = Map::new();
    payload.insert("job_id".into(), json!(invocation.job_id));
    payload.insert("tenant_id".into(), json!(invocation.tenant_id));
    payload.insert(
        "step".into(),
        json!({ "step_order": step.step_order, "step_name": step.step_name }),
    );
    if step.includes_submission() {
        payload.insert("submission_data".into(), invocation.submission.clone());
    }
    if step.webhook_include_context {
        payload.insert("context".into(), json!(invocation.previous_context));
    }
    let outputs: Vec<Value> = invocation
        .prior_results
        .iter()
        .map(|r| {
            json!({
                "step_order": r.step_order,
                "step_name": r.step_name,
                "step_type": r.step_type,
                "output": r.output,
                "artifact_ids": r.artifact_ids,
            })
        })
        .collect();
    payload.insert("step_outputs".into(), Value::Array(outputs));
    payload.insert("sent_at".into(), json!(Utc::now().to_rfc3339()));
    Value::Object(payload)
}
