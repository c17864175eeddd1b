//! Handoff trigger port: start a job for another workflow.

use serde_json::Value;

use super::{BoxFuture, CollaboratorError};

#[derive(Debug, Clone)]
pub struct HandoffRequest {
    pub tenant_id: String,
    pub source_job_id: String,
    pub target_workflow_id: String,
    /// Becomes the target job's submission data.
    pub payload: Value,
}

pub trait HandoffTrigger: Send + Sync {
    /// Start the target job and return its id.
    fn trigger(&self, request: HandoffRequest) -> BoxFuture<'_, Result<String, CollaboratorError>>;
}
