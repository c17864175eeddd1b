//! Handoff trigger that creates the downstream job in the local store.
//!
//! The new job starts `pending` with the handoff payload as its submission;
//! whatever drives pending jobs picks it up from there.

use std::sync::Arc;

use magnet_core::ports::{BoxFuture, CollaboratorError, HandoffRequest, HandoffTrigger, JobStore, WorkflowStore};
use magnet_types::job::Job;
use uuid::Uuid;

pub struct StoreHandoffTrigger<J: JobStore, W: WorkflowStore> {
    jobs: Arc<J>,
    workflows: Arc<W>,
}

impl<J: JobStore, W: WorkflowStore> StoreHandoffTrigger<J, W> {
    pub fn new(jobs: Arc<J>, workflows: Arc<W>) -> Self {
        Self { jobs, workflows }
    }

    async fn create_downstream_job(&self, request: HandoffRequest) -> Result<String, CollaboratorError> {
        let target = self
            .workflows
            .get_workflow(&request.target_workflow_id)
            .await
            .map_err(|e| CollaboratorError::Io(e.to_string()))?
            .ok_or_else(|| CollaboratorError::NotFound(format!("workflow {}", request.target_workflow_id)))?;
        if target.tenant_id != request.tenant_id {
            return Err(CollaboratorError::Rejected(format!(
                "workflow {} belongs to another tenant",
                target.workflow_id
            )));
        }

        let job = Job::new(
            Uuid::now_v7().to_string(),
            request.tenant_id,
            target.workflow_id,
            request.payload,
        );
        self.jobs
            .create_job(&job)
            .await
            .map_err(|e| CollaboratorError::Io(e.to_string()))?;

        tracing::info!(
            source_job_id = %request.source_job_id,
            target_job_id = %job.job_id,
            workflow_id = %job.workflow_id,
            "handoff job created"
        );
        Ok(job.job_id)
    }
}

impl<J: JobStore, W: WorkflowStore> HandoffTrigger for StoreHandoffTrigger<J, W> {
    fn trigger(&self, request: HandoffRequest) -> BoxFuture<'_, Result<String, CollaboratorError>> {
        Box::pin(self.create_downstream_job(request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::job::SqliteJobStore;
    use crate::sqlite::pool::test_support::test_pool;
    use crate::sqlite::workflow::SqliteWorkflowStore;
    use crate::storage::FilesystemBlobStore;
    use magnet_types::job::JobStatus;
    use magnet_types::workflow::Workflow;
    use serde_json::json;

    fn request(target: &str, tenant: &str) -> HandoffRequest {
        HandoffRequest {
            tenant_id: tenant.into(),
            source_job_id: "job-1".into(),
            target_workflow_id: target.into(),
            payload: json!({"input": "summary"}),
        }
    }

    #[tokio::test]
    async fn test_trigger_creates_pending_job() {
        let (pool, _db) = test_pool().await;
        let blobs = tempfile::tempdir().unwrap();
        let jobs = Arc::new(SqliteJobStore::new(pool.clone(), FilesystemBlobStore::new(blobs.path()), 1 << 20));
        let workflows = Arc::new(SqliteWorkflowStore::new(pool));
        workflows
            .save_workflow(&Workflow {
                workflow_id: "wf-next".into(),
                tenant_id: "tenant-1".into(),
                workflow_name: "Follow-up".into(),
                steps: Vec::new(),
                tracking_enabled: true,
            })
            .await
            .unwrap();

        let trigger = StoreHandoffTrigger::new(jobs.clone(), workflows);
        let job_id = trigger.trigger(request("wf-next", "tenant-1")).await.unwrap();

        let job = jobs.get_job(&job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.workflow_id, "wf-next");
        assert_eq!(job.submission_data["input"], "summary");

        let err = trigger.trigger(request("wf-next", "tenant-2")).await.unwrap_err();
        assert!(matches!(err, CollaboratorError::Rejected(_)));
        let err = trigger.trigger(request("missing", "tenant-1")).await.unwrap_err();
        assert!(matches!(err, CollaboratorError::NotFound(_)));
    }
}
