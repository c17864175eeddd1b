//! Incremental persistence of job progress.
//!
//! Wraps a `JobStore` to provide a higher-level API for the coordinator.
//! Every step outcome is persisted before the coordinator moves on, so a
//! crash after step N can only lose step N+1's history.

use std::sync::Arc;

use magnet_types::job::{
    AppendedSteps, ExecutionPlanSummary, ExecutionStepRecord, Job, JobStatus, JobUpdate,
    StepAppend,
};

use crate::ports::JobStore;

// ---------------------------------------------------------------------------
// JobProgress
// ---------------------------------------------------------------------------

/// In-progress job state owned by the coordinator for one call.
#[derive(Debug, Clone, Default)]
pub struct JobProgress {
    pub steps: Vec<ExecutionStepRecord>,
    pub artifacts: Vec<String>,
}

impl JobProgress {
    /// Completed record for `step_order`, if one exists.
    pub fn completed_record(&self, step_order: u32) -> Option<&ExecutionStepRecord> {
        self.steps
            .iter()
            .find(|r| r.step_order == step_order && r.is_completed() && !r.is_final_output())
    }
}

// ---------------------------------------------------------------------------
// CheckpointManager
// ---------------------------------------------------------------------------

/// Generic over `J: JobStore` so it works with any storage backend
/// (SQLite, in-memory mock, etc.).
pub struct CheckpointManager<J: JobStore> {
    store: Arc<J>,
}

impl<J: JobStore> CheckpointManager<J> {
    pub fn new(store: Arc<J>) -> Self {
        Self { store }
    }

    /// Canonical history and artifact list of `job`.
    pub async fn load_progress(&self, job: &Job) -> Result<JobProgress, CheckpointError> {
        let steps = self
            .store
            .load_execution_steps(job)
            .await
            .map_err(|e| CheckpointError::Repository(e.to_string()))?;
        Ok(JobProgress {
            steps,
            artifacts: job.artifacts.clone(),
        })
    }

    /// Persist the resolved plan summary.
    pub async fn checkpoint_plan(
        &self,
        job_id: &str,
        plan: ExecutionPlanSummary,
    ) -> Result<(), CheckpointError> {
        self.update(
            job_id,
            JobUpdate {
                execution_plan: Some(plan),
                ..Default::default()
            },
        )
        .await
    }

    /// Mark the job `running`, clearing errors from an earlier attempt.
    pub async fn checkpoint_running(&self, job_id: &str) -> Result<(), CheckpointError> {
        self.update(
            job_id,
            JobUpdate {
                status: Some(JobStatus::Running),
                clear_error: true,
                ..Default::default()
            },
        )
        .await?;
        tracing::debug!(job_id, "checkpointed job running");
        Ok(())
    }

    /// Append a completed record and its artifacts to the stored history.
    ///
    /// The append runs against the store's canonical lists, not `progress`,
    /// so records written meanwhile by another invocation survive. A record
    /// for a step that already has a completed entry is dropped. `progress`
    /// is refreshed from the persisted lists.
    pub async fn checkpoint_step_complete(
        &self,
        job_id: &str,
        progress: &mut JobProgress,
        record: ExecutionStepRecord,
        artifact_ids: &[String],
    ) -> Result<(), CheckpointError> {
        let step_order = record.step_order;
        let appended = self
            .append(job_id, progress, StepAppend::completed(record, artifact_ids.to_vec()))
            .await?;
        if appended {
            tracing::debug!(job_id, step_order, "checkpointed step complete");
        } else {
            tracing::warn!(job_id, step_order, "step already recorded as completed, dropping duplicate");
        }
        Ok(())
    }

    /// Append a failed record and mark the job `failed` in one update.
    pub async fn checkpoint_step_failed(
        &self,
        job_id: &str,
        progress: &mut JobProgress,
        record: ExecutionStepRecord,
        error_type: &str,
        error_message: &str,
    ) -> Result<(), CheckpointError> {
        let step_order = record.step_order;
        self.append(job_id, progress, StepAppend::failed(record, error_type, error_message))
            .await?;
        tracing::debug!(job_id, step_order, error_type, "checkpointed step failed");
        Ok(())
    }

    /// Mark the job `failed` without a step record.
    pub async fn checkpoint_job_failed(
        &self,
        job_id: &str,
        error_type: &str,
        error_message: &str,
    ) -> Result<(), CheckpointError> {
        self.update(job_id, JobUpdate::failed(error_type, error_message))
            .await
    }

    async fn append(
        &self,
        job_id: &str,
        progress: &mut JobProgress,
        append: StepAppend,
    ) -> Result<bool, CheckpointError> {
        let AppendedSteps {
            steps,
            artifacts,
            appended,
        } = self
            .store
            .append_execution_step(job_id, append)
            .await
            .map_err(|e| CheckpointError::Repository(e.to_string()))?;
        progress.steps = steps;
        progress.artifacts = artifacts;
        Ok(appended)
    }

    async fn update(&self, job_id: &str, update: JobUpdate) -> Result<(), CheckpointError> {
        self.store
            .update_job(job_id, update)
            .await
            .map_err(|e| CheckpointError::Repository(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// CheckpointError
// ---------------------------------------------------------------------------

/// Errors from checkpoint operations.
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    #[error("checkpoint repository error: {0}")]
    Repository(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{InMemoryJobStore, completed_record};
    use magnet_types::workflow::StepType;
    use serde_json::json;

    async fn setup() -> (Arc<InMemoryJobStore>, CheckpointManager<InMemoryJobStore>, Job) {
        let store = InMemoryJobStore::new();
        let job = Job::new("job-1", "tenant-1", "wf-1", json!({}));
        store.create_job(&job).await.unwrap();
        (store.clone(), CheckpointManager::new(store), job)
    }

    #[tokio::test]
    async fn test_step_complete_persists_immediately_and_dedupes_artifacts() {
        let (store, checkpoint, job) = setup().await;
        let mut progress = checkpoint.load_progress(&job).await.unwrap();

        checkpoint
            .checkpoint_step_complete("job-1", &mut progress, completed_record(1, "a"), &["art-1".to_string()])
            .await
            .unwrap();
        checkpoint
            .checkpoint_step_complete(
                "job-1",
                &mut progress,
                completed_record(2, "b"),
                &["art-1".to_string(), "art-2".to_string()],
            )
            .await
            .unwrap();

        let stored = store.job("job-1").unwrap();
        assert_eq!(stored.execution_steps.len(), 2);
        assert_eq!(stored.artifacts, vec!["art-1", "art-2"]);
    }

    #[tokio::test]
    async fn test_duplicate_completion_is_dropped() {
        let (store, checkpoint, job) = setup().await;
        let mut progress = checkpoint.load_progress(&job).await.unwrap();
        for _ in 0..2 {
            checkpoint
                .checkpoint_step_complete("job-1", &mut progress, completed_record(1, "a"), &[])
                .await
                .unwrap();
        }
        assert_eq!(store.job("job-1").unwrap().execution_steps.len(), 1);
    }

    #[tokio::test]
    async fn test_step_failed_sets_status_and_error() {
        let (store, checkpoint, job) = setup().await;
        let mut progress = checkpoint.load_progress(&job).await.unwrap();
        checkpoint
            .checkpoint_step_failed(
                "job-1",
                &mut progress,
                ExecutionStepRecord::failed(1, "hook", StepType::Webhook, "HTTP 500"),
                "WebhookDeliveryError",
                "HTTP 500",
            )
            .await
            .unwrap();

        let stored = store.job("job-1").unwrap();
        assert_eq!(stored.status, JobStatus::Failed);
        assert_eq!(stored.error_type.as_deref(), Some("WebhookDeliveryError"));
        assert_eq!(stored.execution_steps.len(), 1);
    }

    #[tokio::test]
    async fn test_stale_progress_keeps_records_written_elsewhere() {
        let (store, checkpoint, job) = setup().await;
        let mut stale = checkpoint.load_progress(&job).await.unwrap();

        // Another invocation records step 1 after `stale` was loaded.
        store.set_steps("job-1", vec![completed_record(1, "a")]);

        checkpoint
            .checkpoint_step_complete("job-1", &mut stale, completed_record(2, "b"), &["art-2".to_string()])
            .await
            .unwrap();

        let orders: Vec<u32> = store.canonical_steps("job-1").iter().map(|r| r.step_order).collect();
        assert_eq!(orders, vec![1, 2]);
        assert_eq!(stale.steps.len(), 2);
        assert!(stale.completed_record(1).is_some());
        assert_eq!(stale.artifacts, vec!["art-2"]);
    }

    #[tokio::test]
    async fn test_running_clears_previous_error() {
        let (store, checkpoint, _job) = setup().await;
        checkpoint
            .checkpoint_job_failed("job-1", "CyclicDependencyError", "cycle")
            .await
            .unwrap();
        checkpoint.checkpoint_running("job-1").await.unwrap();
        let stored = store.job("job-1").unwrap();
        assert_eq!(stored.status, JobStatus::Running);
        assert!(stored.error_type.is_none());
    }
}
