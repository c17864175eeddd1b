//! Job completion: store the deliverable, merge the final-output record into
//! the canonical history and mark the job completed.
//!
//! The history a caller holds may be stale (per-step invocations each see
//! only their own view), so finalization always reloads the canonical list
//! from the store before appending.

use std::sync::Arc;

use chrono::Utc;
use magnet_types::job::{
    ExecutionStepRecord, Job, JobStatus, JobUpdate, StepDetails, merge_artifact_ids,
};

use crate::ports::{ArtifactStore, JobNotification, JobStore, NewArtifact, Notifier};

use super::error::ReconcileError;

/// Name of the synthesized final-output record.
pub const FINAL_OUTPUT_STEP_NAME: &str = "Final Output";

// ---------------------------------------------------------------------------
// Deliverable
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliverableFormat {
    Html,
    Markdown,
}

impl DeliverableFormat {
    pub fn artifact_type(&self) -> &'static str {
        match self {
            DeliverableFormat::Html => "html_final",
            DeliverableFormat::Markdown => "markdown_final",
        }
    }

    pub fn filename(&self) -> &'static str {
        match self {
            DeliverableFormat::Html => "final.html",
            DeliverableFormat::Markdown => "final.md",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            DeliverableFormat::Html => "text/html; charset=utf-8",
            DeliverableFormat::Markdown => "text/markdown; charset=utf-8",
        }
    }
}

/// Assembled final content of a job.
#[derive(Debug, Clone)]
pub struct FinalDeliverable {
    pub content: String,
    pub format: DeliverableFormat,
}

// ---------------------------------------------------------------------------
// JobCompletionReconciler
// ---------------------------------------------------------------------------

pub struct JobCompletionReconciler<J: JobStore> {
    store: Arc<J>,
    artifacts: Arc<dyn ArtifactStore>,
    notifier: Arc<dyn Notifier>,
}

impl<J: JobStore> JobCompletionReconciler<J> {
    pub fn new(store: Arc<J>, artifacts: Arc<dyn ArtifactStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            store,
            artifacts,
            notifier,
        }
    }

    /// Finalize `job` and return the deliverable's public URL.
    ///
    /// `stale_steps` is only compared against the canonical history for a
    /// divergence warning; it is never persisted.
    pub async fn finalize(
        &self,
        job: &Job,
        stale_steps: &[ExecutionStepRecord],
        deliverable: FinalDeliverable,
    ) -> Result<String, ReconcileError> {
        let format = deliverable.format;
        let artifact_id = self
            .artifacts
            .store_artifact(NewArtifact::text(
                &job.tenant_id,
                &job.job_id,
                format.artifact_type(),
                format.filename(),
                format.content_type(),
                &deliverable.content,
            ))
            .await
            .map_err(|e| ReconcileError::ArtifactStorage(e.to_string()))?;
        let public_url = self
            .artifacts
            .get_public_url(&artifact_id)
            .await
            .map_err(|e| ReconcileError::ArtifactStorage(e.to_string()))?;

        // The blob pointer may have been set by another invocation since
        // `job` was loaded.
        let current = self
            .store
            .get_job(&job.job_id)
            .await?
            .unwrap_or_else(|| job.clone());
        let mut canonical = self.store.load_execution_steps(&current).await?;

        if canonical.len() != stale_steps.len() {
            tracing::warn!(
                job_id = %job.job_id,
                canonical = canonical.len(),
                in_memory = stale_steps.len(),
                "execution history diverged from caller's view, using canonical list"
            );
        }

        let mut record = ExecutionStepRecord::completed(
            (canonical.len() + 1) as u32,
            FINAL_OUTPUT_STEP_NAME,
            StepDetails::FinalOutput {
                artifact_type: format.artifact_type().to_string(),
                filename: format.filename().to_string(),
                url: public_url.clone(),
            },
        );
        record.start_time = Some(Utc::now());
        record.artifact_id = Some(artifact_id.clone());
        canonical.push(record);

        let mut artifacts = current.artifacts.clone();
        merge_artifact_ids(&mut artifacts, std::slice::from_ref(&artifact_id));

        self.store
            .update_job(
                &job.job_id,
                JobUpdate {
                    status: Some(JobStatus::Completed),
                    execution_steps: Some(canonical),
                    artifacts: Some(artifacts),
                    output_url: Some(public_url.clone()),
                    output_artifact_id: Some(artifact_id),
                    completed_at: Some(Utc::now()),
                    clear_error: true,
                    ..Default::default()
                },
            )
            .await?;

        tracing::info!(job_id = %job.job_id, url = %public_url, "job completed");

        let notification = JobNotification {
            job_id: job.job_id.clone(),
            tenant_id: job.tenant_id.clone(),
            workflow_id: job.workflow_id.clone(),
            output_url: public_url.clone(),
        };
        if let Err(e) = self.notifier.job_completed(notification).await {
            tracing::warn!(job_id = %job.job_id, error = %e, "completion notification failed");
        }

        Ok(public_url)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{InMemoryJobStore, MemoryArtifacts, MockNotifier, completed_record};
    use serde_json::json;

    fn html() -> FinalDeliverable {
        FinalDeliverable {
            content: "<html><body>done</body></html>".to_string(),
            format: DeliverableFormat::Html,
        }
    }

    #[tokio::test]
    async fn test_finalize_reloads_canonical_history() {
        let store = InMemoryJobStore::new();
        let job = Job::new("job-1", "tenant-1", "wf-1", json!({}));
        store.create_job(&job).await.unwrap();

        // Another invocation wrote steps 1-3; this caller only saw step 1.
        store.set_steps(
            "job-1",
            vec![completed_record(1, "a"), completed_record(2, "b"), completed_record(3, "c")],
        );
        let stale = vec![completed_record(1, "a")];

        let reconciler =
            JobCompletionReconciler::new(store.clone(), MemoryArtifacts::new(), MockNotifier::new());
        let url = reconciler.finalize(&job, &stale, html()).await.unwrap();

        let stored = store.job("job-1").unwrap();
        assert_eq!(stored.status, JobStatus::Completed);
        assert_eq!(stored.execution_steps.len(), 4);
        let last = stored.execution_steps.last().unwrap();
        assert!(last.is_final_output());
        assert_eq!(last.step_order, 4);
        assert_eq!(stored.output_url.as_deref(), Some(url.as_str()));
        assert!(stored.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_finalize_follows_blob_pointer() {
        let store = InMemoryJobStore::with_offload();
        let job = Job::new("job-2", "tenant-1", "wf-1", json!({}));
        store.create_job(&job).await.unwrap();
        store
            .update_job(
                "job-2",
                JobUpdate::progress(vec![completed_record(1, "a"), completed_record(2, "b")], vec![]),
            )
            .await
            .unwrap();
        assert!(store.job("job-2").unwrap().execution_steps_s3_key.is_some());

        let reconciler =
            JobCompletionReconciler::new(store.clone(), MemoryArtifacts::new(), MockNotifier::new());
        reconciler.finalize(&job, &[], html()).await.unwrap();

        let steps = store.canonical_steps("job-2");
        assert_eq!(steps.len(), 3);
        assert_eq!(steps[2].step_order, 3);
    }

    #[tokio::test]
    async fn test_artifact_failure_changes_nothing() {
        let store = InMemoryJobStore::new();
        let job = Job::new("job-3", "tenant-1", "wf-1", json!({}));
        store.create_job(&job).await.unwrap();

        let notifier = MockNotifier::new();
        let reconciler =
            JobCompletionReconciler::new(store.clone(), MemoryArtifacts::failing(), notifier.clone());
        let err = reconciler.finalize(&job, &[], html()).await.unwrap_err();

        assert_eq!(err.error_type(), "ArtifactStorageError");
        let stored = store.job("job-3").unwrap();
        assert_eq!(stored.status, JobStatus::Pending);
        assert!(stored.execution_steps.is_empty());
        assert!(notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn test_notification_failure_is_swallowed() {
        let store = InMemoryJobStore::new();
        let job = Job::new("job-4", "tenant-1", "wf-1", json!({}));
        store.create_job(&job).await.unwrap();

        let reconciler = JobCompletionReconciler::new(
            store.clone(),
            MemoryArtifacts::new(),
            MockNotifier::failing(),
        );
        let markdown = FinalDeliverable {
            content: "# Done".to_string(),
            format: DeliverableFormat::Markdown,
        };
        reconciler.finalize(&job, &[], markdown).await.unwrap();

        let stored = store.job("job-4").unwrap();
        assert_eq!(stored.status, JobStatus::Completed);
        assert_eq!(stored.artifacts.len(), 1);
        match &stored.execution_steps[0].details {
            StepDetails::FinalOutput { filename, .. } => assert_eq!(filename, "final.md"),
            other => panic!("unexpected details {other:?}"),
        }
    }
}
