//! Job and workflow store traits.
//!
//! The infrastructure layer (magnet-infra) implements these with SQLite
//! persistence; tests use in-memory maps.

use magnet_types::error::RepositoryError;
use magnet_types::job::{AppendedSteps, ExecutionStepRecord, Job, JobUpdate, StepAppend};
use magnet_types::workflow::Workflow;

/// Persistence for jobs and their execution history.
///
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait JobStore: Send + Sync {
    /// Insert a new job record.
    fn create_job(
        &self,
        job: &Job,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Get a job by id. The returned `execution_steps` may be a stale cache
    /// when `execution_steps_s3_key` is set; use `load_execution_steps`.
    fn get_job(
        &self,
        job_id: &str,
    ) -> impl std::future::Future<Output = Result<Option<Job>, RepositoryError>> + Send;

    /// Apply a partial update. `updated_at` is always refreshed.
    fn update_job(
        &self,
        job_id: &str,
        update: JobUpdate,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Load the canonical execution history, following the blob pointer
    /// when the list has been offloaded.
    fn load_execution_steps(
        &self,
        job: &Job,
    ) -> impl std::future::Future<Output = Result<Vec<ExecutionStepRecord>, RepositoryError>> + Send;

    /// Append one record to the canonical history in a single
    /// read-modify-write, so concurrent writers for the same job never drop
    /// each other's records. Returns the lists as persisted.
    fn append_execution_step(
        &self,
        job_id: &str,
        append: StepAppend,
    ) -> impl std::future::Future<Output = Result<AppendedSteps, RepositoryError>> + Send;
}

/// Persistence for workflow definitions.
pub trait WorkflowStore: Send + Sync {
    /// Get a workflow by id.
    fn get_workflow(
        &self,
        workflow_id: &str,
    ) -> impl std::future::Future<Output = Result<Option<Workflow>, RepositoryError>> + Send;

    /// Upsert a workflow definition.
    fn save_workflow(
        &self,
        workflow: &Workflow,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}
