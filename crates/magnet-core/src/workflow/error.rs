//! Error types for resolution, step execution, reconciliation and
//! coordination.
//!
//! Every error exposes `error_type()`, a stable category name persisted on
//! failed jobs and returned to callers.

use magnet_types::error::RepositoryError;
use magnet_types::workflow::StepType;

use crate::ports::{AiError, CollaboratorError};

use super::checkpoint::CheckpointError;

// ---------------------------------------------------------------------------
// WorkflowError
// ---------------------------------------------------------------------------

/// Workflow configuration errors. Raised before any handler runs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkflowError {
    #[error("workflow has no steps")]
    EmptyWorkflow,

    #[error("step_order {0} is used by more than one step")]
    DuplicateStepOrder(u32),

    #[error("step {step} depends on unknown step {target}")]
    UnknownDependency { step: u32, target: u32 },

    #[error("cyclic dependency involving step {step}")]
    CyclicDependency { step: u32 },

    #[error("no handler registered for step type '{0}'")]
    UnknownStepType(StepType),

    #[error("step {step} cannot run: dependency {dependency} has not completed")]
    DependencyNotSatisfied { step: u32, dependency: u32 },

    #[error("step index {index} is out of range for a workflow of {len} steps")]
    InvalidStepIndex { index: i64, len: usize },
}

impl WorkflowError {
    pub fn error_type(&self) -> &'static str {
        match self {
            WorkflowError::EmptyWorkflow => "EmptyWorkflowError",
            WorkflowError::DuplicateStepOrder(_) => "DuplicateStepOrderError",
            WorkflowError::UnknownDependency { .. } => "UnknownDependencyError",
            WorkflowError::CyclicDependency { .. } => "CyclicDependencyError",
            WorkflowError::UnknownStepType(_) => "UnknownStepTypeError",
            WorkflowError::DependencyNotSatisfied { .. } => "DependencyNotSatisfiedError",
            WorkflowError::InvalidStepIndex { .. } => "InvalidStepIndexError",
        }
    }
}

// ---------------------------------------------------------------------------
// StepError
// ---------------------------------------------------------------------------

/// Failures raised by a step handler.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("AI provider error: {0}")]
    Provider(#[from] AiError),

    #[error("step timed out after {0}s")]
    Timeout(u64),

    #[error("webhook delivery failed: {0}")]
    WebhookDelivery(String),

    #[error("browser automation failed: {0}")]
    Browser(String),

    #[error("handoff failed: {0}")]
    Handoff(String),

    #[error("artifact storage failed: {0}")]
    ArtifactStorage(String),

    #[error("invalid step configuration: {0}")]
    InvalidConfig(String),

    #[error("step handler panicked: {0}")]
    Panicked(String),

    #[error("step task was cancelled: {0}")]
    Aborted(String),
}

impl StepError {
    pub fn error_type(&self) -> &'static str {
        match self {
            StepError::Provider(_) => "AiProviderError",
            StepError::Timeout(_) => "StepTimeoutError",
            StepError::WebhookDelivery(_) => "WebhookDeliveryError",
            StepError::Browser(_) => "BrowserAutomationError",
            StepError::Handoff(_) => "HandoffError",
            StepError::ArtifactStorage(_) => "ArtifactStorageError",
            StepError::InvalidConfig(_) => "InvalidStepConfigError",
            StepError::Panicked(_) => "StepPanicError",
            StepError::Aborted(_) => "StepAbortedError",
        }
    }

    pub(crate) fn artifact(err: CollaboratorError) -> Self {
        StepError::ArtifactStorage(err.to_string())
    }

    /// Wrap a panic payload caught around a handler future.
    pub(crate) fn panicked(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        StepError::Panicked(message)
    }
}

// ---------------------------------------------------------------------------
// ReconcileError
// ---------------------------------------------------------------------------

/// Failures while finalizing a job.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("failed to store final artifact: {0}")]
    ArtifactStorage(String),

    #[error("failed to reconcile execution history: {0}")]
    Repository(#[from] RepositoryError),
}

impl ReconcileError {
    pub fn error_type(&self) -> &'static str {
        match self {
            ReconcileError::ArtifactStorage(_) => "ArtifactStorageError",
            ReconcileError::Repository(_) => "RepositoryError",
        }
    }
}

// ---------------------------------------------------------------------------
// CoordinatorError
// ---------------------------------------------------------------------------

/// Top-level error of a coordinator call.
#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    #[error("job not found: {0}")]
    JobNotFound(String),

    #[error("workflow not found: {0}")]
    WorkflowNotFound(String),

    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error(transparent)]
    Step(#[from] StepError),

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
}

impl CoordinatorError {
    pub fn error_type(&self) -> &'static str {
        match self {
            CoordinatorError::JobNotFound(_) => "JobNotFoundError",
            CoordinatorError::WorkflowNotFound(_) => "WorkflowNotFoundError",
            CoordinatorError::Workflow(e) => e.error_type(),
            CoordinatorError::Step(e) => e.error_type(),
            CoordinatorError::Reconcile(e) => e.error_type(),
            CoordinatorError::Repository(_) | CoordinatorError::Checkpoint(_) => "RepositoryError",
        }
    }
}
