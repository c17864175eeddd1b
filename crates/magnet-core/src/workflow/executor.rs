//! Step execution coordinator: group-ordered execution with per-step
//! persistence.
//!
//! The `StepExecutionCoordinator` processes a job's workflow in resolved
//! group order. Steps within a group run concurrently via `tokio::JoinSet`;
//! groups run strictly one after another. Every step outcome is persisted
//! before the next one is handled, which makes both entry points resumable:
//!
//! - `process_job` drives the whole plan in one call.
//! - `process_single_step` runs exactly one step per call and reloads all
//!   state from the store each time, for external orchestrators.
//!
//! # Execution flow (full job)
//!
//! 1. Load job and workflow, resolve and persist the plan, mark `running`.
//! 2. Reload canonical history; completed steps are skipped and their
//!    outputs seed the context.
//! 3. For each group: spawn pending steps, wait for all, persist successes
//!    in ascending `step_order`, then stop at the first failure.
//! 4. Assemble the deliverable and hand it to the reconciler.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use magnet_types::config::EngineConfig;
use magnet_types::job::{ExecutionPlanSummary, ExecutionStepRecord, Job};
use magnet_types::workflow::{StepType, Workflow, WorkflowStep};
use futures_util::FutureExt;
use serde::Serialize;
use tokio::task::{JoinError, JoinSet};

use crate::ports::{Collaborators, JobStore, WorkflowStore};

use super::checkpoint::{CheckpointManager, JobProgress};
use super::context::{ContextAccumulator, format_submission};
use super::dag::{ExecutionPlan, dependencies_of, resolve};
use super::error::{CoordinatorError, StepError, WorkflowError};
use super::reconciler::{DeliverableFormat, FinalDeliverable, JobCompletionReconciler};
use super::registry::{StepHandler, StepHandlerRegistry, StepInvocation, StepOutcome, StepResult};
use super::tracking::{inject_tracking_script, looks_like_html, strip_code_fences};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// `step_index` of the synthetic finalization step in per-step mode
/// (dispatched with `step_type = html_generation`).
pub const FINAL_STEP_INDEX: i64 = -1;

// ---------------------------------------------------------------------------
// ProcessOutcome
// ---------------------------------------------------------------------------

/// Structured result returned to the invoker of either entry point.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProcessOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_index: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_type: Option<String>,
    /// The requested work was already done; nothing was executed.
    pub skipped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_url: Option<String>,
}

impl ProcessOutcome {
    fn completed(output_url: Option<String>) -> Self {
        Self {
            success: true,
            output_url,
            ..Default::default()
        }
    }

    fn step_completed(step_index: i64, step_type: StepType) -> Self {
        Self {
            success: true,
            step_index: Some(step_index),
            step_type: Some(step_type.to_string()),
            ..Default::default()
        }
    }

    fn skipped(step_index: Option<i64>, step_type: Option<StepType>) -> Self {
        Self {
            success: true,
            skipped: true,
            step_index,
            step_type: step_type.map(|t| t.to_string()),
            ..Default::default()
        }
    }

    fn failure(
        error: String,
        error_type: &str,
        step_index: Option<i64>,
        step_type: Option<StepType>,
    ) -> Self {
        Self {
            success: false,
            error: Some(error),
            error_type: Some(error_type.to_string()),
            step_index,
            step_type: step_type.map(|t| t.to_string()),
            ..Default::default()
        }
    }
}

/// A failure already persisted as a step record.
struct StepFailure {
    step_index: usize,
    step_type: StepType,
    error_type: &'static str,
    message: String,
}

/// One finished task of a group.
struct TaskResult {
    step_order: u32,
    started_at: DateTime<Utc>,
    duration_ms: u64,
    result: Result<StepOutcome, StepError>,
}

// ---------------------------------------------------------------------------
// StepExecutionCoordinator
// ---------------------------------------------------------------------------

/// Drives jobs through their execution plans.
///
/// Generic over the job and workflow stores for storage flexibility.
pub struct StepExecutionCoordinator<J: JobStore, W: WorkflowStore> {
    jobs: Arc<J>,
    workflows: Arc<W>,
    registry: Arc<StepHandlerRegistry>,
    checkpoint: CheckpointManager<J>,
    reconciler: JobCompletionReconciler<J>,
    tracking_endpoint: String,
}

impl<J: JobStore + 'static, W: WorkflowStore + 'static> StepExecutionCoordinator<J, W> {
    /// Coordinator with the built-in handler set.
    pub fn new(
        jobs: Arc<J>,
        workflows: Arc<W>,
        collaborators: &Collaborators,
        config: &EngineConfig,
    ) -> Self {
        let registry = StepHandlerRegistry::with_builtins(collaborators, config);
        Self::with_registry(jobs, workflows, registry, collaborators, config)
    }

    /// Coordinator with a caller-assembled registry.
    pub fn with_registry(
        jobs: Arc<J>,
        workflows: Arc<W>,
        registry: StepHandlerRegistry,
        collaborators: &Collaborators,
        config: &EngineConfig,
    ) -> Self {
        Self {
            checkpoint: CheckpointManager::new(Arc::clone(&jobs)),
            reconciler: JobCompletionReconciler::new(
                Arc::clone(&jobs),
                Arc::clone(&collaborators.artifacts),
                Arc::clone(&collaborators.notifier),
            ),
            jobs,
            workflows,
            registry: Arc::new(registry),
            tracking_endpoint: config.tracking.endpoint.clone(),
        }
    }

    pub fn registry(&self) -> &StepHandlerRegistry {
        &self.registry
    }

    // -----------------------------------------------------------------------
    // Plan resolution
    // -----------------------------------------------------------------------

    /// Resolve `steps` and persist the plan summary on the job.
    pub async fn resolve_dependencies(
        &self,
        job_id: &str,
        steps: &[WorkflowStep],
    ) -> Result<ExecutionPlanSummary, CoordinatorError> {
        let summary = resolve(steps)?.summary();
        self.checkpoint.checkpoint_plan(job_id, summary.clone()).await?;
        tracing::info!(
            job_id,
            total_steps = summary.total_steps,
            groups = summary.group_count,
            "execution plan resolved"
        );
        Ok(summary)
    }

    // -----------------------------------------------------------------------
    // Full-job mode
    // -----------------------------------------------------------------------

    /// Run every pending step of the job, then finalize it.
    pub async fn process_job(&self, job_id: &str) -> ProcessOutcome {
        match self.run_job(job_id).await {
            Ok(outcome) => outcome,
            Err(err) => {
                self.fail_job(job_id, &err).await;
                ProcessOutcome::failure(err.to_string(), err.error_type(), None, None)
            }
        }
    }

    async fn run_job(&self, job_id: &str) -> Result<ProcessOutcome, CoordinatorError> {
        let job = self.load_job(job_id).await?;
        if job.status.is_completed() {
            tracing::info!(job_id, "job already completed, nothing to do");
            return Ok(ProcessOutcome {
                skipped: true,
                ..ProcessOutcome::completed(job.output_url.clone())
            });
        }
        let workflow = self.load_workflow(&job.workflow_id).await?;
        let steps = workflow.sorted_steps();

        let plan = resolve(&steps)?;
        self.checkpoint.checkpoint_plan(job_id, plan.summary()).await?;
        self.checkpoint.checkpoint_running(job_id).await?;

        let mut progress = self.checkpoint.load_progress(&job).await?;
        let current_context = format_submission(&job.submission_data);
        let index_of: HashMap<u32, usize> = steps
            .iter()
            .enumerate()
            .map(|(i, s)| (s.step_order, i))
            .collect();

        tracing::info!(
            job_id,
            workflow_id = %workflow.workflow_id,
            groups = plan.group_count(),
            "processing job"
        );

        for (group_idx, group) in plan.groups().iter().enumerate() {
            let pending: Vec<&WorkflowStep> = group
                .iter()
                .filter_map(|order| index_of.get(order).map(|i| &steps[*i]))
                .filter(|s| {
                    let done = progress.completed_record(s.step_order).is_some();
                    if done {
                        tracing::debug!(job_id, step_order = s.step_order, "skipping completed step");
                    }
                    !done
                })
                .collect();
            if pending.is_empty() {
                continue;
            }

            tracing::debug!(job_id, group = group_idx, steps = pending.len(), "processing group");

            if let Some(failure) = self
                .run_group(&job, &steps, &index_of, &plan, group_idx, &pending, &current_context, &mut progress)
                .await?
            {
                tracing::warn!(
                    job_id,
                    step_index = failure.step_index,
                    error_type = failure.error_type,
                    "job failed"
                );
                return Ok(ProcessOutcome::failure(
                    failure.message,
                    failure.error_type,
                    Some(failure.step_index as i64),
                    Some(failure.step_type),
                ));
            }
        }

        let deliverable = self.assemble_deliverable(&job, &workflow, &steps, &progress);
        let url = self
            .reconciler
            .finalize(&job, &progress.steps, deliverable)
            .await?;
        Ok(ProcessOutcome::completed(Some(url)))
    }

    /// Run one group concurrently and persist its outcomes.
    ///
    /// Returns the first failure by `step_order`, already recorded.
    #[allow(clippy::too_many_arguments)]
    async fn run_group(
        &self,
        job: &Job,
        steps: &[WorkflowStep],
        index_of: &HashMap<u32, usize>,
        plan: &ExecutionPlan,
        group_idx: usize,
        pending: &[&WorkflowStep],
        current_context: &str,
        progress: &mut JobProgress,
    ) -> Result<Option<StepFailure>, CoordinatorError> {
        // Resolve every handler before spawning so configuration errors
        // never leave sibling tasks running.
        let mut dispatch = Vec::with_capacity(pending.len());
        for step in pending {
            let step_type = StepHandlerRegistry::dispatch_type(step);
            match self.registry.get_handler(step_type) {
                Ok(handler) => dispatch.push((*step, step_type, handler)),
                Err(err) => {
                    let failure = StepFailure {
                        step_index: index_of[&step.step_order],
                        step_type,
                        error_type: err.error_type(),
                        message: err.to_string(),
                    };
                    self.record_failure(job, step, progress, &failure).await;
                    return Ok(Some(failure));
                }
            }
        }

        let history = Arc::new(progress.steps.clone());
        let mut join_set = JoinSet::new();
        let mut task_orders = HashMap::with_capacity(dispatch.len());
        for (step, _, handler) in &dispatch {
            let invocation = build_invocation(
                job,
                step,
                index_of[&step.step_order],
                plan,
                group_idx,
                progress,
                Arc::clone(&history),
                current_context,
            );
            let handler = Arc::clone(handler);
            let step_order = step.step_order;
            let task = join_set.spawn(async move {
                let started_at = Utc::now();
                let start = Instant::now();
                let result = execute_caught(handler.as_ref(), invocation).await;
                TaskResult {
                    step_order,
                    started_at,
                    duration_ms: start.elapsed().as_millis() as u64,
                    result,
                }
            });
            task_orders.insert(task.id(), step_order);
        }

        // A task that fails to join becomes that step's failure; siblings
        // that finished are still persisted below.
        let mut results = Vec::with_capacity(dispatch.len());
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(task) => results.push(task),
                Err(err) => {
                    let Some(&step_order) = task_orders.get(&err.id()) else {
                        tracing::error!(job_id = %job.job_id, error = %err, "unknown step task failed to join");
                        continue;
                    };
                    tracing::error!(job_id = %job.job_id, step_order, error = %err, "step task failed to join");
                    results.push(TaskResult {
                        step_order,
                        started_at: Utc::now(),
                        duration_ms: 0,
                        result: Err(join_failure(err)),
                    });
                }
            }
        }
        results.sort_by_key(|r| r.step_order);

        let mut first_failure: Option<StepFailure> = None;
        for task in results {
            let step = &steps[index_of[&task.step_order]];
            let step_type = StepHandlerRegistry::dispatch_type(step);
            match task.result {
                Ok(outcome) => {
                    let (record, artifact_ids) = finish_record(outcome, task.started_at, task.duration_ms);
                    self.checkpoint
                        .checkpoint_step_complete(&job.job_id, progress, record, &artifact_ids)
                        .await?;
                    tracing::info!(
                        job_id = %job.job_id,
                        step_order = task.step_order,
                        step_type = %step_type,
                        duration_ms = task.duration_ms,
                        "step completed"
                    );
                }
                Err(err) if first_failure.is_none() => {
                    first_failure = Some(StepFailure {
                        step_index: index_of[&task.step_order],
                        step_type,
                        error_type: err.error_type(),
                        message: err.to_string(),
                    });
                }
                Err(err) => {
                    tracing::warn!(
                        job_id = %job.job_id,
                        step_order = task.step_order,
                        error = %err,
                        "additional step failure in group"
                    );
                }
            }
        }

        if let Some(failure) = &first_failure {
            let step = &steps[failure.step_index];
            self.record_failure(job, step, progress, failure).await;
        }
        Ok(first_failure)
    }

    // -----------------------------------------------------------------------
    // Per-step mode
    // -----------------------------------------------------------------------

    /// Run exactly one step, reloading all state from the store.
    ///
    /// `FINAL_STEP_INDEX` with `html_generation` runs the finalization step.
    pub async fn process_single_step(
        &self,
        job_id: &str,
        step_index: i64,
        step_type: StepType,
    ) -> ProcessOutcome {
        match self.run_single(job_id, step_index, step_type).await {
            Ok(outcome) => outcome,
            Err(err) if is_rejected_request(&err) => {
                // The job itself is untouched; a later call may still succeed.
                tracing::warn!(job_id, step_index, error = %err, error_type = err.error_type(), "step request rejected");
                ProcessOutcome::failure(
                    err.to_string(),
                    err.error_type(),
                    Some(step_index),
                    Some(step_type),
                )
            }
            Err(err) => {
                self.fail_job(job_id, &err).await;
                ProcessOutcome::failure(
                    err.to_string(),
                    err.error_type(),
                    Some(step_index),
                    Some(step_type),
                )
            }
        }
    }

    async fn run_single(
        &self,
        job_id: &str,
        step_index: i64,
        step_type: StepType,
    ) -> Result<ProcessOutcome, CoordinatorError> {
        let job = self.load_job(job_id).await?;
        if job.status.is_completed() {
            tracing::info!(job_id, step_index, "job already completed, skipping step");
            return Ok(ProcessOutcome::skipped(Some(step_index), Some(step_type)));
        }
        let workflow = self.load_workflow(&job.workflow_id).await?;
        let steps = workflow.sorted_steps();
        let plan = resolve(&steps)?;
        if job.execution_plan.is_none() {
            self.checkpoint.checkpoint_plan(job_id, plan.summary()).await?;
        }
        let mut progress = self.checkpoint.load_progress(&job).await?;

        if step_index == FINAL_STEP_INDEX && step_type == StepType::HtmlGeneration {
            return self.finalize_single(&job, &workflow, &steps, &progress).await;
        }

        let idx = usize::try_from(step_index)
            .ok()
            .filter(|i| *i < steps.len())
            .ok_or(WorkflowError::InvalidStepIndex {
                index: step_index,
                len: steps.len(),
            })?;
        let step = &steps[idx];

        if progress.completed_record(step.step_order).is_some() {
            tracing::info!(job_id, step_order = step.step_order, "step already completed, skipping");
            return Ok(ProcessOutcome::skipped(Some(step_index), Some(step_type)));
        }

        for dependency in dependencies_of(step, &steps) {
            if progress.completed_record(dependency).is_none() {
                return Err(WorkflowError::DependencyNotSatisfied {
                    step: step.step_order,
                    dependency,
                }
                .into());
            }
        }

        let dispatch_type = StepHandlerRegistry::dispatch_type(step);
        if dispatch_type != step_type && step.declared_type() != step_type {
            tracing::warn!(
                job_id,
                step_order = step.step_order,
                requested = %step_type,
                dispatched = %dispatch_type,
                "requested step type does not match workflow definition"
            );
        }
        let handler = self.registry.get_handler(dispatch_type)?;

        self.checkpoint.checkpoint_running(job_id).await?;

        let group_idx = plan.group_index_of(step.step_order).unwrap_or(0);
        let history = Arc::new(progress.steps.clone());
        let invocation = build_invocation(
            &job,
            step,
            idx,
            &plan,
            group_idx,
            &progress,
            history,
            &format_submission(&job.submission_data),
        );

        let started_at = Utc::now();
        let start = Instant::now();
        let result = execute_caught(handler.as_ref(), invocation).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(outcome) => {
                let (record, artifact_ids) = finish_record(outcome, started_at, duration_ms);
                self.checkpoint
                    .checkpoint_step_complete(job_id, &mut progress, record, &artifact_ids)
                    .await?;
                tracing::info!(job_id, step_order = step.step_order, duration_ms, "step completed");
                Ok(ProcessOutcome::step_completed(step_index, dispatch_type))
            }
            Err(err) => {
                let failure = StepFailure {
                    step_index: idx,
                    step_type: dispatch_type,
                    error_type: err.error_type(),
                    message: err.to_string(),
                };
                self.record_failure(&job, step, &mut progress, &failure).await;
                Ok(ProcessOutcome::failure(
                    failure.message,
                    failure.error_type,
                    Some(step_index),
                    Some(dispatch_type),
                ))
            }
        }
    }

    /// Synthetic final step: every workflow step must have completed.
    async fn finalize_single(
        &self,
        job: &Job,
        workflow: &Workflow,
        steps: &[WorkflowStep],
        progress: &JobProgress,
    ) -> Result<ProcessOutcome, CoordinatorError> {
        let final_order = steps.last().map(|s| s.step_order + 1).unwrap_or(1);
        for step in steps {
            if progress.completed_record(step.step_order).is_none() {
                return Err(WorkflowError::DependencyNotSatisfied {
                    step: final_order,
                    dependency: step.step_order,
                }
                .into());
            }
        }

        let deliverable = self.assemble_deliverable(job, workflow, steps, progress);
        let url = self
            .reconciler
            .finalize(job, &progress.steps, deliverable)
            .await?;
        Ok(ProcessOutcome {
            step_index: Some(FINAL_STEP_INDEX),
            step_type: Some(StepType::HtmlGeneration.to_string()),
            ..ProcessOutcome::completed(Some(url))
        })
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    async fn load_job(&self, job_id: &str) -> Result<Job, CoordinatorError> {
        self.jobs
            .get_job(job_id)
            .await?
            .ok_or_else(|| CoordinatorError::JobNotFound(job_id.to_string()))
    }

    async fn load_workflow(&self, workflow_id: &str) -> Result<Workflow, CoordinatorError> {
        self.workflows
            .get_workflow(workflow_id)
            .await?
            .ok_or_else(|| CoordinatorError::WorkflowNotFound(workflow_id.to_string()))
    }

    /// Persist a failed record and the job's failed status. A secondary
    /// persistence error is logged and never replaces the step's error.
    async fn record_failure(
        &self,
        job: &Job,
        step: &WorkflowStep,
        progress: &mut JobProgress,
        failure: &StepFailure,
    ) {
        let record = ExecutionStepRecord::failed(
            step.step_order,
            step.step_name.clone(),
            failure.step_type,
            failure.message.clone(),
        );
        if let Err(e) = self
            .checkpoint
            .checkpoint_step_failed(&job.job_id, progress, record, failure.error_type, &failure.message)
            .await
        {
            tracing::error!(
                job_id = %job.job_id,
                step_order = step.step_order,
                error = %e,
                "failed to persist step failure"
            );
        }
    }

    /// Mark a job failed after a job-level error.
    async fn fail_job(&self, job_id: &str, err: &CoordinatorError) {
        tracing::warn!(job_id, error = %err, error_type = err.error_type(), "job processing failed");
        if matches!(err, CoordinatorError::JobNotFound(_)) {
            return;
        }
        if let Err(e) = self
            .checkpoint
            .checkpoint_job_failed(job_id, err.error_type(), &err.to_string())
            .await
        {
            tracing::error!(job_id, error = %e, "failed to persist job failure");
        }
    }

    /// Final content: output of the last content-producing step (or the
    /// whole context when there is none). HTML gets the tracking script.
    fn assemble_deliverable(
        &self,
        job: &Job,
        workflow: &Workflow,
        steps: &[WorkflowStep],
        progress: &JobProgress,
    ) -> FinalDeliverable {
        let last_content = steps
            .iter()
            .rev()
            .filter(|s| {
                matches!(
                    StepHandlerRegistry::dispatch_type(s),
                    StepType::AiGeneration | StepType::HtmlGeneration
                )
            })
            .find_map(|s| progress.completed_record(s.step_order))
            .and_then(|r| r.output.clone());

        let content = match last_content {
            Some(output) => strip_code_fences(&output).to_string(),
            None => ContextAccumulator::from_records(&progress.steps, |_| true)
                .as_str()
                .to_string(),
        };

        if looks_like_html(&content) {
            let content = if workflow.tracking_enabled {
                inject_tracking_script(&content, &job.job_id, &job.tenant_id, &self.tracking_endpoint)
            } else {
                content
            };
            FinalDeliverable {
                content,
                format: DeliverableFormat::Html,
            }
        } else {
            FinalDeliverable {
                content,
                format: DeliverableFormat::Markdown,
            }
        }
    }
}

/// Snapshot handed to a handler. Context and prior results cover only
/// steps in groups before `group_idx`.
#[allow(clippy::too_many_arguments)]
fn build_invocation(
    job: &Job,
    step: &WorkflowStep,
    step_index: usize,
    plan: &ExecutionPlan,
    group_idx: usize,
    progress: &JobProgress,
    history: Arc<Vec<ExecutionStepRecord>>,
    current_context: &str,
) -> StepInvocation {
    let earlier = |order: u32| plan.group_index_of(order).is_some_and(|g| g < group_idx);

    let mut prior: Vec<&ExecutionStepRecord> = progress
        .steps
        .iter()
        .filter(|r| r.is_completed() && !r.is_final_output() && earlier(r.step_order))
        .collect();
    prior.sort_by_key(|r| r.step_order);

    StepInvocation {
        step: step.clone(),
        step_index,
        job_id: job.job_id.clone(),
        tenant_id: job.tenant_id.clone(),
        submission: job.submission_data.clone(),
        previous_context: ContextAccumulator::from_records(&progress.steps, earlier)
            .as_str()
            .to_string(),
        current_context: current_context.to_string(),
        prior_results: prior.into_iter().map(StepResult::from_record).collect(),
        history,
    }
}

/// Per-step requests that say nothing about the job's health: unknown job,
/// out-of-range index, or dependencies not yet completed.
fn is_rejected_request(err: &CoordinatorError) -> bool {
    matches!(
        err,
        CoordinatorError::JobNotFound(_)
            | CoordinatorError::Workflow(
                WorkflowError::InvalidStepIndex { .. } | WorkflowError::DependencyNotSatisfied { .. }
            )
    )
}

/// Run a handler, turning a panic into that step's failure.
async fn execute_caught(
    handler: &dyn StepHandler,
    invocation: StepInvocation,
) -> Result<StepOutcome, StepError> {
    AssertUnwindSafe(handler.execute(invocation))
        .catch_unwind()
        .await
        .unwrap_or_else(|payload| Err(StepError::panicked(payload)))
}

fn join_failure(err: JoinError) -> StepError {
    if err.is_panic() {
        StepError::panicked(err.into_panic())
    } else {
        StepError::Aborted(err.to_string())
    }
}

/// Record to persist for a successful outcome: coordinator-measured timing
/// fills gaps, and `output` is used when the handler left the record's
/// output unset.
fn finish_record(
    outcome: StepOutcome,
    started_at: DateTime<Utc>,
    duration_ms: u64,
) -> (ExecutionStepRecord, Vec<String>) {
    let StepOutcome {
        output,
        artifact_ids,
        mut record,
    } = outcome;
    if record.output.is_none() && !output.is_empty() {
        record.output = Some(output);
    }
    record.start_time.get_or_insert(started_at);
    record.duration_ms.get_or_insert(duration_ms);
    (record, artifact_ids)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
