//! Job records and execution-step history.
//!
//! A `Job` is one run of a workflow for one form submission. Its
//! `execution_steps` list is the append-only history of step outcomes; when
//! the list grows large the store may offload it to a blob and keep only a
//! pointer in `execution_steps_s3_key`, in which case the inline list is a
//! cache and the blob is authoritative.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::workflow::StepType;

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

/// Lifecycle status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// `completed` is the only status the engine refuses to re-enter.
    pub fn is_completed(&self) -> bool {
        matches!(self, JobStatus::Completed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single job (workflow run for one submission).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub job_id: String,
    pub tenant_id: String,
    pub workflow_id: String,
    /// Form fields submitted by the lead.
    #[serde(default)]
    pub submission_data: Value,
    pub status: JobStatus,
    #[serde(default)]
    pub execution_steps: Vec<ExecutionStepRecord>,
    /// Pointer to the offloaded history blob. Authoritative when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_steps_s3_key: Option<String>,
    #[serde(default)]
    pub artifacts: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_plan: Option<ExecutionPlanSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_artifact_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Create a new pending job.
    pub fn new(
        job_id: impl Into<String>,
        tenant_id: impl Into<String>,
        workflow_id: impl Into<String>,
        submission_data: Value,
    ) -> Self {
        let now = Utc::now();
        Self {
            job_id: job_id.into(),
            tenant_id: tenant_id.into(),
            workflow_id: workflow_id.into(),
            submission_data,
            status: JobStatus::Pending,
            execution_steps: Vec::new(),
            execution_steps_s3_key: None,
            artifacts: Vec::new(),
            execution_plan: None,
            error_message: None,
            error_type: None,
            output_url: None,
            output_artifact_id: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }
}

/// Append `new_ids` to `artifacts`, skipping ids already present.
pub fn merge_artifact_ids(artifacts: &mut Vec<String>, new_ids: &[String]) {
    for id in new_ids {
        if !artifacts.contains(id) {
            artifacts.push(id.clone());
        }
    }
}

/// Step orders that have a `completed` workflow-step record (final output excluded).
pub fn completed_step_orders(steps: &[ExecutionStepRecord]) -> BTreeSet<u32> {
    steps
        .iter()
        .filter(|r| r.status == StepStatus::Completed && !r.is_final_output())
        .map(|r| r.step_order)
        .collect()
}

// ---------------------------------------------------------------------------
// Partial update
// ---------------------------------------------------------------------------

/// Partial job update. `None` fields are left untouched by the store; the
/// store always refreshes `updated_at`.
#[derive(Debug, Clone, Default)]
pub struct JobUpdate {
    pub status: Option<JobStatus>,
    pub execution_steps: Option<Vec<ExecutionStepRecord>>,
    pub artifacts: Option<Vec<String>>,
    pub execution_plan: Option<ExecutionPlanSummary>,
    pub error_message: Option<String>,
    pub error_type: Option<String>,
    /// Reset `error_message`/`error_type` (used when a failed job is re-run).
    pub clear_error: bool,
    pub output_url: Option<String>,
    pub output_artifact_id: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl JobUpdate {
    pub fn status(status: JobStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn failed(error_type: impl Into<String>, error_message: impl Into<String>) -> Self {
        Self {
            status: Some(JobStatus::Failed),
            error_type: Some(error_type.into()),
            error_message: Some(error_message.into()),
            ..Default::default()
        }
    }

    pub fn progress(steps: Vec<ExecutionStepRecord>, artifacts: Vec<String>) -> Self {
        Self {
            execution_steps: Some(steps),
            artifacts: Some(artifacts),
            ..Default::default()
        }
    }

    /// Apply this update onto an in-memory job (used by stores and tests).
    pub fn apply_to(self, job: &mut Job) {
        if let Some(status) = self.status {
            job.status = status;
        }
        if let Some(steps) = self.execution_steps {
            job.execution_steps = steps;
        }
        if let Some(artifacts) = self.artifacts {
            job.artifacts = artifacts;
        }
        if let Some(plan) = self.execution_plan {
            job.execution_plan = Some(plan);
        }
        if self.clear_error {
            job.error_message = None;
            job.error_type = None;
        }
        if let Some(msg) = self.error_message {
            job.error_message = Some(msg);
        }
        if let Some(kind) = self.error_type {
            job.error_type = Some(kind);
        }
        if let Some(url) = self.output_url {
            job.output_url = Some(url);
        }
        if let Some(id) = self.output_artifact_id {
            job.output_artifact_id = Some(id);
        }
        if let Some(at) = self.completed_at {
            job.completed_at = Some(at);
        }
        job.updated_at = Utc::now();
    }
}

// ---------------------------------------------------------------------------
// Step append
// ---------------------------------------------------------------------------

/// One history record appended against the canonical list, with any job
/// fields written in the same update.
#[derive(Debug, Clone)]
pub struct StepAppend {
    pub record: ExecutionStepRecord,
    pub artifact_ids: Vec<String>,
    /// Extra fields; `execution_steps` and `artifacts` are ignored.
    pub update: JobUpdate,
}

impl StepAppend {
    pub fn completed(record: ExecutionStepRecord, artifact_ids: Vec<String>) -> Self {
        Self {
            record,
            artifact_ids,
            update: JobUpdate::default(),
        }
    }

    /// A failed record that also marks the job `failed`.
    pub fn failed(
        record: ExecutionStepRecord,
        error_type: impl Into<String>,
        error_message: impl Into<String>,
    ) -> Self {
        Self {
            record,
            artifact_ids: Vec::new(),
            update: JobUpdate::failed(error_type, error_message),
        }
    }

    /// Merge into the canonical lists and return the update to persist.
    ///
    /// `None` when a completed record for the same step already exists; the
    /// lists are left untouched in that case.
    pub fn merge_into(
        self,
        steps: &mut Vec<ExecutionStepRecord>,
        artifacts: &mut Vec<String>,
    ) -> Option<JobUpdate> {
        if self.record.is_completed()
            && completed_step_orders(steps).contains(&self.record.step_order)
        {
            return None;
        }
        steps.push(self.record);
        merge_artifact_ids(artifacts, &self.artifact_ids);

        let mut update = self.update;
        update.execution_steps = Some(steps.clone());
        update.artifacts = Some(artifacts.clone());
        Some(update)
    }
}

/// Canonical lists after an append.
#[derive(Debug, Clone, Default)]
pub struct AppendedSteps {
    pub steps: Vec<ExecutionStepRecord>,
    pub artifacts: Vec<String>,
    /// `false` when the record was a duplicate completion and was dropped.
    pub appended: bool,
}

// ---------------------------------------------------------------------------
// Execution plan summary
// ---------------------------------------------------------------------------

/// Persisted shape of a resolved execution plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionPlanSummary {
    /// Step orders per group, in execution order.
    pub execution_groups: Vec<Vec<u32>>,
    pub total_steps: usize,
    pub group_count: usize,
}

// ---------------------------------------------------------------------------
// Execution step records
// ---------------------------------------------------------------------------

/// Outcome status of a recorded step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Completed,
    Failed,
}

/// Token usage reported by the AI provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageInfo {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
    /// Provider-reported cost, when available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_usd: Option<f64>,
}

/// Type-specific part of a record, keyed by `step_type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step_type", rename_all = "snake_case")]
pub enum StepDetails {
    AiGeneration {
        #[serde(default)]
        model: String,
        #[serde(default)]
        request_details: Value,
        #[serde(default)]
        response_details: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        usage_info: Option<UsageInfo>,
    },
    HtmlGeneration {
        #[serde(default)]
        model: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        usage_info: Option<UsageInfo>,
    },
    Webhook {
        #[serde(default)]
        request_details: Value,
        #[serde(default)]
        response_details: Value,
    },
    BrowserAutomation {
        #[serde(default)]
        request_details: Value,
        #[serde(default)]
        response_details: Value,
    },
    Handoff {
        #[serde(default)]
        target_workflow_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target_job_id: Option<String>,
    },
    FinalOutput {
        artifact_type: String,
        filename: String,
        url: String,
    },
}

impl StepDetails {
    /// Details with no payload for a step of the given type (failure records).
    pub fn empty_for(step_type: StepType) -> Self {
        match step_type {
            StepType::AiGeneration => StepDetails::AiGeneration {
                model: String::new(),
                request_details: Value::Null,
                response_details: Value::Null,
                usage_info: None,
            },
            StepType::HtmlGeneration => StepDetails::HtmlGeneration {
                model: String::new(),
                usage_info: None,
            },
            StepType::Webhook => StepDetails::Webhook {
                request_details: Value::Null,
                response_details: Value::Null,
            },
            StepType::BrowserAutomation => StepDetails::BrowserAutomation {
                request_details: Value::Null,
                response_details: Value::Null,
            },
            StepType::Handoff => StepDetails::Handoff {
                target_workflow_id: String::new(),
                target_job_id: None,
            },
        }
    }

    pub fn step_type(&self) -> &'static str {
        match self {
            StepDetails::AiGeneration { .. } => "ai_generation",
            StepDetails::HtmlGeneration { .. } => "html_generation",
            StepDetails::Webhook { .. } => "webhook",
            StepDetails::BrowserAutomation { .. } => "browser_automation",
            StepDetails::Handoff { .. } => "handoff",
            StepDetails::FinalOutput { .. } => "final_output",
        }
    }

    pub fn usage_info(&self) -> Option<&UsageInfo> {
        match self {
            StepDetails::AiGeneration { usage_info, .. }
            | StepDetails::HtmlGeneration { usage_info, .. } => usage_info.as_ref(),
            _ => None,
        }
    }
}

/// Append-only history entry describing one step's outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionStepRecord {
    #[serde(deserialize_with = "deserialize_step_order")]
    pub step_order: u32,
    pub step_name: String,
    pub status: StepStatus,
    #[serde(flatten)]
    pub details: StepDetails,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    /// Text output fed into the accumulated context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionStepRecord {
    /// A completed record with no timing or output yet.
    pub fn completed(step_order: u32, step_name: impl Into<String>, details: StepDetails) -> Self {
        Self {
            step_order,
            step_name: step_name.into(),
            status: StepStatus::Completed,
            details,
            start_time: None,
            duration_ms: None,
            output: None,
            artifact_id: None,
            error: None,
        }
    }

    /// A failed record for a step of the given type.
    pub fn failed(
        step_order: u32,
        step_name: impl Into<String>,
        step_type: StepType,
        error: impl Into<String>,
    ) -> Self {
        Self {
            status: StepStatus::Failed,
            error: Some(error.into()),
            ..Self::completed(step_order, step_name, StepDetails::empty_for(step_type))
        }
    }

    pub fn is_final_output(&self) -> bool {
        matches!(self.details, StepDetails::FinalOutput { .. })
    }

    pub fn is_completed(&self) -> bool {
        self.status == StepStatus::Completed
    }
}

/// Accept `step_order` as an integer or a decimal-encoded number (e.g. `2.0`
/// or `"2"`), as written by stores that keep numbers as decimals.
fn deserialize_step_order<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Numeric {
        Int(u64),
        Float(f64),
        Text(String),
    }

    let value = match Numeric::deserialize(deserializer)? {
        Numeric::Int(n) => n as f64,
        Numeric::Float(f) => f,
        Numeric::Text(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| serde::de::Error::custom(format!("invalid step_order '{s}'")))?,
    };

    if value < 0.0 || value.fract() != 0.0 || value > u32::MAX as f64 {
        return Err(serde::de::Error::custom(format!(
            "step_order must be a non-negative integer, got {value}"
        )));
    }
    Ok(value as u32)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
